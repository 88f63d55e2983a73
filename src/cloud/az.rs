//! Resource client backed by the Azure CLI.
//!
//! Every call becomes one `az ... --output json` process. The CLI handles
//! authentication and polling of long-running operations, so a successful exit
//! means the resource exists.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, StackwireError};
use crate::shell::{execute, render_command, CommandOptions};

use super::{
    ensure_required, extract_fields, masked_params, resource_name, FieldSpec, Operation, Params,
    ResourceClient, ResourceDescriptor, ResourceKind, ENV_PARAM_PREFIX,
};

/// Client that shells out to `az`.
#[derive(Debug, Clone)]
pub struct AzCliClient {
    program: String,
    cwd: Option<PathBuf>,
}

impl Default for AzCliClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AzCliClient {
    /// Use `az` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
            cwd: None,
        }
    }

    /// Use a specific executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cwd: None,
        }
    }

    /// Run commands from this directory (relative build contexts resolve here).
    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The executable this client runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, kind: ResourceKind, params: &Params, args: Vec<String>) -> Result<Value> {
        let options = CommandOptions {
            cwd: self.cwd.clone(),
            ..Default::default()
        };

        let result = execute(&self.program, &args, &options).map_err(|e| {
            StackwireError::ProvisioningError {
                kind,
                name: resource_name(kind, params),
                cause: e.to_string(),
            }
        })?;

        if !result.success {
            return Err(StackwireError::ProvisioningError {
                kind,
                name: resource_name(kind, params),
                cause: result.failure_reason(),
            });
        }

        let stdout = result.stdout.trim();
        if stdout.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(stdout).map_err(|e| StackwireError::ProvisioningError {
            kind,
            name: resource_name(kind, params),
            cause: format!("unparsable response: {}", e),
        })
    }
}

impl ResourceClient for AzCliClient {
    fn create(&self, kind: ResourceKind, params: &Params) -> Result<ResourceDescriptor> {
        ensure_required(kind, params)?;
        let args = create_args(kind, params)?;
        debug!("{}", self.describe(Operation::Create, kind, params));
        let payload = self.run(kind, params, args)?;
        Ok(ResourceDescriptor::from_payload(kind, params, payload))
    }

    fn show(
        &self,
        kind: ResourceKind,
        selector: &Params,
        fields: &[FieldSpec],
    ) -> Result<BTreeMap<String, String>> {
        ensure_required(kind, selector)?;
        let args = show_args(kind, selector)?;
        let payload = self.run(kind, selector, args)?;
        extract_fields(kind, &resource_name(kind, selector), &payload, fields)
    }

    fn describe(&self, operation: Operation, kind: ResourceKind, params: &Params) -> String {
        let masked = masked_params(kind, params);
        let args = match operation {
            Operation::Create => create_args(kind, &masked),
            Operation::Show => show_args(kind, &masked),
        };
        match args {
            Ok(args) => render_command(&self.program, &args),
            Err(e) => format!("{} {} ({})", operation, kind.as_str(), e),
        }
    }
}

/// Small builder for `az` argument vectors.
struct Args<'a> {
    params: &'a Params,
    args: Vec<String>,
}

impl<'a> Args<'a> {
    fn new(params: &'a Params, command: &[&str]) -> Self {
        Self {
            params,
            args: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn flag(mut self, flag: &str, value: &str) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        self
    }

    fn switch(mut self, flag: &str) -> Self {
        self.args.push(flag.to_string());
        self
    }

    /// `flag <params[key]>`; absent keys are skipped (required keys were checked earlier).
    fn param(self, flag: &str, key: &str) -> Self {
        match self.params.get(key).cloned() {
            Some(value) => self.flag(flag, &value),
            None => self,
        }
    }

    fn positional(mut self, key: &str) -> Self {
        if let Some(value) = self.params.get(key) {
            self.args.push(value.clone());
        }
        self
    }

    fn finish(mut self) -> Vec<String> {
        self.args.extend(
            ["--output", "json", "--only-show-errors"]
                .iter()
                .map(|s| s.to_string()),
        );
        self.args
    }
}

fn create_args(kind: ResourceKind, p: &Params) -> Result<Vec<String>> {
    let args = match kind {
        ResourceKind::Account | ResourceKind::SignedInUser => {
            return Err(StackwireError::ConfigurationError {
                message: format!("the {} cannot be created, only shown", kind),
            })
        }
        ResourceKind::ResourceGroup => Args::new(p, &["group", "create"])
            .param("--name", "name")
            .param("--location", "location"),
        ResourceKind::Identity => Args::new(p, &["identity", "create"])
            .param("--name", "name")
            .param("--resource-group", "resource_group")
            .param("--location", "location"),
        ResourceKind::CosmosAccount => {
            let location = p.get("location").cloned().unwrap_or_default();
            Args::new(p, &["cosmosdb", "create"])
                .param("--name", "name")
                .param("--resource-group", "resource_group")
                .flag("--locations", &format!("regionName={}", location))
                .flag("--kind", "GlobalDocumentDB")
                .flag("--default-consistency-level", "Session")
        }
        ResourceKind::CosmosDatabase => Args::new(p, &["cosmosdb", "sql", "database", "create"])
            .param("--account-name", "account")
            .param("--resource-group", "resource_group")
            .param("--name", "name"),
        ResourceKind::CosmosContainer => {
            Args::new(p, &["cosmosdb", "sql", "container", "create"])
                .param("--account-name", "account")
                .param("--resource-group", "resource_group")
                .param("--database-name", "database")
                .param("--name", "name")
                .param("--partition-key-path", "partition_key")
                .param("--throughput", "throughput")
        }
        ResourceKind::CosmosRoleAssignment => {
            Args::new(p, &["cosmosdb", "sql", "role", "assignment", "create"])
                .param("--account-name", "account")
                .param("--resource-group", "resource_group")
                .param("--role-definition-id", "role_definition_id")
                .param("--principal-id", "principal_id")
                .param("--scope", "scope")
        }
        ResourceKind::KeyVault => Args::new(p, &["keyvault", "create"])
            .param("--name", "name")
            .param("--resource-group", "resource_group")
            .param("--location", "location")
            .flag("--enable-rbac-authorization", "true"),
        ResourceKind::KeyVaultSecret => Args::new(p, &["keyvault", "secret", "set"])
            .param("--vault-name", "vault")
            .param("--name", "name")
            .param("--value", "value"),
        ResourceKind::RoleAssignment => {
            let principal_type = p
                .get("principal_type")
                .cloned()
                .unwrap_or_else(|| "ServicePrincipal".to_string());
            Args::new(p, &["role", "assignment", "create"])
                .param("--assignee-object-id", "principal_id")
                .flag("--assignee-principal-type", &principal_type)
                .param("--role", "role")
                .param("--scope", "scope")
        }
        ResourceKind::Registry => {
            let sku = p.get("sku").cloned().unwrap_or_else(|| "Basic".to_string());
            Args::new(p, &["acr", "create"])
                .param("--name", "name")
                .param("--resource-group", "resource_group")
                .flag("--sku", &sku)
        }
        // The build log would otherwise be streamed ahead of the JSON result.
        ResourceKind::ImageBuild => Args::new(p, &["acr", "build"])
            .param("--registry", "registry")
            .param("--image", "image")
            .switch("--no-logs")
            .positional("context"),
        ResourceKind::ContainerEnvironment => Args::new(p, &["containerapp", "env", "create"])
            .param("--name", "name")
            .param("--resource-group", "resource_group")
            .param("--location", "location"),
        ResourceKind::ContainerApp => container_app_args(p),
    };
    Ok(args.finish())
}

fn container_app_args(p: &Params) -> Args<'_> {
    let mut args = Args::new(p, &["containerapp", "create"])
        .param("--name", "name")
        .param("--resource-group", "resource_group")
        .param("--environment", "environment")
        .param("--image", "image")
        .param("--user-assigned", "identity")
        .param("--registry-server", "registry_server")
        .param("--registry-identity", "identity")
        .flag("--ingress", "external")
        .param("--target-port", "target_port")
        .param("--cpu", "cpu")
        .param("--memory", "memory")
        .param("--min-replicas", "min_replicas")
        .param("--max-replicas", "max_replicas");

    let env_vars: Vec<String> = p
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(ENV_PARAM_PREFIX)
                .map(|name| format!("{}={}", name, v))
        })
        .collect();
    if !env_vars.is_empty() {
        args.args.push("--env-vars".to_string());
        args.args.extend(env_vars);
    }
    args
}

fn show_args(kind: ResourceKind, p: &Params) -> Result<Vec<String>> {
    let args = match kind {
        ResourceKind::Account => {
            Args::new(p, &["account", "show"]).param("--subscription", "subscription")
        }
        ResourceKind::SignedInUser => Args::new(p, &["ad", "signed-in-user", "show"]),
        ResourceKind::ResourceGroup => Args::new(p, &["group", "show"]).param("--name", "name"),
        ResourceKind::Identity => Args::new(p, &["identity", "show"])
            .param("--name", "name")
            .param("--resource-group", "resource_group"),
        ResourceKind::CosmosAccount => Args::new(p, &["cosmosdb", "show"])
            .param("--name", "name")
            .param("--resource-group", "resource_group"),
        ResourceKind::KeyVault => Args::new(p, &["keyvault", "show"])
            .param("--name", "name")
            .param("--resource-group", "resource_group"),
        ResourceKind::Registry => Args::new(p, &["acr", "show"])
            .param("--name", "name")
            .param("--resource-group", "resource_group"),
        ResourceKind::ContainerEnvironment => Args::new(p, &["containerapp", "env", "show"])
            .param("--name", "name")
            .param("--resource-group", "resource_group"),
        ResourceKind::ContainerApp => Args::new(p, &["containerapp", "show"])
            .param("--name", "name")
            .param("--resource-group", "resource_group"),
        other => {
            return Err(StackwireError::ConfigurationError {
                message: format!("showing a {} is not supported", other),
            })
        }
    };
    Ok(args.finish())
}

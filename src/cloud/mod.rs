//! Control-plane access.
//!
//! This module provides the resource client used by the step executor:
//!
//! - [`ResourceKind`] - Every kind of cloud object the pipeline provisions
//! - [`ResourceClient`] - Create/show operations against the control plane
//! - [`AzCliClient`] - Production client driving the `az` command-line tool
//! - [`MockClient`] - Scripted client for tests
//!
//! Clients never retry. Missing mandatory parameters are rejected with
//! `ConfigurationError` before anything is spawned.

pub mod az;
pub mod mock;

pub use az::AzCliClient;
pub use mock::{Journal, MockCall, MockClient};

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, StackwireError};

/// Resolved parameters for one control-plane call.
pub type Params = BTreeMap<String, String>;

/// Prefix for container app environment variable parameters.
pub const ENV_PARAM_PREFIX: &str = "env.";

/// Kinds of cloud objects the orchestrator knows how to create or inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// The signed-in subscription.
    Account,
    /// The user running the deployment.
    SignedInUser,
    ResourceGroup,
    /// User-assigned managed identity.
    Identity,
    CosmosAccount,
    CosmosDatabase,
    CosmosContainer,
    /// Data-plane role assignment on a database account.
    CosmosRoleAssignment,
    KeyVault,
    KeyVaultSecret,
    /// Control-plane role assignment (vault, registry).
    RoleAssignment,
    Registry,
    /// Image built and pushed by the registry.
    ImageBuild,
    ContainerEnvironment,
    ContainerApp,
}

impl ResourceKind {
    /// Stable identifier used in logs and journals.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Account => "account",
            ResourceKind::SignedInUser => "signed_in_user",
            ResourceKind::ResourceGroup => "resource_group",
            ResourceKind::Identity => "identity",
            ResourceKind::CosmosAccount => "cosmos_account",
            ResourceKind::CosmosDatabase => "cosmos_database",
            ResourceKind::CosmosContainer => "cosmos_container",
            ResourceKind::CosmosRoleAssignment => "cosmos_role_assignment",
            ResourceKind::KeyVault => "key_vault",
            ResourceKind::KeyVaultSecret => "key_vault_secret",
            ResourceKind::RoleAssignment => "role_assignment",
            ResourceKind::Registry => "registry",
            ResourceKind::ImageBuild => "image_build",
            ResourceKind::ContainerEnvironment => "container_environment",
            ResourceKind::ContainerApp => "container_app",
        }
    }

    /// Parameters the control plane refuses to work without.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Account | ResourceKind::SignedInUser => &[],
            ResourceKind::ResourceGroup => &["name", "location"],
            ResourceKind::Identity => &["name", "resource_group", "location"],
            ResourceKind::CosmosAccount => &["name", "resource_group", "location"],
            ResourceKind::CosmosDatabase => &["name", "account", "resource_group"],
            ResourceKind::CosmosContainer => &[
                "name",
                "account",
                "database",
                "resource_group",
                "partition_key",
            ],
            ResourceKind::CosmosRoleAssignment => &[
                "account",
                "resource_group",
                "role_definition_id",
                "principal_id",
                "scope",
            ],
            ResourceKind::KeyVault => &["name", "resource_group", "location"],
            ResourceKind::KeyVaultSecret => &["name", "vault", "value"],
            ResourceKind::RoleAssignment => &["principal_id", "role", "scope"],
            ResourceKind::Registry => &["name", "resource_group"],
            ResourceKind::ImageBuild => &["registry", "image", "context"],
            ResourceKind::ContainerEnvironment => &["name", "resource_group", "location"],
            ResourceKind::ContainerApp => &[
                "name",
                "resource_group",
                "environment",
                "image",
                "identity",
            ],
        }
    }

    /// Parameters whose values must never be printed.
    pub fn sensitive_params(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::KeyVaultSecret => &["value"],
            _ => &[],
        }
    }

    /// Whether a name of this kind must be unique across the whole cloud.
    pub fn is_globally_unique(&self) -> bool {
        matches!(
            self,
            ResourceKind::CosmosAccount | ResourceKind::KeyVault | ResourceKind::Registry
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Account => "account",
            ResourceKind::SignedInUser => "signed-in user",
            ResourceKind::ResourceGroup => "resource group",
            ResourceKind::Identity => "managed identity",
            ResourceKind::CosmosAccount => "database account",
            ResourceKind::CosmosDatabase => "database",
            ResourceKind::CosmosContainer => "database container",
            ResourceKind::CosmosRoleAssignment => "database role assignment",
            ResourceKind::KeyVault => "key vault",
            ResourceKind::KeyVaultSecret => "key vault secret",
            ResourceKind::RoleAssignment => "role assignment",
            ResourceKind::Registry => "container registry",
            ResourceKind::ImageBuild => "image build",
            ResourceKind::ContainerEnvironment => "container environment",
            ResourceKind::ContainerApp => "container app",
        };
        write!(f, "{}", s)
    }
}

/// Whether a call creates something or only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Show,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Show => write!(f, "show"),
        }
    }
}

/// A field to pull out of a control-plane payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Output name (becomes `<step>.<name>` in the registry).
    pub name: String,
    /// JSON pointer into the payload, e.g. `/properties/vaultUri`.
    pub pointer: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pointer: pointer.into(),
        }
    }
}

/// Identity of a provisioned cloud object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDescriptor {
    /// What was created.
    pub kind: ResourceKind,

    /// Name (or the best human handle for unnamed objects).
    pub name: String,

    /// Resource group the object lives in, if any.
    pub scope: Option<String>,

    /// Opaque control-plane handle.
    pub id: String,

    /// Raw payload returned by the control plane.
    #[serde(skip)]
    pub properties: Value,
}

impl ResourceDescriptor {
    /// Build a descriptor from a control-plane payload.
    pub fn from_payload(kind: ResourceKind, params: &Params, properties: Value) -> Self {
        let id = extract_field(&properties, "/id").unwrap_or_default();
        Self {
            kind,
            name: resource_name(kind, params),
            scope: params.get("resource_group").cloned(),
            id,
            properties,
        }
    }
}

/// Client for a cloud control plane.
pub trait ResourceClient {
    /// Create a resource.
    fn create(&self, kind: ResourceKind, params: &Params) -> Result<ResourceDescriptor>;

    /// Read fields of an existing resource.
    fn show(
        &self,
        kind: ResourceKind,
        selector: &Params,
        fields: &[FieldSpec],
    ) -> Result<BTreeMap<String, String>>;

    /// Human-readable rendering of a call, with sensitive values masked.
    fn describe(&self, operation: Operation, kind: ResourceKind, params: &Params) -> String {
        let rendered: Vec<String> = masked_params(kind, params)
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{} {} {}", operation, kind.as_str(), rendered.join(" "))
    }
}

/// Reject a call whose mandatory parameters are missing or blank.
pub fn ensure_required(kind: ResourceKind, params: &Params) -> Result<()> {
    let missing: Vec<&str> = kind
        .required_params()
        .iter()
        .copied()
        .filter(|p| params.get(*p).map_or(true, |v| v.trim().is_empty()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StackwireError::ConfigurationError {
            message: format!("{} requires parameter(s): {}", kind, missing.join(", ")),
        })
    }
}

/// Best human handle for the object a call targets.
pub fn resource_name(kind: ResourceKind, params: &Params) -> String {
    let candidates: &[&str] = match kind {
        ResourceKind::Account => &["subscription"],
        ResourceKind::CosmosRoleAssignment => &["role_definition_id"],
        ResourceKind::RoleAssignment => &["role"],
        ResourceKind::ImageBuild => &["image"],
        _ => &["name"],
    };
    candidates
        .iter()
        .find_map(|c| params.get(*c).cloned())
        .unwrap_or_else(|| kind.as_str().to_string())
}

/// Copy of the parameters with sensitive values replaced.
pub fn masked_params(kind: ResourceKind, params: &Params) -> Params {
    params
        .iter()
        .map(|(k, v)| {
            if kind.sensitive_params().contains(&k.as_str()) {
                (k.clone(), "[REDACTED]".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// Read a scalar at a JSON pointer as a string.
pub fn extract_field(payload: &Value, pointer: &str) -> Option<String> {
    match payload.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Pull every requested field out of a payload.
pub fn extract_fields(
    kind: ResourceKind,
    name: &str,
    payload: &Value,
    fields: &[FieldSpec],
) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for field in fields {
        let value = extract_field(payload, &field.pointer).ok_or_else(|| {
            StackwireError::ProvisioningError {
                kind,
                name: name.to_string(),
                cause: format!("response has no '{}' at {}", field.name, field.pointer),
            }
        })?;
        values.insert(field.name.clone(), value);
    }
    Ok(values)
}

//! The provisioning pipeline for the sample application.
//!
//! Outputs flow strictly forward: the identity's principal feeds the role
//! assignments, the database endpoint and vault URI feed the application's
//! environment, and the registry login server feeds the image reference.

use crate::cloud::ResourceKind;
use crate::config::{ResolvedNames, StackwireConfig};
use crate::error::Result;
use crate::runner::Pipeline;
use crate::steps::Step;

use super::app_env::env_params;

/// Built-in data-plane role "Cosmos DB Built-in Data Contributor".
pub const COSMOS_DATA_CONTRIBUTOR: &str = "00000000-0000-0000-0000-000000000002";

pub const KEY_VAULT_SECRETS_USER: &str = "Key Vault Secrets User";

pub const KEY_VAULT_SECRETS_OFFICER: &str = "Key Vault Secrets Officer";

pub const ACR_PULL: &str = "AcrPull";

/// Build the full pipeline from validated configuration and final names.
pub fn build_pipeline(config: &StackwireConfig, names: &ResolvedNames) -> Result<Pipeline> {
    let mut steps = vec![
        Step::show("account", ResourceKind::Account)
            .title("Read subscription")
            .output("subscriptionId", "/id")
            .output("tenantId", "/tenantId")
            .build(),
    ];

    // Seeding a secret needs a data-plane role for whoever runs the deployment.
    // Read that principal before anything is created.
    if config.sample_secret.is_some() {
        steps.push(
            Step::show("operator", ResourceKind::SignedInUser)
                .title("Read signed-in user")
                .output("id", "/id")
                .build(),
        );
    }

    steps.extend([
        Step::create("resource_group", ResourceKind::ResourceGroup)
            .title("Create resource group")
            .literal("name", &names.resource_group)
            .literal("location", &config.location)
            .output("id", "/id")
            .output("name", "/name")
            .build(),
        Step::create("identity", ResourceKind::Identity)
            .title("Create managed identity")
            .literal("name", &names.identity)
            .reference("resource_group", "resource_group.name")
            .literal("location", &config.location)
            .output("id", "/id")
            .output("principalId", "/principalId")
            .output("clientId", "/clientId")
            .build(),
        Step::create("cosmos_account", ResourceKind::CosmosAccount)
            .title("Create database account")
            .literal("name", &names.cosmos_account)
            .reference("resource_group", "resource_group.name")
            .literal("location", &config.location)
            .output("id", "/id")
            .output("name", "/name")
            .output("endpoint", "/documentEndpoint")
            .build(),
        Step::create("cosmos_database", ResourceKind::CosmosDatabase)
            .title("Create database")
            .literal("name", &config.cosmos.database)
            .reference("account", "cosmos_account.name")
            .reference("resource_group", "resource_group.name")
            .output("name", "/name")
            .build(),
        Step::create("cosmos_container", ResourceKind::CosmosContainer)
            .title("Create database container")
            .literal("name", &config.cosmos.container)
            .reference("account", "cosmos_account.name")
            .reference("database", "cosmos_database.name")
            .reference("resource_group", "resource_group.name")
            .literal("partition_key", &config.cosmos.partition_key)
            .literal("throughput", config.cosmos.throughput)
            .output("name", "/name")
            .build(),
        Step::create("cosmos_role", ResourceKind::CosmosRoleAssignment)
            .title("Grant database access to identity")
            .reference("account", "cosmos_account.name")
            .reference("resource_group", "resource_group.name")
            .literal("role_definition_id", COSMOS_DATA_CONTRIBUTOR)
            .reference("principal_id", "identity.principalId")
            .literal("scope", "/")
            .soft()
            .awaits_propagation()
            .build(),
        Step::create("key_vault", ResourceKind::KeyVault)
            .title("Create key vault")
            .literal("name", &names.key_vault)
            .reference("resource_group", "resource_group.name")
            .literal("location", &config.location)
            .output("id", "/id")
            .output("name", "/name")
            .output("uri", "/properties/vaultUri")
            .build(),
        Step::create("vault_role", ResourceKind::RoleAssignment)
            .title("Grant secret access to identity")
            .reference("principal_id", "identity.principalId")
            .literal("role", KEY_VAULT_SECRETS_USER)
            .reference("scope", "key_vault.id")
            .soft()
            .awaits_propagation()
            .build(),
    ]);

    if let Some(secret) = &config.sample_secret {
        steps.extend([
            Step::create("operator_vault_role", ResourceKind::RoleAssignment)
                .title("Grant secret management to signed-in user")
                .reference("principal_id", "operator.id")
                .literal("principal_type", "User")
                .literal("role", KEY_VAULT_SECRETS_OFFICER)
                .reference("scope", "key_vault.id")
                .soft()
                .awaits_propagation()
                .build(),
            Step::create("sample_secret", ResourceKind::KeyVaultSecret)
                .title("Seed sample secret")
                .literal("name", &secret.name)
                .reference("vault", "key_vault.name")
                .literal("value", &secret.value)
                .soft()
                .awaits_propagation()
                .build(),
        ]);
    }

    let image_ref = config.app.image_ref();
    steps.extend([
        Step::create("registry", ResourceKind::Registry)
            .title("Create container registry")
            .literal("name", &names.registry)
            .reference("resource_group", "resource_group.name")
            .literal("sku", "Basic")
            .output("id", "/id")
            .output("name", "/name")
            .output("loginServer", "/loginServer")
            .build(),
        Step::create("registry_role", ResourceKind::RoleAssignment)
            .title("Grant image pull to identity")
            .reference("principal_id", "identity.principalId")
            .literal("role", ACR_PULL)
            .reference("scope", "registry.id")
            .soft()
            .awaits_propagation()
            .build(),
        Step::create("image_build", ResourceKind::ImageBuild)
            .title("Build and push image")
            .reference("registry", "registry.name")
            .literal("image", &image_ref)
            .literal("context", config.app.build_context.display())
            .derived("ref", format!("${{registry.loginServer}}/{}", image_ref))
            .build(),
        Step::create("environment", ResourceKind::ContainerEnvironment)
            .title("Create container environment")
            .literal("name", &names.environment)
            .reference("resource_group", "resource_group.name")
            .literal("location", &config.location)
            .output("id", "/id")
            .output("name", "/name")
            .output("defaultDomain", "/properties/defaultDomain")
            .build(),
        app_step(config, names),
    ]);

    Pipeline::new(steps)
}

fn app_step(config: &StackwireConfig, names: &ResolvedNames) -> Step {
    let app = &config.app;
    let mut builder = Step::create("app", ResourceKind::ContainerApp)
        .title("Deploy container app")
        .literal("name", &names.app)
        .reference("resource_group", "resource_group.name")
        .reference("environment", "environment.name")
        .reference("image", "image_build.ref")
        .reference("identity", "identity.id")
        .reference("registry_server", "registry.loginServer")
        .literal("target_port", app.target_port)
        .literal("cpu", app.cpu)
        .literal("memory", &app.memory)
        .literal("min_replicas", app.min_replicas)
        .literal("max_replicas", app.max_replicas)
        .output("fqdn", "/properties/configuration/ingress/fqdn");

    for (param, value) in env_params() {
        builder = builder.param(param, value);
    }

    builder.build()
}

//! The contract between the deployment and the application.
//!
//! The application reads five environment variables. They are injected into
//! the container app and repeated in the summary, together with `curl`
//! commands that exercise every endpoint of the provisioned instance.

use crate::cloud::ENV_PARAM_PREFIX;
use crate::outputs::OutputRegistry;
use crate::runner::{RunResult, Section};
use crate::steps::Param;

use crate::config::interpolation::resolve_string;

/// Environment variables and the outputs that feed them.
pub const APP_ENV: [(&str, &str); 5] = [
    ("COSMOS_ENDPOINT", "${cosmos_account.endpoint}"),
    ("COSMOS_DATABASE_NAME", "${cosmos_database.name}"),
    ("COSMOS_CONTAINER_NAME", "${cosmos_container.name}"),
    ("AZURE_CLIENT_ID", "${identity.clientId}"),
    ("KEY_VAULT_URL", "${key_vault.uri}"),
];

/// Output key holding the application's public host name.
pub const APP_FQDN_KEY: &str = "app.fqdn";

/// Parameters for the container app step (`env.<NAME>`).
pub fn env_params() -> Vec<(String, Param)> {
    APP_ENV
        .iter()
        .map(|(name, template)| {
            (
                format!("{}{}", ENV_PARAM_PREFIX, name),
                Param::Template(template.to_string()),
            )
        })
        .collect()
}

/// Resolved variables; `None` where an output is missing.
pub fn resolve_env(registry: &OutputRegistry) -> Vec<(&'static str, Option<String>)> {
    APP_ENV
        .iter()
        .map(|(name, template)| (*name, resolve_string(template, "summary", registry).ok()))
        .collect()
}

/// `curl` commands for every application endpoint.
pub fn verification_commands(base_url: &str, sample_secret: Option<&str>) -> Vec<String> {
    let secret = sample_secret.unwrap_or("my-secret");
    vec![
        format!("curl {}/health", base_url),
        format!("curl {}/items", base_url),
        format!(
            "curl -X POST {}/items -H 'Content-Type: application/json' -d '{{\"id\": \"1\", \"category\": \"demo\", \"name\": \"First item\"}}'",
            base_url
        ),
        format!("curl '{}/items/1?category=demo'", base_url),
        format!(
            "curl -X PUT {}/items/1 -H 'Content-Type: application/json' -d '{{\"category\": \"demo\", \"name\": \"Updated item\"}}'",
            base_url
        ),
        format!("curl -X DELETE '{}/items/1?category=demo'", base_url),
        format!("curl {}/secrets", base_url),
        format!("curl {}/secrets/{}", base_url, secret),
        format!(
            "curl -X POST {}/secrets/{} -H 'Content-Type: application/json' -d '{{\"value\": \"changeme\"}}'",
            base_url, secret
        ),
    ]
}

/// Summary sections about the deployed application.
pub fn app_sections(result: &RunResult, sample_secret: Option<&str>) -> Vec<Section> {
    let mut sections = Vec::new();

    let env: Vec<String> = resolve_env(&result.registry)
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| format!("{}={}", name, v)))
        .collect();
    if !env.is_empty() {
        sections.push(Section::new("Application environment", env));
    }

    if let Some(fqdn) = result.registry.get(APP_FQDN_KEY) {
        let base_url = format!("https://{}", fqdn);
        sections.push(Section::new("Application", vec![base_url.clone()]));
        sections.push(Section::new(
            "Verify",
            verification_commands(&base_url, sample_secret),
        ));
    }

    sections
}

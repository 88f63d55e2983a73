//! Configuration schema definitions for Stackwire.
//!
//! This module contains the struct definitions that map to the
//! `stackwire.yml` file format. Every field has a default, so an empty file
//! describes a complete (if generically named) deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for stackwire.yml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackwireConfig {
    /// Resource group every resource is created in
    pub resource_group: String,

    /// Region
    pub location: String,

    /// User-assigned managed identity name
    pub identity: String,

    /// Document database settings
    pub cosmos: CosmosConfig,

    /// Secret store name (globally unique)
    pub key_vault: String,

    /// Container registry name (globally unique, alphanumeric)
    pub registry: String,

    /// Container apps environment name
    pub environment: String,

    /// Application settings
    pub app: AppConfig,

    /// How globally unique names are made unique
    pub naming: NamingConfig,

    /// Waiting for the identity to become visible to authorization checks
    pub propagation: PropagationConfig,

    /// Optional secret seeded into the vault for the sample endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_secret: Option<SampleSecretConfig>,

    /// Global settings
    pub settings: Settings,
}

impl Default for StackwireConfig {
    fn default() -> Self {
        Self {
            resource_group: "rg-todo-api".to_string(),
            location: "eastus".to_string(),
            identity: "id-todo-api".to_string(),
            cosmos: CosmosConfig::default(),
            key_vault: "kv-todo-api".to_string(),
            registry: "acrtodoapi".to_string(),
            environment: "cae-todo-api".to_string(),
            app: AppConfig::default(),
            naming: NamingConfig::default(),
            propagation: PropagationConfig::default(),
            sample_secret: None,
            settings: Settings::default(),
        }
    }
}

/// Database account, database and container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmosConfig {
    /// Account name (globally unique)
    pub account: String,
    pub database: String,
    pub container: String,
    /// Partition key path, e.g. `/category`
    pub partition_key: String,
    /// Provisioned throughput in RU/s
    pub throughput: u32,
}

impl Default for CosmosConfig {
    fn default() -> Self {
        Self {
            account: "cosmos-todo-api".to_string(),
            database: "SampleDB".to_string(),
            container: "Items".to_string(),
            partition_key: "/category".to_string(),
            throughput: 400,
        }
    }
}

/// The deployed container app and its image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Container app name
    pub name: String,

    /// Image repository name inside the registry
    pub image: String,

    /// Image tag
    pub tag: String,

    /// Build context (relative to the project root) sent to the registry build
    pub build_context: PathBuf,

    /// Port the application listens on
    pub target_port: u16,

    /// vCPU per replica
    pub cpu: f64,

    /// Memory per replica, e.g. `1.0Gi`
    pub memory: String,

    pub min_replicas: u32,
    pub max_replicas: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "ca-todo-api".to_string(),
            image: "todo-api".to_string(),
            tag: "v1".to_string(),
            build_context: PathBuf::from("."),
            target_port: 8080,
            cpu: 0.5,
            memory: "1.0Gi".to_string(),
            min_replicas: 1,
            max_replicas: 3,
        }
    }
}

impl AppConfig {
    /// `image:tag` as pushed to the registry.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Name uniqueness strategy for globally unique resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
    /// Use names exactly as configured
    #[default]
    None,
    /// Append a random suffix on every run
    Random,
    /// Append a suffix derived from a seed (stable across runs)
    Seeded,
}

/// Naming settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub strategy: NamingStrategy,

    /// Seed for the `seeded` strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,

    /// Suffix length in characters
    pub suffix_length: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            strategy: NamingStrategy::None,
            seed: None,
            suffix_length: 6,
        }
    }
}

/// Propagation wait and retry budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Pause before the first propagation-dependent call
    pub initial_delay_secs: u64,

    /// First retry delay
    pub base_delay_ms: u64,

    /// Backoff multiplier
    pub factor: f64,

    /// Upper bound for a single retry delay
    pub max_delay_secs: u64,

    /// Give up once this much time has passed since the first attempt
    pub max_elapsed_secs: u64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 30,
            base_delay_ms: 2_000,
            factor: 2.0,
            max_delay_secs: 30,
            max_elapsed_secs: 300,
        }
    }
}

/// Secret written to the vault after it is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSecretConfig {
    pub name: String,
    pub value: String,
}

/// Global settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default output mode: verbose, normal, quiet, silent
    pub default_output: OutputMode,
}

/// Output verbosity mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Verbose,
    #[default]
    Normal,
    Quiet,
    Silent,
}

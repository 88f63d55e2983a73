//! Configuration validation rules.
//!
//! Every rule runs and all problems are reported together, so a broken
//! file can be fixed in one pass. Resource naming rules are checked later,
//! after suffixes have been applied (see [`crate::config::naming`]).

use crate::config::schema::{NamingStrategy, StackwireConfig};
use crate::error::{Result, StackwireError};

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Offending field, dotted (e.g. `app.max_replicas`)
    pub field: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
            field: Some(field.to_string()),
        }
    }
}

/// Validate a configuration and return all errors.
pub fn validate_config(config: &StackwireConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_required(config));
    errors.extend(validate_cosmos(config));
    errors.extend(validate_app(config));
    errors.extend(validate_naming(config));
    errors.extend(validate_propagation(config));

    errors
}

fn validate_required(config: &StackwireConfig) -> Vec<ValidationError> {
    let fields = [
        ("resource_group", config.resource_group.as_str()),
        ("location", config.location.as_str()),
        ("identity", config.identity.as_str()),
        ("key_vault", config.key_vault.as_str()),
        ("registry", config.registry.as_str()),
        ("environment", config.environment.as_str()),
        ("cosmos.account", config.cosmos.account.as_str()),
        ("cosmos.database", config.cosmos.database.as_str()),
        ("cosmos.container", config.cosmos.container.as_str()),
        ("app.name", config.app.name.as_str()),
        ("app.image", config.app.image.as_str()),
        ("app.tag", config.app.tag.as_str()),
        ("app.memory", config.app.memory.as_str()),
    ];

    let mut errors: Vec<ValidationError> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| {
            ValidationError::new("required", field, format!("'{}' must not be empty", field))
        })
        .collect();

    if let Some(secret) = &config.sample_secret {
        if secret.name.trim().is_empty() {
            errors.push(ValidationError::new(
                "required",
                "sample_secret.name",
                "'sample_secret.name' must not be empty",
            ));
        }
    }

    errors
}

fn validate_cosmos(config: &StackwireConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !config.cosmos.partition_key.starts_with('/') {
        errors.push(ValidationError::new(
            "partition-key-path",
            "cosmos.partition_key",
            format!(
                "Partition key '{}' must be a path starting with '/'",
                config.cosmos.partition_key
            ),
        ));
    }

    if config.cosmos.throughput < 400 {
        errors.push(ValidationError::new(
            "min-throughput",
            "cosmos.throughput",
            format!(
                "Throughput {} is below the minimum of 400 RU/s",
                config.cosmos.throughput
            ),
        ));
    }

    errors
}

fn validate_app(config: &StackwireConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let app = &config.app;

    if app.target_port == 0 {
        errors.push(ValidationError::new(
            "target-port",
            "app.target_port",
            "Target port must be between 1 and 65535",
        ));
    }

    if app.cpu.is_nan() || app.cpu <= 0.0 {
        errors.push(ValidationError::new(
            "positive-cpu",
            "app.cpu",
            format!("CPU must be positive, got {}", app.cpu),
        ));
    }

    if app.max_replicas == 0 {
        errors.push(ValidationError::new(
            "replica-bounds",
            "app.max_replicas",
            "Maximum replicas must be at least 1",
        ));
    } else if app.min_replicas > app.max_replicas {
        errors.push(ValidationError::new(
            "replica-bounds",
            "app.min_replicas",
            format!(
                "Minimum replicas ({}) exceeds maximum replicas ({})",
                app.min_replicas, app.max_replicas
            ),
        ));
    }

    errors
}

fn validate_naming(config: &StackwireConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let naming = &config.naming;

    if naming.strategy == NamingStrategy::Seeded
        && naming.seed.as_deref().map_or(true, |s| s.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "missing-seed",
            "naming.seed",
            "The 'seeded' naming strategy requires 'naming.seed'",
        ));
    }

    if naming.strategy != NamingStrategy::None && !(1..=12).contains(&naming.suffix_length) {
        errors.push(ValidationError::new(
            "suffix-length",
            "naming.suffix_length",
            format!(
                "Suffix length must be between 1 and 12, got {}",
                naming.suffix_length
            ),
        ));
    }

    errors
}

fn validate_propagation(config: &StackwireConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let p = &config.propagation;

    if p.factor.is_nan() || p.factor < 1.0 {
        errors.push(ValidationError::new(
            "backoff-factor",
            "propagation.factor",
            format!("Backoff factor must be at least 1.0, got {}", p.factor),
        ));
    }

    if p.base_delay_ms == 0 {
        errors.push(ValidationError::new(
            "backoff-delay",
            "propagation.base_delay_ms",
            "Base delay must be greater than zero",
        ));
    }

    if p.max_delay_secs.saturating_mul(1000) < p.base_delay_ms {
        errors.push(ValidationError::new(
            "backoff-delay",
            "propagation.max_delay_secs",
            "Maximum delay must not be shorter than the base delay",
        ));
    }

    errors
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigurationError` listing every failed rule.
pub fn validate(config: &StackwireConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(StackwireError::ConfigurationError {
            message: messages.join("; "),
        })
    }
}

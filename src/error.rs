//! Error types for Stackwire operations.
//!
//! This module defines [`StackwireError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Configuration, naming, pipeline-shape and reference errors are always fatal
//! - Provisioning and propagation errors are fatal unless the step is `soft`
//! - Use `anyhow::Error` (via `StackwireError::Other`) for unexpected errors

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cloud::ResourceKind;

/// Core error type for Stackwire operations.
#[derive(Debug, Error)]
pub enum StackwireError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Bad or missing input, detected before any remote call.
    #[error("Invalid configuration: {message}")]
    ConfigurationError { message: String },

    /// A resource name violates the naming rule of its kind.
    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    /// The step list is not a valid pipeline (duplicate names, forward references).
    #[error("Invalid pipeline: {message}")]
    InvalidPipeline { message: String },

    /// A control-plane call failed or returned something unusable.
    #[error("Failed to provision {kind} '{name}': {cause}")]
    ProvisioningError {
        kind: ResourceKind,
        name: String,
        cause: String,
    },

    /// A step referenced an output key that no earlier step wrote.
    #[error("Step '{step}' references unknown output '{key}'")]
    UnresolvedReference { step: String, key: String },

    /// An output key was written twice in the same run.
    #[error("Output '{key}' was already set")]
    DuplicateOutput { key: String },

    /// A propagation-dependent call kept failing until the retry budget ran out.
    #[error("Step '{step}' still failing after {attempts} attempts over {elapsed:?}: {cause}")]
    PropagationTimeout {
        step: String,
        attempts: u32,
        elapsed: Duration,
        cause: String,
    },

    /// A process could not be started. Only the program is kept, never its arguments.
    #[error("Failed to start {program}: {reason}")]
    CommandFailed {
        program: String,
        kind: std::io::ErrorKind,
        reason: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StackwireError {
    /// Whether this error aborts the run regardless of the step's failure policy.
    pub fn is_always_fatal(&self) -> bool {
        !matches!(
            self,
            StackwireError::ProvisioningError { .. }
                | StackwireError::PropagationTimeout { .. }
                | StackwireError::CommandFailed { .. }
        )
    }

    /// Whether this error stems from bad input rather than a remote failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StackwireError::ConfigNotFound { .. }
                | StackwireError::ConfigParseError { .. }
                | StackwireError::ConfigurationError { .. }
                | StackwireError::InvalidName { .. }
                | StackwireError::InvalidPipeline { .. }
        )
    }
}

/// Result type alias for Stackwire operations.
pub type Result<T> = std::result::Result<T, StackwireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_displays_path() {
        let err = StackwireError::ConfigNotFound {
            path: PathBuf::from("/foo/stackwire.yml"),
        };
        assert!(err.to_string().contains("/foo/stackwire.yml"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = StackwireError::ConfigParseError {
            path: PathBuf::from("/stackwire.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/stackwire.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn provisioning_error_displays_kind_name_and_cause() {
        let err = StackwireError::ProvisioningError {
            kind: ResourceKind::KeyVault,
            name: "kv-demo".into(),
            cause: "VaultAlreadyExists".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("key vault"));
        assert!(msg.contains("kv-demo"));
        assert!(msg.contains("VaultAlreadyExists"));
    }

    #[test]
    fn unresolved_reference_displays_step_and_key() {
        let err = StackwireError::UnresolvedReference {
            step: "app".into(),
            key: "identity.clientId".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("app"));
        assert!(msg.contains("identity.clientId"));
    }

    #[test]
    fn propagation_timeout_displays_attempts() {
        let err = StackwireError::PropagationTimeout {
            step: "cosmos_role".into(),
            attempts: 4,
            elapsed: Duration::from_secs(90),
            cause: "PrincipalNotFound".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cosmos_role"));
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("PrincipalNotFound"));
    }

    #[test]
    fn provisioning_errors_are_not_always_fatal() {
        let err = StackwireError::ProvisioningError {
            kind: ResourceKind::RoleAssignment,
            name: "vault_role".into(),
            cause: "boom".into(),
        };
        assert!(!err.is_always_fatal());

        let err = StackwireError::UnresolvedReference {
            step: "app".into(),
            key: "x.y".into(),
        };
        assert!(err.is_always_fatal());
    }

    #[test]
    fn configuration_errors_are_classified() {
        let err = StackwireError::ConfigurationError {
            message: "missing location".into(),
        };
        assert!(err.is_configuration());
        assert!(err.is_always_fatal());

        let err = StackwireError::DuplicateOutput { key: "a.b".into() };
        assert!(!err.is_configuration());
    }

    #[test]
    fn command_failed_names_program_and_reason() {
        let err = StackwireError::CommandFailed {
            program: "az".into(),
            kind: std::io::ErrorKind::PermissionDenied,
            reason: "Permission denied (os error 13)".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to start az: Permission denied (os error 13)"
        );
        assert!(!err.is_always_fatal());
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: StackwireError = io_err.into();
        assert!(matches!(err, StackwireError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(StackwireError::ConfigurationError {
                message: "test".into(),
            })
        }
        assert!(returns_error().is_err());
    }
}

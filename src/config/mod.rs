//! Configuration loading, parsing, and validation for Stackwire.
//!
//! This module handles all aspects of configuration:
//! - Schema definitions in [`schema`]
//! - File discovery, environment and flag layering in [`loader`]
//! - Validation in [`validator`]
//! - Name generation and naming rules in [`naming`]
//! - `${key}` templates over step outputs in [`interpolation`]
//!
//! # Example
//!
//! ```
//! use stackwire::config::{load_config, validate, ConfigOverrides};
//! use std::collections::HashMap;
//! use tempfile::TempDir;
//!
//! let temp = TempDir::new().unwrap();
//! std::fs::write(temp.path().join("stackwire.yml"), "location: westeurope").unwrap();
//!
//! let config = load_config(temp.path(), None, &HashMap::new(), &ConfigOverrides::default()).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.location, "westeurope");
//! ```

pub mod interpolation;
pub mod loader;
pub mod naming;
pub mod schema;
pub mod validator;

pub use schema::{
    AppConfig, CosmosConfig, NamingConfig, NamingStrategy, OutputMode, PropagationConfig,
    SampleSecretConfig, Settings, StackwireConfig,
};

pub use loader::{
    find_project_root, load_config, load_config_file, parse_config, ConfigOverrides, CONFIG_FILE,
};

pub use validator::{validate, validate_config, ValidationError};

pub use naming::{validate_name, NameGenerator, ResolvedNames};

pub use interpolation::{
    extract_variables, parse_interpolation, resolve_string, Segment,
};

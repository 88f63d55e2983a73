//! The sample application's deployment.
//!
//! [`build_pipeline`] turns validated configuration and resolved names into
//! the ordered provisioning pipeline. [`app_env`] holds the environment
//! contract the application reads at startup.

pub mod app_env;
pub mod plan;

pub use app_env::{app_sections, env_params, resolve_env, verification_commands, APP_ENV};
pub use plan::build_pipeline;

//! Stackwire - one-shot provisioning of a wired-together Azure application stack.
//!
//! Stackwire creates a resource group, managed identity, document database,
//! key vault, container registry and container app through the `az` CLI, in
//! a fixed order. Each step publishes outputs (identifiers, endpoints,
//! principal ids) that later steps consume, and the final application is
//! started with the environment it needs to reach the rest of the stack.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`cloud`] - Resource client trait, the `az` implementation and a mock
//! - [`config`] - Configuration loading, validation and resource naming
//! - [`deploy`] - The concrete pipeline and the application's environment
//! - [`error`] - Error types and result aliases
//! - [`outputs`] - Write-once registry of step outputs
//! - [`runner`] - Pipeline validation, sequencing and propagation waits
//! - [`shell`] - External process execution
//! - [`steps`] - Step definitions and single-step execution
//! - [`ui`] - Spinners and terminal output
//!
//! # Example
//!
//! ```
//! use stackwire::cloud::{MockClient, ResourceKind};
//! use stackwire::runner::{
//!     Pipeline, PipelineRunner, PropagationPolicy, PropagationWaiter, RecordingSleeper,
//!     RunOptions, RunState,
//! };
//! use stackwire::steps::Step;
//!
//! let pipeline = Pipeline::new(vec![
//!     Step::create("identity", ResourceKind::Identity)
//!         .literal("name", "id-demo")
//!         .literal("resource_group", "rg-demo")
//!         .literal("location", "eastus")
//!         .output("principalId", "/principalId")
//!         .build(),
//!     Step::create("vault_role", ResourceKind::RoleAssignment)
//!         .reference("principal_id", "identity.principalId")
//!         .literal("role", "Key Vault Secrets User")
//!         .literal("scope", "/subscriptions/demo")
//!         .soft()
//!         .awaits_propagation()
//!         .build(),
//! ])
//! .unwrap();
//!
//! let client = MockClient::new();
//! let waiter = PropagationWaiter::new(PropagationPolicy::default(), Box::new(RecordingSleeper::new()));
//! let result = PipelineRunner::new(&pipeline, &client, &waiter).run(&RunOptions::default());
//!
//! assert_eq!(result.state, RunState::Succeeded);
//! assert_eq!(result.registry.get("identity.principalId"), Some("principal-id-demo"));
//! ```

pub mod cli;
pub mod cloud;
pub mod config;
pub mod deploy;
pub mod error;
pub mod outputs;
pub mod runner;
pub mod shell;
pub mod steps;
pub mod ui;

pub use error::{Result, StackwireError};

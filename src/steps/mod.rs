//! Step definition and execution.
//!
//! - [`Step`] - One control-plane call with parameters, outputs and a failure policy
//! - [`execute_step`] - Run a step against a resource client and the output registry
//! - [`StepStatus`] - Track step execution state
//! - [`StepResult`] - Capture execution results
//!
//! # Example
//!
//! ```
//! use stackwire::cloud::{MockClient, ResourceKind};
//! use stackwire::outputs::OutputRegistry;
//! use stackwire::runner::{PropagationPolicy, PropagationWaiter, RecordingSleeper};
//! use stackwire::steps::{execute_step, ExecutionOptions, Step, StepStatus};
//!
//! let step = Step::create("identity", ResourceKind::Identity)
//!     .literal("name", "id-demo")
//!     .literal("resource_group", "rg-demo")
//!     .literal("location", "eastus")
//!     .output("principalId", "/principalId")
//!     .build();
//!
//! let client = MockClient::new();
//! let waiter = PropagationWaiter::new(PropagationPolicy::default(), Box::new(RecordingSleeper::new()));
//! let mut registry = OutputRegistry::new();
//!
//! let result = execute_step(&step, &mut registry, &client, &waiter, &ExecutionOptions::default());
//! assert_eq!(result.status(), StepStatus::Completed);
//! assert_eq!(registry.get("identity.principalId"), Some("principal-id-demo"));
//! ```

pub mod executor;
pub mod step;

pub use executor::{execute_step, format_duration, ExecutionOptions, StepResult, StepStatus};
pub use step::{FailurePolicy, OutputDecl, OutputSource, Param, Step, StepBuilder};

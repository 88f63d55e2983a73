//! Step execution engine.
//!
//! Resolves a step's parameters from the output registry, invokes the
//! resource client (through the propagation waiter when the step needs it),
//! merges declared outputs back into the registry and applies the step's
//! failure policy.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cloud::{extract_fields, Operation, Params, ResourceClient, ResourceDescriptor};
use crate::config::interpolation::resolve_string;
use crate::error::{Result, StackwireError};
use crate::outputs::OutputRegistry;
use crate::runner::propagation::PropagationWaiter;
use crate::steps::step::{FailurePolicy, OutputSource, Step};

/// Status of a step in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Step completed successfully.
    Completed,

    /// Step failed under a soft policy; the run continues.
    Warned,

    /// Step failed and aborted the run.
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Completed => "completed",
            StepStatus::Warned => "warned",
            StepStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Result of executing a step.
#[derive(Debug)]
pub struct StepResult {
    /// Step name.
    pub name: String,

    /// Step title.
    pub title: String,

    /// Whether the step succeeded.
    pub ok: bool,

    /// Whether the failure aborts the pipeline.
    pub fatal: bool,

    /// Execution duration (including propagation waits).
    pub duration: Duration,

    /// Outputs this step wrote, without the namespace.
    pub outputs: BTreeMap<String, String>,

    /// The created resource, for create steps that ran for real.
    pub descriptor: Option<ResourceDescriptor>,

    /// Control-plane attempts made.
    pub attempts: u32,

    /// The rendered call, for dry runs.
    pub command: Option<String>,

    /// Error (if failed).
    pub error: Option<StackwireError>,
}

impl StepResult {
    fn success(step: &Step, duration: Duration) -> Self {
        Self {
            name: step.name.clone(),
            title: step.title.clone(),
            ok: true,
            fatal: false,
            duration,
            outputs: BTreeMap::new(),
            descriptor: None,
            attempts: 0,
            command: None,
            error: None,
        }
    }

    fn failure(step: &Step, duration: Duration, fatal: bool, error: StackwireError) -> Self {
        Self {
            ok: false,
            fatal,
            error: Some(error),
            ..Self::success(step, duration)
        }
    }

    /// Get the status of this result.
    pub fn status(&self) -> StepStatus {
        match (self.ok, self.fatal) {
            (true, _) => StepStatus::Completed,
            (false, false) => StepStatus::Warned,
            (false, true) => StepStatus::Failed,
        }
    }

    /// Error message, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Format a duration as `850ms`, `5.2s` or `1m 5s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{}s", secs, millis / 100)
    } else {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}

/// Options for step execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Render the call instead of making it.
    pub dry_run: bool,
}

/// Execute a single step.
///
/// Never returns an error: failures are reported in the [`StepResult`], with
/// `fatal` set according to the error class and the step's policy.
pub fn execute_step(
    step: &Step,
    registry: &mut OutputRegistry,
    client: &dyn ResourceClient,
    waiter: &PropagationWaiter,
    options: &ExecutionOptions,
) -> StepResult {
    let start = Instant::now();

    match run_step(step, registry, client, waiter, options) {
        Ok(mut result) => {
            result.duration = start.elapsed();
            info!("Step '{}' completed in {}", step.name, format_duration(result.duration));
            result
        }
        Err(err) => {
            let fatal = err.is_always_fatal() || step.policy == FailurePolicy::Hard;
            if fatal {
                warn!("Step '{}' failed: {}", step.name, err);
            } else {
                warn!("Step '{}' failed (continuing, policy soft): {}", step.name, err);
            }
            StepResult::failure(step, start.elapsed(), fatal, err)
        }
    }
}

fn run_step(
    step: &Step,
    registry: &mut OutputRegistry,
    client: &dyn ResourceClient,
    waiter: &PropagationWaiter,
    options: &ExecutionOptions,
) -> Result<StepResult> {
    let params = resolve_params(step, registry)?;
    let command = client.describe(step.operation, step.kind, &params);
    debug!("Step '{}' resolved: {}", step.name, command);

    if options.dry_run {
        return dry_run(step, registry, command);
    }

    let call = || -> Result<(Option<ResourceDescriptor>, BTreeMap<String, String>)> {
        match step.operation {
            Operation::Create => client.create(step.kind, &params).map(|d| (Some(d), BTreeMap::new())),
            Operation::Show => client
                .show(step.kind, &params, &step.field_specs())
                .map(|fields| (None, fields)),
        }
    };

    let ((descriptor, shown), attempts) = if step.awaits_propagation {
        waiter.settle();
        waiter.retry(&step.name, call)?
    } else {
        (call()?, 1)
    };

    let mut values = match &descriptor {
        Some(d) => extract_fields(step.kind, &d.name, &d.properties, &step.field_specs())?,
        None => shown,
    };

    for output in &step.outputs {
        if let OutputSource::Derived(template) = &output.source {
            values.insert(output.name.clone(), resolve_string(template, &step.name, registry)?);
        }
    }

    let outputs = merge_outputs(step, registry, values)?;

    Ok(StepResult {
        outputs,
        descriptor,
        attempts,
        command: Some(command),
        ..StepResult::success(step, Duration::ZERO)
    })
}

/// Resolve every parameter; an unknown reference fails before any call.
fn resolve_params(step: &Step, registry: &OutputRegistry) -> Result<Params> {
    step.params
        .iter()
        .map(|(name, param)| Ok((name.clone(), param.resolve(&step.name, registry)?)))
        .collect()
}

fn dry_run(step: &Step, registry: &mut OutputRegistry, command: String) -> Result<StepResult> {
    let mut values = BTreeMap::new();
    for output in &step.outputs {
        let value = match &output.source {
            OutputSource::Field(_) => format!("<{}>", OutputRegistry::key(&step.name, &output.name)),
            OutputSource::Derived(template) => resolve_string(template, &step.name, registry)?,
        };
        values.insert(output.name.clone(), value);
    }

    let outputs = merge_outputs(step, registry, values)?;

    Ok(StepResult {
        outputs,
        command: Some(command),
        ..StepResult::success(step, Duration::ZERO)
    })
}

/// Write declared outputs in declaration order.
fn merge_outputs(
    step: &Step,
    registry: &mut OutputRegistry,
    mut values: BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let mut written = BTreeMap::new();
    for output in &step.outputs {
        let Some(value) = values.remove(&output.name) else {
            continue;
        };
        registry.set(OutputRegistry::key(&step.name, &output.name), value.clone())?;
        written.insert(output.name.clone(), value);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{MockClient, ResourceKind};
    use crate::runner::propagation::{PropagationPolicy, RecordingSleeper};
    use serde_json::json;
    use std::rc::Rc;

    fn waiter() -> (PropagationWaiter, Rc<RecordingSleeper>) {
        let sleeper = Rc::new(RecordingSleeper::new());
        let policy = PropagationPolicy {
            initial_delay: Duration::from_secs(30),
            base_delay: Duration::from_millis(100),
            factor: 2.0,
            max_delay: Duration::from_secs(1),
            max_elapsed: Duration::from_secs(10),
        };
        (
            PropagationWaiter::new(policy, Box::new(sleeper.clone())).with_seed(1),
            sleeper,
        )
    }

    fn identity_step() -> Step {
        Step::create("identity", ResourceKind::Identity)
            .literal("name", "id-demo")
            .literal("resource_group", "rg")
            .literal("location", "eastus")
            .output("id", "/id")
            .output("principalId", "/principalId")
            .output("clientId", "/clientId")
            .build()
    }

    fn role_step() -> Step {
        Step::create("cosmos_role", ResourceKind::CosmosRoleAssignment)
            .literal("account", "cosmos-demo")
            .literal("resource_group", "rg")
            .literal("role_definition_id", "00000000-0000-0000-0000-000000000002")
            .reference("principal_id", "identity.principalId")
            .literal("scope", "/")
            .soft()
            .awaits_propagation()
            .build()
    }

    #[test]
    fn success_merges_outputs_under_namespace() {
        let client = MockClient::new().with_payload(
            ResourceKind::Identity,
            json!({"principalId": "p-1", "clientId": "c-1"}),
        );
        let (waiter, sleeper) = waiter();
        let mut registry = OutputRegistry::new();

        let result = execute_step(
            &identity_step(),
            &mut registry,
            &client,
            &waiter,
            &ExecutionOptions::default(),
        );

        assert!(result.ok, "{:?}", result.error);
        assert_eq!(result.status(), StepStatus::Completed);
        assert_eq!(result.attempts, 1);
        assert_eq!(registry.get("identity.principalId"), Some("p-1"));
        assert_eq!(registry.get("identity.clientId"), Some("c-1"));
        assert_eq!(registry.get("identity.id"), Some("/mock/identity/id-demo"));
        assert_eq!(result.outputs.len(), 3);
        assert!(result.descriptor.is_some());
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn unresolved_reference_fails_before_any_call() {
        let client = MockClient::new();
        let (waiter, sleeper) = waiter();
        let mut registry = OutputRegistry::new();

        let result = execute_step(
            &role_step(),
            &mut registry,
            &client,
            &waiter,
            &ExecutionOptions::default(),
        );

        assert!(!result.ok);
        assert!(result.fatal, "unresolved references are fatal even for soft steps");
        assert!(matches!(
            result.error,
            Some(StackwireError::UnresolvedReference { .. })
        ));
        assert_eq!(client.call_count(), 0);
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn soft_failure_is_not_fatal_and_leaves_registry_alone() {
        let client = MockClient::new().fail_always(ResourceKind::CosmosRoleAssignment, "Forbidden");
        let (waiter, _) = waiter();
        let mut registry = OutputRegistry::new();
        registry.set("identity.principalId", "p-1").unwrap();

        let result = execute_step(
            &role_step(),
            &mut registry,
            &client,
            &waiter,
            &ExecutionOptions::default(),
        );

        assert!(!result.ok);
        assert!(!result.fatal);
        assert_eq!(result.status(), StepStatus::Warned);
        assert!(matches!(
            result.error,
            Some(StackwireError::PropagationTimeout { .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn hard_failure_is_fatal() {
        let client = MockClient::new().fail_always(ResourceKind::Identity, "QuotaExceeded");
        let (waiter, _) = waiter();
        let mut registry = OutputRegistry::new();

        let result = execute_step(
            &identity_step(),
            &mut registry,
            &client,
            &waiter,
            &ExecutionOptions::default(),
        );

        assert!(result.fatal);
        assert_eq!(result.status(), StepStatus::Failed);
        assert!(result.error_message().unwrap().contains("QuotaExceeded"));
        assert!(registry.is_empty());
    }

    #[test]
    fn propagation_step_waits_then_retries() {
        let client = MockClient::new().fail_times(
            ResourceKind::CosmosRoleAssignment,
            2,
            "principal not found",
        );
        let (waiter, sleeper) = waiter();
        let mut registry = OutputRegistry::new();
        registry.set("identity.principalId", "p-1").unwrap();

        let result = execute_step(
            &role_step(),
            &mut registry,
            &client,
            &waiter,
            &ExecutionOptions::default(),
        );

        assert!(result.ok, "{:?}", result.error);
        assert_eq!(result.attempts, 3);
        let sleeps = sleeper.sleeps();
        assert_eq!(sleeps.len(), 3);
        assert_eq!(sleeps[0], Duration::from_secs(30));
        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].params["principal_id"], "p-1");
    }

    #[test]
    fn missing_payload_field_is_provisioning_error() {
        let client = MockClient::new().with_payload(ResourceKind::Identity, json!({"principalId": "p-1"}));
        let (waiter, _) = waiter();
        let mut registry = OutputRegistry::new();

        let result = execute_step(
            &identity_step(),
            &mut registry,
            &client,
            &waiter,
            &ExecutionOptions::default(),
        );

        assert!(result.fatal);
        assert!(matches!(
            result.error,
            Some(StackwireError::ProvisioningError { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_output_is_fatal_even_when_soft() {
        let step = Step::create("identity", ResourceKind::Identity)
            .literal("name", "id-demo")
            .literal("resource_group", "rg")
            .literal("location", "eastus")
            .output("principalId", "/principalId")
            .soft()
            .build();
        let client = MockClient::new();
        let (waiter, _) = waiter();
        let mut registry = OutputRegistry::new();
        registry.set("identity.principalId", "stale").unwrap();

        let result = execute_step(&step, &mut registry, &client, &waiter, &ExecutionOptions::default());

        assert!(result.fatal);
        assert!(matches!(result.error, Some(StackwireError::DuplicateOutput { .. })));
        assert_eq!(registry.get("identity.principalId"), Some("stale"));
    }

    #[test]
    fn show_step_reads_fields() {
        let step = Step::show("account", ResourceKind::Account)
            .output("subscriptionId", "/id")
            .output("tenantId", "/tenantId")
            .build();
        let client = MockClient::new();
        let (waiter, _) = waiter();
        let mut registry = OutputRegistry::new();

        let result = execute_step(&step, &mut registry, &client, &waiter, &ExecutionOptions::default());

        assert!(result.ok);
        assert!(result.descriptor.is_none());
        assert!(registry.contains("account.subscriptionId"));
        assert!(registry.contains("account.tenantId"));
    }

    #[test]
    fn derived_output_uses_registry() {
        let step = Step::create("image", ResourceKind::ImageBuild)
            .reference("registry", "registry.name")
            .literal("image", "todo-api:v1")
            .literal("context", ".")
            .derived("ref", "${registry.loginServer}/todo-api:v1")
            .build();
        let client = MockClient::new();
        let (waiter, _) = waiter();
        let mut registry = OutputRegistry::new();
        registry.set("registry.name", "acrdemo").unwrap();
        registry.set("registry.loginServer", "acrdemo.azurecr.io").unwrap();

        let result = execute_step(&step, &mut registry, &client, &waiter, &ExecutionOptions::default());

        assert!(result.ok, "{:?}", result.error);
        assert_eq!(registry.get("image.ref"), Some("acrdemo.azurecr.io/todo-api:v1"));
    }

    #[test]
    fn dry_run_renders_and_writes_placeholders() {
        let client = MockClient::new();
        let (waiter, sleeper) = waiter();
        let mut registry = OutputRegistry::new();
        let options = ExecutionOptions { dry_run: true };

        let first = execute_step(&identity_step(), &mut registry, &client, &waiter, &options);
        let second = execute_step(&role_step(), &mut registry, &client, &waiter, &options);

        assert!(first.ok && second.ok);
        assert_eq!(client.call_count(), 0);
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(
            registry.get("identity.principalId"),
            Some("<identity.principalId>")
        );
        let command = second.command.unwrap();
        assert!(command.contains("principal_id=<identity.principalId>"));
    }

    #[test]
    fn format_duration_ranges() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(5200)), "5.2s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }
}

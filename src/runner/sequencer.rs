//! Pipeline execution.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::cloud::{ResourceClient, ResourceDescriptor};
use crate::outputs::OutputRegistry;
use crate::steps::{execute_step, ExecutionOptions, Step, StepResult};

use super::pipeline::Pipeline;
use super::propagation::PropagationWaiter;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    SucceededWithWarnings,
    Failed,
}

impl RunState {
    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::SucceededWithWarnings)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::SucceededWithWarnings => "succeeded with warnings",
            RunState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Progress events emitted during a run.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A step is about to start.
    StepStarting {
        step: &'a Step,
        index: usize,
        total: usize,
    },
    /// A step finished.
    StepFinished {
        step: &'a Step,
        result: &'a StepResult,
    },
}

/// Options for running a pipeline.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Render calls instead of making them.
    pub dry_run: bool,
}

/// Outcome of a run.
#[derive(Debug)]
pub struct RunResult {
    pub state: RunState,
    /// Every output written before the run stopped.
    pub registry: OutputRegistry,
    /// Results of the steps that ran, in order.
    pub steps: Vec<StepResult>,
    /// One message per soft failure.
    pub warnings: Vec<String>,
    /// Every resource created, in creation order.
    pub created: Vec<ResourceDescriptor>,
    /// Steps that never ran because an earlier step failed.
    pub not_run: Vec<String>,
    pub duration: Duration,
    pub dry_run: bool,
}

impl RunResult {
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// The step that aborted the run.
    pub fn failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|r| r.fatal)
    }

    /// Process exit code: 0 on success (with or without warnings), 2 when
    /// the run was aborted by bad input, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.state.is_success() {
            return 0;
        }
        let configuration = self
            .failure()
            .and_then(|r| r.error.as_ref())
            .is_some_and(|e| e.is_configuration());
        if configuration {
            2
        } else {
            1
        }
    }
}

/// Runs a pipeline step by step against a resource client.
pub struct PipelineRunner<'a> {
    pipeline: &'a Pipeline,
    client: &'a dyn ResourceClient,
    waiter: &'a PropagationWaiter,
    state: RunState,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        pipeline: &'a Pipeline,
        client: &'a dyn ResourceClient,
        waiter: &'a PropagationWaiter,
    ) -> Self {
        Self {
            pipeline,
            client,
            waiter,
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run every step in order.
    pub fn run(&mut self, options: &RunOptions) -> RunResult {
        self.run_with_progress(options, |_| {})
    }

    /// Run every step in order, reporting progress to `on_progress`.
    ///
    /// Stops at the first fatal failure. Created resources are left in place.
    pub fn run_with_progress(
        &mut self,
        options: &RunOptions,
        mut on_progress: impl FnMut(RunProgress<'_>),
    ) -> RunResult {
        let start = Instant::now();
        self.state = RunState::Running;

        let exec_options = ExecutionOptions {
            dry_run: options.dry_run,
        };
        let steps = self.pipeline.steps();
        let total = steps.len();

        let mut registry = OutputRegistry::new();
        let mut results = Vec::with_capacity(total);
        let mut warnings = Vec::new();
        let mut created = Vec::new();
        let mut not_run = Vec::new();
        let mut failed = false;

        for (index, step) in steps.iter().enumerate() {
            if failed {
                not_run.push(step.name.clone());
                continue;
            }

            on_progress(RunProgress::StepStarting { step, index, total });
            info!("Running step {}/{}: {}", index + 1, total, step.name);

            let result = execute_step(step, &mut registry, self.client, self.waiter, &exec_options);

            on_progress(RunProgress::StepFinished {
                step,
                result: &result,
            });

            if let Some(descriptor) = &result.descriptor {
                created.push(descriptor.clone());
            }

            if !result.ok {
                let message = format!(
                    "{}: {}",
                    step.title,
                    result.error_message().unwrap_or_default()
                );
                if result.fatal {
                    warn!("Pipeline stopped at '{}'", step.name);
                    failed = true;
                } else {
                    warnings.push(message);
                }
            }

            results.push(result);
        }

        self.state = if failed {
            RunState::Failed
        } else if warnings.is_empty() {
            RunState::Succeeded
        } else {
            RunState::SucceededWithWarnings
        };
        info!("Pipeline {} ({} warning(s))", self.state, warnings.len());

        RunResult {
            state: self.state,
            registry,
            steps: results,
            warnings,
            created,
            not_run,
            duration: start.elapsed(),
            dry_run: options.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{MockClient, ResourceKind};
    use crate::runner::propagation::{PropagationPolicy, RecordingSleeper};

    fn waiter() -> PropagationWaiter {
        let policy = PropagationPolicy {
            initial_delay: Duration::from_secs(1),
            base_delay: Duration::from_millis(10),
            factor: 2.0,
            max_delay: Duration::from_millis(100),
            max_elapsed: Duration::from_secs(1),
        };
        PropagationWaiter::new(policy, Box::new(RecordingSleeper::new())).with_seed(3)
    }

    fn group(name: &str) -> Step {
        Step::create(name, ResourceKind::ResourceGroup)
            .literal("name", format!("rg-{}", name))
            .literal("location", "eastus")
            .output("id", "/id")
            .build()
    }

    #[test]
    fn all_steps_succeed() {
        let pipeline = Pipeline::new(vec![group("a"), group("b")]).unwrap();
        let client = MockClient::new();
        let waiter = waiter();
        let mut runner = PipelineRunner::new(&pipeline, &client, &waiter);
        assert_eq!(runner.state(), RunState::Pending);

        let result = runner.run(&RunOptions::default());

        assert_eq!(result.state, RunState::Succeeded);
        assert_eq!(runner.state(), RunState::Succeeded);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.created.len(), 2);
        assert_eq!(result.exit_code(), 0);
        assert!(result.failure().is_none());
    }

    #[test]
    fn fatal_failure_stops_the_run() {
        let pipeline = Pipeline::new(vec![group("a"), group("b"), group("c")]).unwrap();
        let client = MockClient::new().fail_named("rg-b", "conflict");
        let waiter = waiter();

        let result = PipelineRunner::new(&pipeline, &client, &waiter).run(&RunOptions::default());

        assert_eq!(result.state, RunState::Failed);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.not_run, vec!["c"]);
        assert_eq!(result.failure().map(|r| r.name.as_str()), Some("b"));
        assert_eq!(result.created.len(), 1);
        assert_eq!(result.exit_code(), 1);
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn soft_failure_continues_with_warning() {
        let soft = Step::create("b", ResourceKind::ResourceGroup)
            .literal("name", "rg-b")
            .literal("location", "eastus")
            .soft()
            .build();
        let pipeline = Pipeline::new(vec![group("a"), soft, group("c")]).unwrap();
        let client = MockClient::new().fail_named("rg-b", "conflict");
        let waiter = waiter();

        let result = PipelineRunner::new(&pipeline, &client, &waiter).run(&RunOptions::default());

        assert_eq!(result.state, RunState::SucceededWithWarnings);
        assert_eq!(result.warning_count(), 1);
        assert!(result.warnings[0].contains("conflict"));
        assert_eq!(result.steps.len(), 3);
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn configuration_failure_exits_with_two() {
        let broken = Step::create("a", ResourceKind::ResourceGroup)
            .literal("name", "rg-a")
            .build();
        let pipeline = Pipeline::new(vec![broken]).unwrap();
        let client = MockClient::new();
        let waiter = waiter();

        let result = PipelineRunner::new(&pipeline, &client, &waiter).run(&RunOptions::default());

        assert_eq!(result.state, RunState::Failed);
        assert_eq!(result.exit_code(), 2);
    }

    #[test]
    fn progress_events_bracket_each_step() {
        let pipeline = Pipeline::new(vec![group("a"), group("b")]).unwrap();
        let client = MockClient::new();
        let waiter = waiter();
        let mut events = Vec::new();

        PipelineRunner::new(&pipeline, &client, &waiter).run_with_progress(
            &RunOptions::default(),
            |event| match event {
                RunProgress::StepStarting { step, index, total } => {
                    events.push(format!("start {} {}/{}", step.name, index + 1, total))
                }
                RunProgress::StepFinished { step, result } => {
                    events.push(format!("finish {} {}", step.name, result.status()))
                }
            },
        );

        assert_eq!(
            events,
            vec![
                "start a 1/2",
                "finish a completed",
                "start b 2/2",
                "finish b completed"
            ]
        );
    }

    #[test]
    fn dry_run_creates_nothing() {
        let pipeline = Pipeline::new(vec![group("a")]).unwrap();
        let client = MockClient::new();
        let waiter = waiter();

        let result = PipelineRunner::new(&pipeline, &client, &waiter).run(&RunOptions { dry_run: true });

        assert_eq!(result.state, RunState::Succeeded);
        assert!(result.dry_run);
        assert!(result.created.is_empty());
        assert_eq!(client.call_count(), 0);
        assert_eq!(result.registry.get("a.id"), Some("<a.id>"));
    }

    #[test]
    fn run_state_display() {
        assert_eq!(RunState::SucceededWithWarnings.to_string(), "succeeded with warnings");
        assert!(RunState::SucceededWithWarnings.is_success());
        assert!(!RunState::Failed.is_success());
    }
}

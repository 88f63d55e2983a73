//! Run command implementation.
//!
//! Loads and validates the configuration, resolves resource names, builds the
//! pipeline and runs it against the Azure CLI (or renders it with
//! `--dry-run`), then prints the summary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::args::Cli;
use crate::cloud::{AzCliClient, ResourceClient};
use crate::config::{load_config, validate, NameGenerator, ResolvedNames, StackwireConfig};
use crate::deploy::{app_sections, build_pipeline};
use crate::error::{Result, StackwireError};
use crate::runner::{
    headline, run_sections, Pipeline, PipelineRunner, PropagationPolicy, PropagationWaiter,
    RunOptions, RunProgress, RunResult, RunState,
};
use crate::shell::find_program;
use crate::steps::{format_duration, StepResult, StepStatus};
use crate::ui::{SpinnerHandle, UserInterface};

use super::dispatcher::{Command, CommandResult};

/// Everything needed to start a run.
#[derive(Debug)]
pub struct Plan {
    pub config: StackwireConfig,
    pub names: ResolvedNames,
    pub pipeline: Pipeline,
}

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    cli: Cli,
    env: HashMap<String, String>,
}

impl RunCommand {
    pub fn new(project_root: &Path, cli: Cli) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            cli,
            env: HashMap::new(),
        }
    }

    /// Use this environment snapshot for `STACKWIRE_*` overrides.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Load and validate configuration, resolve names and build the pipeline.
    pub fn plan(&self) -> Result<Plan> {
        let config = load_config(
            &self.project_root,
            self.cli.config.as_deref(),
            &self.env,
            &self.cli.overrides(),
        )?;
        validate(&config)?;

        let generator = NameGenerator::new(&config.naming);
        let names = ResolvedNames::resolve(&config, &generator)?;
        let pipeline = build_pipeline(&config, &names)?;

        Ok(Plan {
            config,
            names,
            pipeline,
        })
    }

    /// Run a prepared plan against `client`.
    pub fn deploy(
        &self,
        ui: &mut dyn UserInterface,
        plan: &Plan,
        client: &dyn ResourceClient,
        waiter: &PropagationWaiter,
    ) -> CommandResult {
        let config = &plan.config;
        let dry_run = self.cli.dry_run;

        ui.show_header(&format!(
            "Deploying {} to {} ({})",
            config.app.name, plan.names.resource_group, config.location
        ));
        ui.message(&format!(
            "Started {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        if dry_run {
            ui.message("Dry run: no Azure resources will be created");
        }
        if ui.output_mode().shows_commands() {
            let lines = plan
                .names
                .entries()
                .iter()
                .map(|(kind, name)| format!("{}: {}", kind, name))
                .collect::<Vec<_>>();
            ui.show_section("Resource names", &lines);
        }

        info!(
            "Running {} step(s){}",
            plan.pipeline.len(),
            if dry_run { " (dry run)" } else { "" }
        );

        let show_commands = ui.output_mode().shows_commands();
        let mut spinner: Option<Box<dyn SpinnerHandle>> = None;
        let mut runner = PipelineRunner::new(&plan.pipeline, client, waiter);
        let result = runner.run_with_progress(&RunOptions { dry_run }, |progress| match progress {
            RunProgress::StepStarting { step, index, total } => {
                spinner = Some(ui.start_spinner(&format!(
                    "[{}/{}] {}",
                    index + 1,
                    total,
                    step.title
                )));
            }
            RunProgress::StepFinished { step, result } => {
                if let Some(mut handle) = spinner.take() {
                    finish_spinner(handle.as_mut(), &step.title, result);
                }
                if show_commands && !dry_run {
                    if let Some(command) = &result.command {
                        ui.message(&format!("    {}", command));
                    }
                }
            }
        });

        self.report(ui, config, &result);

        if result.state.is_success() {
            CommandResult::success()
        } else {
            CommandResult::failure(result.exit_code())
        }
    }

    fn report(&self, ui: &mut dyn UserInterface, config: &StackwireConfig, result: &RunResult) {
        let full = ui.output_mode().shows_summary();
        let mut sections = run_sections(result);
        if result.state.is_success() {
            let secret = config.sample_secret.as_ref().map(|s| s.name.as_str());
            sections.extend(app_sections(result, secret));
        }

        for section in &sections {
            if full || section.heading == "Failure" {
                ui.show_section(&section.heading, &section.lines);
            }
        }

        ui.message("");
        let verdict = headline(result);
        match result.state {
            RunState::Succeeded => ui.success(&verdict),
            RunState::SucceededWithWarnings => ui.warning(&verdict),
            _ => ui.error(&verdict),
        }
    }

    fn report_plan_error(&self, ui: &mut dyn UserInterface, err: &StackwireError) -> CommandResult {
        match err {
            StackwireError::ConfigNotFound { path } => {
                ui.error(&format!("No configuration found at {}", path.display()));
            }
            _ => ui.error(&err.to_string()),
        }
        CommandResult::failure(if err.is_configuration() { 2 } else { 1 })
    }
}

/// Bind the client to the executable found on `PATH`.
///
/// Dry runs spawn nothing and render plain `az` commands.
fn select_client(dry_run: bool, found: Option<PathBuf>) -> Option<AzCliClient> {
    match found {
        _ if dry_run => Some(AzCliClient::new()),
        Some(path) => Some(AzCliClient::with_program(path.to_string_lossy())),
        None => None,
    }
}

fn finish_spinner(handle: &mut dyn SpinnerHandle, title: &str, result: &StepResult) {
    let duration = format_duration(result.duration);
    let error = result.error_message().unwrap_or_default();
    match result.status() {
        StepStatus::Completed if result.attempts > 1 => handle.finish_success(&format!(
            "{} ({}, {} attempts)",
            title, duration, result.attempts
        )),
        StepStatus::Completed => handle.finish_success(&format!("{} ({})", title, duration)),
        StepStatus::Warned => handle.finish_warning(&format!("{} (continuing): {}", title, error)),
        _ => handle.finish_error(&format!("{}: {}", title, error)),
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(err) => return Ok(self.report_plan_error(ui, &err)),
        };

        if self.cli.output_mode().is_none() {
            ui.set_output_mode(plan.config.settings.default_output.into());
        }

        let client = match select_client(self.cli.dry_run, find_program("az")) {
            Some(client) => client.in_dir(&self.project_root),
            None => {
                ui.error(
                    "Azure CLI ('az') not found on PATH. Install it, or use --dry-run to preview.",
                );
                return Ok(CommandResult::failure(1));
            }
        };

        let waiter = PropagationWaiter::blocking(PropagationPolicy::from(&plan.config.propagation));
        Ok(self.deploy(ui, &plan, &client, &waiter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{MockClient, ResourceKind};
    use crate::runner::RecordingSleeper;
    use crate::ui::{MockUI, OutputMode, SpinnerOutcome};
    use std::fs;
    use tempfile::TempDir;

    fn project(yaml: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("stackwire.yml"), yaml).unwrap();
        temp
    }

    fn command(temp: &TempDir, cli: Cli) -> RunCommand {
        RunCommand::new(temp.path(), cli)
    }

    fn waiter() -> PropagationWaiter {
        PropagationWaiter::new(PropagationPolicy::default(), Box::new(RecordingSleeper::new()))
            .with_seed(1)
    }

    #[test]
    fn client_runs_the_executable_that_was_found() {
        let found = PathBuf::from("/opt/az/bin/az.cmd");
        let client = select_client(false, Some(found.clone())).unwrap();
        assert_eq!(client.program(), found.to_string_lossy());

        assert!(select_client(false, None).is_none());
    }

    #[test]
    fn dry_run_client_renders_plain_az() {
        let found = PathBuf::from("/usr/local/bin/az");
        assert_eq!(select_client(true, Some(found)).unwrap().program(), "az");
        assert_eq!(select_client(true, None).unwrap().program(), "az");
    }

    #[test]
    fn plan_applies_flags_over_file() {
        let temp = project("location: westus\napp:\n  tag: v1\n");
        let cli = Cli {
            image_tag: Some("v9".to_string()),
            ..Cli::default()
        };
        let plan = command(&temp, cli).plan().unwrap();
        assert_eq!(plan.config.location, "westus");
        assert_eq!(plan.config.app.tag, "v9");
        assert_eq!(plan.pipeline.len(), 14);
    }

    #[test]
    fn plan_reports_every_validation_problem() {
        let temp = project("cosmos:\n  throughput: 100\napp:\n  target_port: 0\n");
        let err = command(&temp, Cli::default()).plan().unwrap_err();
        assert!(err.is_configuration());
        let message = err.to_string();
        assert!(message.contains("Throughput 100"));
        assert!(message.contains("Target port"));
    }

    #[test]
    fn invalid_config_exits_with_two() {
        let temp = project("cosmos:\n  partition_key: category\n");
        let mut ui = MockUI::new();
        let result = command(&temp, Cli::default()).execute(&mut ui).unwrap();
        assert_eq!(result.exit_code, 2);
        assert_eq!(ui.errors().len(), 1);
    }

    #[test]
    fn deploy_prints_app_url_and_checks() {
        let temp = project("");
        let cmd = command(&temp, Cli::default());
        let plan = cmd.plan().unwrap();
        let client = MockClient::new();
        let mut ui = MockUI::new();

        let result = cmd.deploy(&mut ui, &plan, &client, &waiter());

        assert_eq!(result, CommandResult::success());
        assert_eq!(ui.spinners().len(), 14);
        assert_eq!(
            ui.section("Application").unwrap(),
            ["https://ca-todo-api.cae-todo-api.azurecontainerapps.io"]
        );
        let env = ui.section("Application environment").unwrap();
        assert!(env.contains(&"COSMOS_DATABASE_NAME=SampleDB".to_string()));
        assert!(ui.section("Verify").unwrap()[0].ends_with("/health"));
        assert!(ui.successes()[0].starts_with("Deployment succeeded"));
    }

    #[test]
    fn soft_role_failure_warns_and_exits_zero() {
        let temp = project("");
        let cmd = command(&temp, Cli::default());
        let plan = cmd.plan().unwrap();
        let client = MockClient::new().fail_always(ResourceKind::CosmosRoleAssignment, "Forbidden");
        let mut ui = MockUI::new();

        let result = cmd.deploy(&mut ui, &plan, &client, &waiter());

        assert_eq!(result.exit_code, 0);
        assert!(ui.warnings()[0].contains("1 warning"));
        assert!(ui
            .spinner_outcomes()
            .iter()
            .any(|o| matches!(o, SpinnerOutcome::Warning(m) if m.contains("Forbidden"))));
        assert!(ui.section("Warnings").is_some());
    }

    #[test]
    fn hard_failure_reports_step_and_exits_one() {
        let temp = project("");
        let cmd = command(&temp, Cli::default());
        let plan = cmd.plan().unwrap();
        let client = MockClient::new().fail_named("kv-todo-api", "VaultAlreadyExists");
        let mut ui = MockUI::with_mode(OutputMode::Quiet);

        let result = cmd.deploy(&mut ui, &plan, &client, &waiter());

        assert_eq!(result.exit_code, 1);
        let failure = ui.section("Failure").unwrap();
        assert_eq!(failure[0], "Step: Create key vault (key_vault)");
        assert!(ui.section("Resources created").is_none());
        assert!(ui.errors()[0].contains("Create key vault"));
    }

    #[test]
    fn dry_run_lists_commands_without_calls() {
        let temp = project("");
        let cli = Cli {
            dry_run: true,
            ..Cli::default()
        };
        let cmd = command(&temp, cli);
        let plan = cmd.plan().unwrap();
        let client = MockClient::new();
        let mut ui = MockUI::new();

        let result = cmd.deploy(&mut ui, &plan, &client, &waiter());

        assert_eq!(result.exit_code, 0);
        assert_eq!(client.call_count(), 0);
        assert_eq!(ui.section("Commands").unwrap().len(), 14);
    }
}

//! Plain-text summary of a run.
//!
//! The report is a list of titled sections so that the CLI can style it
//! while tests can inspect it directly.

use crate::steps::format_duration;

use super::sequencer::{RunResult, RunState};

/// A titled block of summary lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub lines: Vec<String>,
}

impl Section {
    pub fn new(heading: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            heading: heading.into(),
            lines,
        }
    }
}

/// One-line verdict for the run.
pub fn headline(result: &RunResult) -> String {
    let duration = format_duration(result.duration);
    let prefix = if result.dry_run { "Dry run " } else { "Deployment " };
    match result.state {
        RunState::Succeeded => format!("{}succeeded in {}", prefix, duration),
        RunState::SucceededWithWarnings => format!(
            "{}succeeded with {} warning(s) in {}",
            prefix,
            result.warning_count(),
            duration
        ),
        RunState::Failed => {
            let step = result
                .failure()
                .map(|r| r.title.as_str())
                .unwrap_or("unknown step");
            format!("{}failed at '{}' after {}", prefix, step, duration)
        }
        RunState::Pending | RunState::Running => format!("{}{}", prefix, result.state),
    }
}

/// Sections describing what happened: resources, warnings and the failure.
pub fn run_sections(result: &RunResult) -> Vec<Section> {
    let mut sections = Vec::new();

    if !result.created.is_empty() {
        let lines = result
            .created
            .iter()
            .map(|d| match &d.scope {
                Some(scope) if d.name != *scope => {
                    format!("{} '{}' in {}  {}", d.kind, d.name, scope, d.id)
                }
                _ => format!("{} '{}'  {}", d.kind, d.name, d.id),
            })
            .collect();
        sections.push(Section::new("Resources created", lines));
    }

    if result.dry_run {
        let lines = result
            .steps
            .iter()
            .filter_map(|r| r.command.clone())
            .collect::<Vec<_>>();
        if !lines.is_empty() {
            sections.push(Section::new("Commands", lines));
        }
    }

    if !result.warnings.is_empty() {
        sections.push(Section::new("Warnings", result.warnings.clone()));
    }

    if let Some(failure) = result.failure() {
        let mut lines = vec![
            format!("Step: {} ({})", failure.title, failure.name),
            format!(
                "Cause: {}",
                failure.error_message().unwrap_or_else(|| "unknown error".into())
            ),
        ];
        if !result.not_run.is_empty() {
            lines.push(format!("Not run: {}", result.not_run.join(", ")));
        }
        if !result.created.is_empty() {
            lines.push(
                "Resources listed above were left in place; remove them manually if needed."
                    .to_string(),
            );
        }
        sections.push(Section::new("Failure", lines));
    }

    sections
}

//! Command dispatching.
//!
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for building the command from parsed flags

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cli::args::Cli;
use crate::error::Result;
use crate::ui::UserInterface;

use super::run::RunCommand;

/// Trait for command implementations.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Builds and runs the command for the parsed flags.
pub struct CommandDispatcher {
    project_root: PathBuf,
    env: HashMap<String, String>,
}

impl CommandDispatcher {
    /// Create a dispatcher reading the process environment.
    pub fn new(project_root: PathBuf) -> Self {
        Self::with_env(project_root, std::env::vars().collect())
    }

    /// Create a dispatcher with an explicit environment snapshot.
    pub fn with_env(project_root: PathBuf, env: HashMap<String, String>) -> Self {
        Self { project_root, env }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Dispatch and execute the run.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        RunCommand::new(&self.project_root, cli.clone())
            .with_env(self.env.clone())
            .execute(ui)
    }
}

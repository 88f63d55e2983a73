//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::Parser;
use std::path::PathBuf;

use crate::config::ConfigOverrides;
use crate::ui::OutputMode;

/// Stackwire - provision and wire up the todo-api stack on Azure.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "stackwire")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default stackwire.yml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Print every command without calling Azure
    #[arg(long)]
    pub dry_run: bool,

    /// Resource group to deploy into
    #[arg(long, value_name = "NAME")]
    pub resource_group: Option<String>,

    /// Azure region
    #[arg(long, value_name = "REGION")]
    pub location: Option<String>,

    /// Tag for the application image
    #[arg(long, value_name = "TAG")]
    pub image_tag: Option<String>,

    /// Seed for reproducible name suffixes
    #[arg(long, value_name = "SEED")]
    pub name_seed: Option<String>,

    /// Show verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Configuration values given on the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
            image_tag: self.image_tag.clone(),
            name_seed: self.name_seed.clone(),
        }
    }

    /// Output mode requested by flags, if any.
    pub fn output_mode(&self) -> Option<OutputMode> {
        if self.quiet {
            Some(OutputMode::Quiet)
        } else if self.verbose {
            Some(OutputMode::Verbose)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_defaults() {
        let cli = Cli::parse_from(["stackwire"]);
        assert!(!cli.dry_run);
        assert!(cli.config.is_none());
        assert_eq!(cli.output_mode(), None);
    }

    #[test]
    fn parses_deployment_flags() {
        let cli = Cli::parse_from([
            "stackwire",
            "--dry-run",
            "--image-tag",
            "v2",
            "--name-seed",
            "ci-42",
            "--location",
            "westeurope",
            "--config",
            "deploy/stackwire.yml",
        ]);
        assert!(cli.dry_run);
        let overrides = cli.overrides();
        assert_eq!(overrides.image_tag.as_deref(), Some("v2"));
        assert_eq!(overrides.name_seed.as_deref(), Some("ci-42"));
        assert_eq!(overrides.location.as_deref(), Some("westeurope"));
        assert!(overrides.resource_group.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("deploy/stackwire.yml")));
    }

    #[test]
    fn quiet_and_verbose_map_to_output_modes() {
        assert_eq!(
            Cli::parse_from(["stackwire", "-q"]).output_mode(),
            Some(OutputMode::Quiet)
        );
        assert_eq!(
            Cli::parse_from(["stackwire", "--verbose"]).output_mode(),
            Some(OutputMode::Verbose)
        );
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["stackwire", "-q", "-v"]).is_err());
    }
}

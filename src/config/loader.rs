//! Configuration file discovery and loading.
//!
//! Settings are layered in this order (later wins):
//! 1. Defaults
//! 2. `stackwire.yml` in the project root (or the file given with `--config`)
//! 3. `STACKWIRE_*` environment variables
//! 4. Command-line flags

use crate::config::schema::{NamingStrategy, StackwireConfig};
use crate::error::{Result, StackwireError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "stackwire.yml";

/// Environment variables read on top of the file.
pub const ENV_RESOURCE_GROUP: &str = "STACKWIRE_RESOURCE_GROUP";
pub const ENV_LOCATION: &str = "STACKWIRE_LOCATION";
pub const ENV_IMAGE_TAG: &str = "STACKWIRE_IMAGE_TAG";
pub const ENV_NAME_SEED: &str = "STACKWIRE_NAME_SEED";

/// Values that override the file (from the environment or from flags).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub image_tag: Option<String>,
    pub name_seed: Option<String>,
}

impl ConfigOverrides {
    /// Read the `STACKWIRE_*` variables from a snapshot of the environment.
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            resource_group: get(ENV_RESOURCE_GROUP),
            location: get(ENV_LOCATION),
            image_tag: get(ENV_IMAGE_TAG),
            name_seed: get(ENV_NAME_SEED),
        }
    }

    /// Apply every set value to `config`.
    ///
    /// A name seed switches the naming strategy to `seeded`.
    pub fn apply(&self, config: &mut StackwireConfig) {
        if let Some(rg) = &self.resource_group {
            config.resource_group = rg.clone();
        }
        if let Some(location) = &self.location {
            config.location = location.clone();
        }
        if let Some(tag) = &self.image_tag {
            config.app.tag = tag.clone();
        }
        if let Some(seed) = &self.name_seed {
            config.naming.strategy = NamingStrategy::Seeded;
            config.naming.seed = Some(seed.clone());
        }
    }
}

/// Find the project root by walking up from `start`.
///
/// Looks for a `stackwire.yml` first and falls back to a `.git` directory.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Some(current);
        }

        if current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load a single config file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<StackwireConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StackwireError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            StackwireError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content into a config.
///
/// An empty document yields the defaults.
pub fn parse_config(content: &str, source_path: &Path) -> Result<StackwireConfig> {
    if content.trim().is_empty() {
        return Ok(StackwireConfig::default());
    }

    serde_yaml::from_str(content).map_err(|e| StackwireError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load the project config, then layer environment variables and flags on top.
///
/// If `config_override` is given, that file is loaded instead of
/// `<project_root>/stackwire.yml`.
pub fn load_config(
    project_root: &Path,
    config_override: Option<&Path>,
    env: &HashMap<String, String>,
    flags: &ConfigOverrides,
) -> Result<StackwireConfig> {
    let path = match config_override {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => project_root.join(path),
        None => project_root.join(CONFIG_FILE),
    };

    debug!("Loading configuration from {}", path.display());
    let mut config = load_config_file(&path)?;

    ConfigOverrides::from_env(env).apply(&mut config);
    flags.apply(&mut config);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn find_project_root_finds_config_file() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("app").join("src");
        fs::create_dir_all(&subdir).unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "").unwrap();

        assert_eq!(find_project_root(&subdir), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn find_project_root_falls_back_to_git() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("src");
        fs::create_dir_all(&subdir).unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();

        assert_eq!(find_project_root(&subdir), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn load_config_file_missing() {
        let temp = TempDir::new().unwrap();
        let result = load_config_file(&temp.path().join(CONFIG_FILE));
        assert!(matches!(result, Err(StackwireError::ConfigNotFound { .. })));
    }

    #[test]
    fn load_config_file_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "app: [unclosed").unwrap();
        let result = load_config_file(&path);
        assert!(matches!(result, Err(StackwireError::ConfigParseError { .. })));
    }

    #[test]
    fn empty_file_is_defaults() {
        let config = parse_config("", Path::new(CONFIG_FILE)).unwrap();
        assert_eq!(config, StackwireConfig::default());
    }

    #[test]
    fn env_overrides_file_and_flags_override_env() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "resource_group: rg-file\nlocation: westus\napp:\n  tag: file-tag\n",
        )
        .unwrap();

        let env = env(&[
            (ENV_RESOURCE_GROUP, "rg-env"),
            (ENV_IMAGE_TAG, "env-tag"),
        ]);
        let flags = ConfigOverrides {
            image_tag: Some("flag-tag".to_string()),
            ..Default::default()
        };

        let config = load_config(temp.path(), None, &env, &flags).unwrap();
        assert_eq!(config.resource_group, "rg-env");
        assert_eq!(config.location, "westus");
        assert_eq!(config.app.tag, "flag-tag");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let overrides = ConfigOverrides::from_env(&env(&[(ENV_LOCATION, "")]));
        assert_eq!(overrides, ConfigOverrides::default());
    }

    #[test]
    fn name_seed_selects_seeded_strategy() {
        let mut config = StackwireConfig::default();
        ConfigOverrides {
            name_seed: Some("ci-42".to_string()),
            ..Default::default()
        }
        .apply(&mut config);
        assert_eq!(config.naming.strategy, NamingStrategy::Seeded);
        assert_eq!(config.naming.seed.as_deref(), Some("ci-42"));
    }

    #[test]
    fn relative_override_path_is_resolved_against_root() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("deploy")).unwrap();
        fs::write(temp.path().join("deploy/prod.yml"), "location: northeurope\n").unwrap();

        let config = load_config(
            temp.path(),
            Some(Path::new("deploy/prod.yml")),
            &HashMap::new(),
            &ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.location, "northeurope");
    }
}

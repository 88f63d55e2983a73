//! Resource name generation and validation.
//!
//! Database accounts, key vaults and registries share one namespace across
//! the whole cloud. [`NameGenerator`] appends a suffix to those names (random
//! per run, or derived from a seed so repeated runs agree), and
//! [`validate_name`] checks every final name against its kind's rules before
//! anything is provisioned.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::cloud::ResourceKind;
use crate::config::schema::{NamingConfig, NamingStrategy, StackwireConfig};
use crate::error::{Result, StackwireError};

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A naming rule for one resource kind.
struct NameRule {
    min: usize,
    max: usize,
    pattern: &'static LazyLock<Regex>,
    description: &'static str,
}

static LOWER_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("LOWER_HYPHEN must compile")
});

static VAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]([A-Za-z0-9-]*[A-Za-z0-9])?$").expect("VAULT must compile")
});

static ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("ALPHANUMERIC must compile"));

static LETTER_LOWER_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([a-z0-9-]*[a-z0-9])?$").expect("LETTER_LOWER_HYPHEN must compile")
});

static GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.()-]*[A-Za-z0-9_()-]$").expect("GROUP must compile")
});

static IDENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("IDENTITY must compile")
});

fn rule_for(kind: ResourceKind) -> Option<NameRule> {
    let rule = match kind {
        ResourceKind::ResourceGroup => NameRule {
            min: 1,
            max: 90,
            pattern: &GROUP,
            description: "letters, digits, '_', '.', '(', ')', '-'; must not end with '.'",
        },
        ResourceKind::Identity => NameRule {
            min: 3,
            max: 128,
            pattern: &IDENTITY,
            description: "letters, digits, '_' and '-', starting with a letter or digit",
        },
        ResourceKind::CosmosAccount => NameRule {
            min: 3,
            max: 44,
            pattern: &LOWER_HYPHEN,
            description: "lowercase letters, digits and '-', not starting or ending with '-'",
        },
        ResourceKind::KeyVault => NameRule {
            min: 3,
            max: 24,
            pattern: &VAULT,
            description: "letters, digits and '-', starting with a letter, no '--'",
        },
        ResourceKind::Registry => NameRule {
            min: 5,
            max: 50,
            pattern: &ALPHANUMERIC,
            description: "letters and digits only",
        },
        ResourceKind::ContainerEnvironment | ResourceKind::ContainerApp => NameRule {
            min: 2,
            max: 32,
            pattern: &LETTER_LOWER_HYPHEN,
            description: "lowercase letters, digits and '-', starting with a letter, no '--'",
        },
        _ => return None,
    };
    Some(rule)
}

/// Check a name against the rules of its kind.
pub fn validate_name(kind: ResourceKind, name: &str) -> Result<()> {
    let Some(rule) = rule_for(kind) else {
        return Ok(());
    };

    let invalid = |reason: String| StackwireError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    };

    let len = name.chars().count();
    if len < rule.min || len > rule.max {
        return Err(invalid(format!(
            "must be {}-{} characters long, got {}",
            rule.min, rule.max, len
        )));
    }

    let no_double_hyphen = matches!(
        kind,
        ResourceKind::KeyVault | ResourceKind::ContainerApp | ResourceKind::ContainerEnvironment
    );
    if !rule.pattern.is_match(name) || (no_double_hyphen && name.contains("--")) {
        return Err(invalid(format!("allowed: {}", rule.description)));
    }

    Ok(())
}

/// Maximum length of a name of this kind, if it has a rule.
pub fn max_len(kind: ResourceKind) -> Option<usize> {
    rule_for(kind).map(|r| r.max)
}

/// Produces the final names for globally unique resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameGenerator {
    suffix: Option<String>,
}

impl NameGenerator {
    /// Generator for this run, drawing random suffixes from the global RNG.
    pub fn new(config: &NamingConfig) -> Self {
        Self::with_rng(config, &mut fastrand::Rng::new())
    }

    /// Generator using the given RNG for the `random` strategy.
    pub fn with_rng(config: &NamingConfig, rng: &mut fastrand::Rng) -> Self {
        let suffix = match config.strategy {
            NamingStrategy::None => None,
            NamingStrategy::Random => Some(random_suffix(rng, config.suffix_length)),
            NamingStrategy::Seeded => Some(seeded_suffix(
                config.seed.as_deref().unwrap_or_default(),
                config.suffix_length,
            )),
        };
        Self { suffix }
    }

    /// The suffix applied to globally unique names this run.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Final name for `base`. Only globally unique kinds receive a suffix.
    pub fn apply(&self, kind: ResourceKind, base: &str) -> String {
        let Some(suffix) = self.suffix.as_deref() else {
            return base.to_string();
        };
        if !kind.is_globally_unique() {
            return base.to_string();
        }

        let (base, separator) = if kind == ResourceKind::Registry {
            let cleaned: String = base.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            (cleaned, "")
        } else {
            (base.to_string(), "-")
        };

        let room = max_len(kind)
            .unwrap_or(usize::MAX)
            .saturating_sub(suffix.len() + separator.len());
        let truncated: String = base.chars().take(room).collect();
        let truncated = truncated.trim_end_matches('-');

        format!("{}{}{}", truncated, separator, suffix)
    }
}

fn random_suffix(rng: &mut fastrand::Rng, len: usize) -> String {
    (0..len)
        .map(|_| SUFFIX_ALPHABET[rng.usize(..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

fn seeded_suffix(seed: &str, len: usize) -> String {
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    digest.chars().take(len).collect()
}

/// Every resource name used by one run, after suffixing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNames {
    pub resource_group: String,
    pub identity: String,
    pub cosmos_account: String,
    pub key_vault: String,
    pub registry: String,
    pub environment: String,
    pub app: String,
}

impl ResolvedNames {
    /// Apply the generator to the configured names and validate each result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for the first name that breaks its kind's rules.
    pub fn resolve(config: &StackwireConfig, generator: &NameGenerator) -> Result<Self> {
        let names = Self {
            resource_group: generator.apply(ResourceKind::ResourceGroup, &config.resource_group),
            identity: generator.apply(ResourceKind::Identity, &config.identity),
            cosmos_account: generator.apply(ResourceKind::CosmosAccount, &config.cosmos.account),
            key_vault: generator.apply(ResourceKind::KeyVault, &config.key_vault),
            registry: generator.apply(ResourceKind::Registry, &config.registry),
            environment: generator.apply(ResourceKind::ContainerEnvironment, &config.environment),
            app: generator.apply(ResourceKind::ContainerApp, &config.app.name),
        };

        for (kind, name) in names.entries() {
            validate_name(kind, name)?;
        }

        Ok(names)
    }

    /// Names paired with their kinds, in provisioning order.
    pub fn entries(&self) -> [(ResourceKind, &str); 7] {
        [
            (ResourceKind::ResourceGroup, self.resource_group.as_str()),
            (ResourceKind::Identity, self.identity.as_str()),
            (ResourceKind::CosmosAccount, self.cosmos_account.as_str()),
            (ResourceKind::KeyVault, self.key_vault.as_str()),
            (ResourceKind::Registry, self.registry.as_str()),
            (ResourceKind::ContainerEnvironment, self.environment.as_str()),
            (ResourceKind::ContainerApp, self.app.as_str()),
        ]
    }
}

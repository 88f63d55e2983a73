//! Output registry threaded between provisioning steps.
//!
//! Every value a step produces (identifiers, endpoints, URLs) is stored under
//! `"<step>.<field>"`. Keys are write-once for the duration of a run: a second
//! write to the same key is a mis-ordered pipeline, not an update.

use std::collections::BTreeMap;

use crate::error::{Result, StackwireError};

/// Write-once map of step outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRegistry {
    values: BTreeMap<String, String>,
}

impl OutputRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the namespaced key for a step output.
    pub fn key(step: &str, field: &str) -> String {
        format!("{}.{}", step, field)
    }

    /// Store a value. Fails without touching the existing value if the key is taken.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(StackwireError::DuplicateOutput { key });
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up a value on behalf of a step, failing with `UnresolvedReference`.
    pub fn require(&self, step: &str, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| StackwireError::UnresolvedReference {
                step: step.to_string(),
                key: key.to_string(),
            })
    }

    /// Check whether a key has been written.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

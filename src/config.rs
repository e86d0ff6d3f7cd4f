//! Lifecycle configuration loaded from `lifecycle.toml`.
//!
//! [`LifecycleConfig`] mirrors the file one to one. Anything missing from the
//! file falls back to a default, and a missing file means "no rules". The
//! `LIFECYCLE_DISABLED` environment variable wins over the `disabled` key.
//!
//! Rule tables keep their file order, which is also the order the runner
//! evaluates transition rules in.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LifecycleError, Result};
use crate::lifecycle::{
    DEFAULT_BATCH_SIZE, DeletionRule, ModerationState, PolicySnapshot, TransitionRule,
};

pub const DISABLED_ENV: &str = "LIFECYCLE_DISABLED";

/// `type -> bundle -> rule name -> settings`
pub type RuleTable<T> = IndexMap<String, IndexMap<String, IndexMap<String, T>>>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Master switch. A disabled run touches nothing.
    #[serde(default)]
    pub disabled: bool,

    /// Records loaded per store call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deletion rules.
    #[serde(default)]
    pub actions: RuleTable<ActionSettings>,

    /// Moderation state transition rules.
    #[serde(default)]
    pub fields: RuleTable<FieldSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActionSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub target_state: Option<String>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            batch_size: default_batch_size(),
            actions: IndexMap::new(),
            fields: IndexMap::new(),
        }
    }
}

impl LifecycleConfig {
    /// Loads `path`, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::parse(&contents)?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        config.apply_disabled_override(std::env::var(DISABLED_ENV).ok().as_deref());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str::<LifecycleConfig>(contents)?)
    }

    /// Applies the value of `LIFECYCLE_DISABLED`, if set to something usable.
    pub fn apply_disabled_override(&mut self, value: Option<&str>) {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return;
        };
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => self.disabled = true,
            "0" | "false" | "no" => self.disabled = false,
            other => warn!(var = DISABLED_ENV, value = other, "ignoring unrecognised value"),
        }
    }

    /// Validates the raw tables into the immutable policy for one run.
    pub fn snapshot(&self) -> Result<PolicySnapshot> {
        if self.batch_size == 0 {
            return Err(LifecycleError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let mut snapshot = if self.disabled {
            PolicySnapshot::disabled()
        } else {
            PolicySnapshot::default()
        }
        .with_batch_size(self.batch_size);

        for (entity_type, bundles) in &self.actions {
            for (bundle, rules) in bundles {
                for (name, settings) in rules {
                    let rule = DeletionRule {
                        name: name.clone(),
                        enabled: settings.enabled,
                        offset: non_empty(settings.offset.as_deref()),
                    };
                    snapshot = snapshot.with_deletion(entity_type, bundle, rule);
                }
            }
        }

        for (entity_type, bundles) in &self.fields {
            for (bundle, rules) in bundles {
                for (name, settings) in rules {
                    let rule = TransitionRule {
                        name: name.clone(),
                        enabled: settings.enabled,
                        offset: non_empty(settings.offset.as_deref()).unwrap_or_default(),
                        target_state: non_empty(settings.target_state.as_deref())
                            .map(|state| ModerationState::from(state.as_str())),
                    };
                    snapshot = snapshot.with_transition(entity_type, bundle, rule);
                }
            }
        }

        Ok(snapshot)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

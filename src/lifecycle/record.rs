use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::ModerationState;

/// A piece of content managed by the lifecycle scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub entity_type: String,
    pub bundle: String,
    #[serde(default)]
    pub label: String,
    /// Absolute canonical URL, reported in deletion logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `None` means the record is not moderated.
    #[serde(default)]
    pub moderation_state: Option<ModerationState>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub ignore_lifecycle: bool,
    /// Manual scheduling fields, keyed by transition rule name.
    ///
    /// A key mapped to `None` is a field the record has but nobody filled in.
    #[serde(default)]
    pub schedule: BTreeMap<String, Option<DateTime<Utc>>>,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    #[serde(default)]
    pub last_published: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(
        entity_type: impl Into<String>,
        bundle: impl Into<String>,
        id: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            bundle: bundle.into(),
            label: String::new(),
            url: None,
            moderation_state: None,
            is_new: false,
            ignore_lifecycle: false,
            schedule: BTreeMap::new(),
            created,
            changed: created,
            last_published: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<ModerationState>) -> Self {
        self.moderation_state = Some(state.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_published = Some(at);
        if self.changed < at {
            self.changed = at;
        }
        self
    }

    /// Whether a user filled in the scheduling field named `rule_name`.
    pub fn has_manual_schedule(&self, rule_name: &str) -> bool {
        matches!(self.schedule.get(rule_name), Some(Some(_)))
    }

    pub fn summary(&self) -> RecordRef {
        RecordRef {
            id: self.id.clone(),
            entity_type: self.entity_type.clone(),
            bundle: self.bundle.clone(),
            label: self.label.clone(),
        }
    }
}

/// Lightweight identity of a record, carried by lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: String,
    pub entity_type: String,
    pub bundle: String,
    pub label: String,
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.entity_type, self.bundle, self.id)
    }
}

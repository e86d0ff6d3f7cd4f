//! Typed, validated view of the lifecycle configuration.
//!
//! A [`PolicySnapshot`] is built once per run from the raw
//! [`LifecycleConfig`](crate::config::LifecycleConfig) and never changes while
//! the run is in progress. Invalid rules are disabled at build time instead of
//! surfacing as errors later.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use super::state::{ModerationState, RuleRef};

pub const DELETE_UNPUBLISHED_ENTITY: &str = "delete_unpublished_entity";
pub const DELETE_PUBLISHED_ENTITY: &str = "delete_published_entity";
pub const SCHEDULED_UNPUBLISH_DATE: &str = "scheduled_unpublish_date";
pub const SCHEDULED_TRASH_DATE: &str = "scheduled_trash_date";

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// A deletion rule from the `actions` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionRule {
    pub name: String,
    pub enabled: bool,
    /// Read by the default deadline calculator only.
    pub offset: Option<String>,
}

/// A moderation state transition rule from the `fields` section.
///
/// The rule name doubles as the name of the record's manual scheduling field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRule {
    pub name: String,
    pub enabled: bool,
    pub offset: String,
    pub target_state: Option<ModerationState>,
}

impl TransitionRule {
    pub fn new(
        name: impl Into<String>,
        offset: impl Into<String>,
        target_state: impl Into<ModerationState>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            offset: offset.into(),
            target_state: Some(target_state.into()),
        }
    }

    /// Offset and target state are both present.
    pub fn is_valid(&self) -> bool {
        !self.offset.trim().is_empty() && self.target_state.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.is_valid()
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

type Bundles<T> = IndexMap<String, IndexMap<String, T>>;

/// Immutable policy for a single run.
#[derive(Debug, Clone, Serialize)]
pub struct PolicySnapshot {
    pub disabled: bool,
    pub batch_size: usize,
    actions: Bundles<Vec<DeletionRule>>,
    fields: Bundles<Vec<TransitionRule>>,
}

impl Default for PolicySnapshot {
    fn default() -> Self {
        Self {
            disabled: false,
            batch_size: DEFAULT_BATCH_SIZE,
            actions: IndexMap::new(),
            fields: IndexMap::new(),
        }
    }
}

impl PolicySnapshot {
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Adds a deletion rule, replacing one with the same name.
    pub fn with_deletion(mut self, entity_type: &str, bundle: &str, rule: DeletionRule) -> Self {
        let rules = self
            .actions
            .entry(entity_type.to_string())
            .or_default()
            .entry(bundle.to_string())
            .or_default();
        match rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        self
    }

    /// Appends a transition rule, replacing one with the same name in place.
    ///
    /// Rules missing an offset or a target state are stored disabled.
    pub fn with_transition(
        mut self,
        entity_type: &str,
        bundle: &str,
        mut rule: TransitionRule,
    ) -> Self {
        if rule.enabled && !rule.is_valid() {
            warn!(
                entity_type,
                bundle,
                rule = %rule.name,
                "transition rule lacks offset or target_state, disabling"
            );
            rule.enabled = false;
        }
        let rules = self
            .fields
            .entry(entity_type.to_string())
            .or_default()
            .entry(bundle.to_string())
            .or_default();
        match rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        self
    }

    /// Entity types with at least one transition bundle, in configuration order.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Transition rules for a bundle, in configuration order.
    pub fn transition_rules(&self, entity_type: &str, bundle: &str) -> &[TransitionRule] {
        self.fields
            .get(entity_type)
            .and_then(|bundles| bundles.get(bundle))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn transition_rule(
        &self,
        entity_type: &str,
        bundle: &str,
        name: &str,
    ) -> Option<&TransitionRule> {
        self.transition_rules(entity_type, bundle)
            .iter()
            .find(|rule| rule.name == name)
    }

    pub fn deletion_rule(&self, entity_type: &str, bundle: &str, name: &str) -> Option<&DeletionRule> {
        self.actions
            .get(entity_type)
            .and_then(|bundles| bundles.get(bundle))
            .and_then(|rules| rules.iter().find(|rule| rule.name == name))
    }

    /// Whether the referenced rule exists and would fire.
    pub fn is_enabled(&self, entity_type: &str, bundle: &str, rule: RuleRef) -> bool {
        match rule {
            RuleRef::Action(name) => self
                .deletion_rule(entity_type, bundle, name)
                .is_some_and(|r| r.enabled),
            RuleRef::Field(name) => self
                .transition_rule(entity_type, bundle, name)
                .is_some_and(TransitionRule::is_active),
        }
    }

    /// The offset string attached to the referenced rule, if any.
    pub fn offset(&self, entity_type: &str, bundle: &str, rule: RuleRef) -> Option<&str> {
        match rule {
            RuleRef::Action(name) => self
                .deletion_rule(entity_type, bundle, name)
                .and_then(|r| r.offset.as_deref()),
            RuleRef::Field(name) => self
                .transition_rule(entity_type, bundle, name)
                .map(|r| r.offset.as_str()),
        }
    }

    /// Number of rules across both sections.
    pub fn rule_count(&self) -> usize {
        let actions: usize = self.actions.values().flat_map(|b| b.values()).map(Vec::len).sum();
        let fields: usize = self.fields.values().flat_map(|b| b.values()).map(Vec::len).sum();
        actions + fields
    }

    /// Flat listing of every rule for display: (type, bundle, section, rule).
    pub fn describe(&self) -> Vec<RuleSummary> {
        let mut out = Vec::new();
        for (entity_type, bundles) in &self.actions {
            for (bundle, rules) in bundles {
                for rule in rules {
                    out.push(RuleSummary {
                        entity_type: entity_type.clone(),
                        bundle: bundle.clone(),
                        section: "actions",
                        name: rule.name.clone(),
                        enabled: rule.enabled,
                        offset: rule.offset.clone(),
                        target_state: None,
                    });
                }
            }
        }
        for (entity_type, bundles) in &self.fields {
            for (bundle, rules) in bundles {
                for rule in rules {
                    out.push(RuleSummary {
                        entity_type: entity_type.clone(),
                        bundle: bundle.clone(),
                        section: "fields",
                        name: rule.name.clone(),
                        enabled: rule.is_active(),
                        offset: Some(rule.offset.clone()).filter(|o| !o.is_empty()),
                        target_state: rule.target_state.clone(),
                    });
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub entity_type: String,
    pub bundle: String,
    pub section: &'static str,
    pub name: String,
    pub enabled: bool,
    pub offset: Option<String>,
    pub target_state: Option<ModerationState>,
}

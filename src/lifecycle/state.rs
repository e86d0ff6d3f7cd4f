use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::policy::{
    DELETE_PUBLISHED_ENTITY, DELETE_UNPUBLISHED_ENTITY, SCHEDULED_TRASH_DATE,
    SCHEDULED_UNPUBLISH_DATE,
};
use crate::deadline::DeadlineKind;

/// Moderation states a record moves through.
///
/// Each record flows: UNPUBLISHED → PUBLISHED → UNPUBLISHED_CONTENT → TRASH → (deleted).
/// Drafts may jump straight to any later stage. States defined by other
/// workflows are kept verbatim in [`ModerationState::Other`] and never
/// auto-managed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModerationState {
    Unpublished,
    Published,
    UnpublishedContent,
    Trash,
    Other(String),
}

impl ModerationState {
    pub fn as_str(&self) -> &str {
        match self {
            ModerationState::Unpublished => "unpublished",
            ModerationState::Published => "published",
            ModerationState::UnpublishedContent => "unpublished_content",
            ModerationState::Trash => "trash",
            ModerationState::Other(name) => name,
        }
    }

    /// Whether moving from `self` to `target` follows the lifecycle.
    pub fn can_transition_to(&self, target: &ModerationState) -> bool {
        match self {
            ModerationState::Unpublished => true,
            ModerationState::Published => matches!(
                target,
                ModerationState::UnpublishedContent | ModerationState::Trash
            ),
            ModerationState::UnpublishedContent => *target == ModerationState::Trash,
            ModerationState::Trash | ModerationState::Other(_) => false,
        }
    }

    /// The time-based step that applies to a record sitting in this state.
    pub fn lifecycle_step(&self) -> Option<LifecycleStep> {
        LIFECYCLE_STEPS
            .iter()
            .find(|(state, _)| state == self)
            .map(|(_, step)| step.clone())
    }
}

impl fmt::Display for ModerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ModerationState {
    fn from(s: &str) -> Self {
        match s {
            "unpublished" => ModerationState::Unpublished,
            "published" => ModerationState::Published,
            "unpublished_content" => ModerationState::UnpublishedContent,
            "trash" => ModerationState::Trash,
            other => ModerationState::Other(other.to_string()),
        }
    }
}

impl FromStr for ModerationState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ModerationState::from(s))
    }
}

impl Serialize for ModerationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModerationState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ModerationState::from(raw.as_str()))
    }
}

/// Which configuration section a rule lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleRef {
    /// `actions[type][bundle][name]`
    Action(&'static str),
    /// `fields[type][bundle][name]`
    Field(&'static str),
}

impl RuleRef {
    pub fn name(&self) -> &'static str {
        match self {
            RuleRef::Action(name) | RuleRef::Field(name) => name,
        }
    }
}

/// What happens once a step's deadline has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEffect {
    DeleteUnpublished,
    DeleteExpired,
    TransitionTo(ModerationState),
}

/// One row of the per-state lifecycle table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleStep {
    pub rule: RuleRef,
    pub deadline: DeadlineKind,
    pub effect: StepEffect,
}

const LIFECYCLE_STEPS: [(ModerationState, LifecycleStep); 4] = [
    (
        ModerationState::Unpublished,
        LifecycleStep {
            rule: RuleRef::Action(DELETE_UNPUBLISHED_ENTITY),
            deadline: DeadlineKind::UnpublishedDelete,
            effect: StepEffect::DeleteUnpublished,
        },
    ),
    (
        ModerationState::Published,
        LifecycleStep {
            rule: RuleRef::Field(SCHEDULED_UNPUBLISH_DATE),
            deadline: DeadlineKind::Unpublish,
            effect: StepEffect::TransitionTo(ModerationState::UnpublishedContent),
        },
    ),
    (
        ModerationState::UnpublishedContent,
        LifecycleStep {
            rule: RuleRef::Field(SCHEDULED_TRASH_DATE),
            deadline: DeadlineKind::Archive,
            effect: StepEffect::TransitionTo(ModerationState::Trash),
        },
    ),
    (
        ModerationState::Trash,
        LifecycleStep {
            rule: RuleRef::Action(DELETE_PUBLISHED_ENTITY),
            deadline: DeadlineKind::TrashDelete,
            effect: StepEffect::DeleteExpired,
        },
    ),
];

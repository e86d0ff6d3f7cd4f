//! Viewer-facing notices about upcoming lifecycle actions.
//!
//! [`Notifier::notification`] walks the same checks as
//! [`DecisionEngine::decide`], with one extra case: a record that was never
//! saved gets a generic "new content" notice.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::deadline::DeadlineKind;
use crate::error::Result;
use crate::lifecycle::{
    DecisionEngine, Record, RuleRef, SCHEDULED_UNPUBLISH_DATE, StepDeadline,
};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    NewEntity { unpublish_offset: Option<String> },
    DraftDelete { at: DateTime<Utc> },
    Unpublish { at: DateTime<Utc> },
    Archive { at: DateTime<Utc> },
    OldDelete { at: DateTime<Utc> },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::NewEntity {
                unpublish_offset: Some(offset),
            } => write!(
                f,
                "Once published, this content will be unpublished automatically after {offset}."
            ),
            Notification::NewEntity {
                unpublish_offset: None,
            } => write!(f, "This content is subject to automatic lifecycle management."),
            Notification::DraftDelete { at } => write!(
                f,
                "This draft will be deleted on {} unless it is published.",
                at.format(DATE_FORMAT)
            ),
            Notification::Unpublish { at } => {
                write!(f, "This content will be unpublished on {}.", at.format(DATE_FORMAT))
            }
            Notification::Archive { at } => write!(
                f,
                "This content will be moved to trash on {}.",
                at.format(DATE_FORMAT)
            ),
            Notification::OldDelete { at } => write!(
                f,
                "This content will be permanently deleted on {}.",
                at.format(DATE_FORMAT)
            ),
        }
    }
}

/// Builds notices from the engine's view of a record.
pub struct Notifier;

impl Notifier {
    /// The notice to show for `record`, or `None` when nothing is planned.
    pub fn notification(
        engine: &DecisionEngine<'_>,
        record: &Record,
    ) -> Result<Option<Notification>> {
        let policy = engine.policy();
        if policy.disabled || record.ignore_lifecycle {
            return Ok(None);
        }

        if record.is_new {
            let rule = RuleRef::Field(SCHEDULED_UNPUBLISH_DATE);
            let unpublish_offset = policy
                .is_enabled(&record.entity_type, &record.bundle, rule)
                .then(|| policy.offset(&record.entity_type, &record.bundle, rule))
                .flatten()
                .map(str::to_string);
            return Ok(Some(Notification::NewEntity { unpublish_offset }));
        }

        if engine.is_scheduled(record) {
            return Ok(None);
        }

        let notice = match engine.step_deadline(record)? {
            StepDeadline::Skipped(_) => None,
            StepDeadline::At { step, deadline: at } => match step.deadline {
                DeadlineKind::UnpublishedDelete => Some(Notification::DraftDelete { at }),
                DeadlineKind::Unpublish => Some(Notification::Unpublish { at }),
                DeadlineKind::Archive => Some(Notification::Archive { at }),
                DeadlineKind::TrashDelete => Some(Notification::OldDelete { at }),
                DeadlineKind::OffsetFromLastPublish => None,
            },
        };
        Ok(notice)
    }
}

//! Shared fixtures for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::deadline::{DeadlineCalculator, DeadlineKind};
use crate::error::{LifecycleError, Result};
use crate::lifecycle::{
    DELETE_PUBLISHED_ENTITY, DELETE_UNPUBLISHED_ENTITY, DeletionRule, PolicySnapshot, Record,
    SCHEDULED_TRASH_DATE, SCHEDULED_UNPUBLISH_DATE, TransitionRule,
};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

pub fn deletion(name: &str, offset: &str) -> DeletionRule {
    DeletionRule {
        name: name.to_string(),
        enabled: true,
        offset: Some(offset.to_string()),
    }
}

/// `node/article` with all four rules enabled:
/// unpublish after 30 days, trash after 60 days, delete drafts after 10 days
/// of inactivity, delete published content 90 days after last publish.
pub fn article_policy() -> PolicySnapshot {
    PolicySnapshot::default()
        .with_deletion("node", "article", deletion(DELETE_UNPUBLISHED_ENTITY, "10 days"))
        .with_deletion("node", "article", deletion(DELETE_PUBLISHED_ENTITY, "90 days"))
        .with_transition(
            "node",
            "article",
            TransitionRule::new(SCHEDULED_UNPUBLISH_DATE, "30 days", "unpublished_content"),
        )
        .with_transition(
            "node",
            "article",
            TransitionRule::new(SCHEDULED_TRASH_DATE, "60 days", "trash"),
        )
}

pub fn article(id: &str) -> Record {
    Record::new("node", "article", id, days_ago(400)).with_label(format!("Article {id}"))
}

/// Calculator returning canned deadlines per kind and recording every call.
#[derive(Default)]
pub struct StubDeadlines {
    pub deadlines: HashMap<DeadlineKind, DateTime<Utc>>,
    pub fail_for: Option<String>,
    pub calls: RefCell<Vec<(String, DeadlineKind)>>,
}

impl StubDeadlines {
    pub fn with(mut self, kind: DeadlineKind, deadline: DateTime<Utc>) -> Self {
        self.deadlines.insert(kind, deadline);
        self
    }
}

impl DeadlineCalculator for StubDeadlines {
    fn deadline_for(
        &self,
        record: &Record,
        kind: DeadlineKind,
        _offset: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>> {
        self.calls.borrow_mut().push((record.id.clone(), kind));
        if self.fail_for.as_deref() == Some(record.id.as_str()) {
            return Err(LifecycleError::Deadline {
                id: record.id.clone(),
                message: "history unavailable".into(),
            });
        }
        Ok(self.deadlines.get(&kind).copied())
    }
}

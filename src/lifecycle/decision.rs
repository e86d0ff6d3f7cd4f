use chrono::{DateTime, Utc};
use serde::Serialize;

use super::event::RemovalReason;
use super::policy::{
    DELETE_PUBLISHED_ENTITY, DELETE_UNPUBLISHED_ENTITY, PolicySnapshot, TransitionRule,
};
use super::record::{Record, RecordRef};
use super::state::{LifecycleStep, ModerationState, RuleRef, StepEffect};
use crate::deadline::{DeadlineCalculator, DeadlineKind};
use crate::error::Result;

/// Why a record was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Lifecycle management is globally disabled.
    Disabled,
    /// The record opted out via its ignore flag.
    Ignored,
    /// A user filled in a manual scheduling field.
    Scheduled,
    /// The record has no moderation state.
    Unmoderated,
    /// The rule for the record's state is missing, disabled or invalid.
    RuleDisabled,
    /// The deadline calculator has no deadline for this record.
    NotApplicable,
    /// The moderation state has no lifecycle step.
    UnknownState,
}

/// What the engine wants done with a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Skip(SkipReason),
    DeleteUnpublished,
    DeleteExpired,
    TransitionTo(ModerationState),
    /// A step applies but its deadline lies in the future.
    NoOp { deadline: DateTime<Utc> },
}

impl Outcome {
    pub fn removal_reason(&self) -> Option<RemovalReason> {
        match self {
            Outcome::DeleteUnpublished => Some(RemovalReason::NeverPublished),
            Outcome::DeleteExpired => Some(RemovalReason::TooOld),
            _ => None,
        }
    }
}

/// An [`Outcome`] tied to the record it was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub record: RecordRef,
    pub outcome: Outcome,
}

/// The deadline of the step implied by a record's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDeadline {
    Skipped(SkipReason),
    At {
        step: LifecycleStep,
        deadline: DateTime<Utc>,
    },
}

/// Per-record lifecycle decisions against a fixed policy and instant.
pub struct DecisionEngine<'a> {
    policy: &'a PolicySnapshot,
    deadlines: &'a dyn DeadlineCalculator,
    now: DateTime<Utc>,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(
        policy: &'a PolicySnapshot,
        deadlines: &'a dyn DeadlineCalculator,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            policy,
            deadlines,
            now,
        }
    }

    pub fn policy(&self) -> &PolicySnapshot {
        self.policy
    }

    /// Whether any scheduling field configured for the record's bundle was
    /// filled in by a user.
    pub fn is_scheduled(&self, record: &Record) -> bool {
        self.policy
            .transition_rules(&record.entity_type, &record.bundle)
            .iter()
            .any(|rule| record.has_manual_schedule(&rule.name))
    }

    /// Global switch, ignore flag and manual scheduling, in that order.
    pub fn guard(&self, record: &Record) -> Option<SkipReason> {
        if self.policy.disabled {
            Some(SkipReason::Disabled)
        } else if record.ignore_lifecycle {
            Some(SkipReason::Ignored)
        } else if self.is_scheduled(record) {
            Some(SkipReason::Scheduled)
        } else {
            None
        }
    }

    /// Looks up the step for the record's state and asks for its deadline.
    ///
    /// Does not apply [`guard`](Self::guard).
    pub fn step_deadline(&self, record: &Record) -> Result<StepDeadline> {
        let Some(state) = &record.moderation_state else {
            return Ok(StepDeadline::Skipped(SkipReason::Unmoderated));
        };
        let Some(step) = state.lifecycle_step() else {
            return Ok(StepDeadline::Skipped(SkipReason::UnknownState));
        };
        if !self.policy.is_enabled(&record.entity_type, &record.bundle, step.rule) {
            return Ok(StepDeadline::Skipped(SkipReason::RuleDisabled));
        }

        let offset = self.policy.offset(&record.entity_type, &record.bundle, step.rule);
        match self.deadlines.deadline_for(record, step.deadline, offset)? {
            Some(deadline) => Ok(StepDeadline::At { step, deadline }),
            None => Ok(StepDeadline::Skipped(SkipReason::NotApplicable)),
        }
    }

    /// Decides the outcome for one record. First applicable outcome wins.
    pub fn decide(&self, record: &Record) -> Result<Decision> {
        let outcome = match self.guard(record) {
            Some(reason) => Outcome::Skip(reason),
            None => match self.step_deadline(record)? {
                StepDeadline::Skipped(reason) => Outcome::Skip(reason),
                StepDeadline::At { deadline, .. } if self.now < deadline => {
                    Outcome::NoOp { deadline }
                }
                StepDeadline::At { step, .. } => match step.effect {
                    StepEffect::DeleteUnpublished => Outcome::DeleteUnpublished,
                    StepEffect::DeleteExpired => Outcome::DeleteExpired,
                    StepEffect::TransitionTo(target) => Outcome::TransitionTo(target),
                },
            },
        };

        Ok(Decision {
            record: record.summary(),
            outcome,
        })
    }

    /// A never-published draft whose deletion deadline has passed.
    ///
    /// Independent of the record's current moderation state.
    pub fn should_delete_unpublished_entity(&self, record: &Record) -> Result<bool> {
        self.deletion_due(
            record,
            RuleRef::Action(DELETE_UNPUBLISHED_ENTITY),
            DeadlineKind::UnpublishedDelete,
        )
    }

    /// Previously published content whose deletion deadline has passed.
    ///
    /// Independent of the record's current moderation state.
    pub fn should_delete_old_entity(&self, record: &Record) -> Result<bool> {
        self.deletion_due(
            record,
            RuleRef::Action(DELETE_PUBLISHED_ENTITY),
            DeadlineKind::TrashDelete,
        )
    }

    fn deletion_due(&self, record: &Record, rule: RuleRef, kind: DeadlineKind) -> Result<bool> {
        if !self.policy.is_enabled(&record.entity_type, &record.bundle, rule) {
            return Ok(false);
        }
        let offset = self.policy.offset(&record.entity_type, &record.bundle, rule);
        Ok(self
            .deadlines
            .deadline_for(record, kind, offset)?
            .is_some_and(|deadline| deadline <= self.now))
    }

    /// Whether `rule` should move the record to its target state now.
    pub fn should_update_moderation_state(
        &self,
        record: &Record,
        rule: &TransitionRule,
    ) -> Result<bool> {
        let Some(current) = &record.moderation_state else {
            return Ok(false);
        };

        if !rule.is_valid() {
            return Ok(false);
        }
        let Some(target) = &rule.target_state else {
            return Ok(false);
        };

        // Scheduling set by a user.
        if record.has_manual_schedule(&rule.name) {
            return Ok(false);
        }

        if current == target || !current.can_transition_to(target) {
            return Ok(false);
        }

        if !rule.enabled {
            return Ok(false);
        }

        match self.deadlines.deadline_for(
            record,
            DeadlineKind::OffsetFromLastPublish,
            Some(&rule.offset),
        )? {
            Some(deadline) => Ok(self.now >= deadline),
            // Never published.
            None => Ok(false),
        }
    }
}

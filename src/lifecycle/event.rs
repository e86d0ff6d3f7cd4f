//! Lifecycle events and their delivery.
//!
//! The batch runner publishes exactly one event per processed record through
//! an injected [`EventChannel`]. Delivery is synchronous: the runner does not
//! move on to the next record until `publish` has returned.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::record::RecordRef;
use super::state::ModerationState;
use crate::error::Result;

/// Why a record was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalReason {
    NeverPublished,
    TooOld,
    Unknown,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::NeverPublished => write!(f, "NEVER_PUBLISHED"),
            RemovalReason::TooOld => write!(f, "TOO_OLD"),
            RemovalReason::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Published right before the record is deleted.
    Remove {
        record: RecordRef,
        reason: RemovalReason,
    },
    /// Published right before the new moderation state is saved.
    Update {
        record: RecordRef,
        target_state: ModerationState,
    },
    /// No rule fired for the record.
    Ignore { record: RecordRef },
}

impl LifecycleEvent {
    pub fn record(&self) -> &RecordRef {
        match self {
            LifecycleEvent::Remove { record, .. }
            | LifecycleEvent::Update { record, .. }
            | LifecycleEvent::Ignore { record } => record,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Remove { .. } => "lifecycle.remove",
            LifecycleEvent::Update { .. } => "lifecycle.update",
            LifecycleEvent::Ignore { .. } => "lifecycle.ignore",
        }
    }
}

/// Ordered, synchronous event delivery.
pub trait EventChannel {
    fn publish(&mut self, event: LifecycleEvent) -> Result<()>;
}

/// Collects every published event in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<LifecycleEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventChannel for EventLog {
    fn publish(&mut self, event: LifecycleEvent) -> Result<()> {
        self.events.push(event);
        Ok(())
    }
}

/// A consumer attached to an [`EventBus`].
pub trait EventSubscriber {
    fn handle(&mut self, event: &LifecycleEvent) -> Result<()>;
}

/// Fans each event out to its subscribers in registration order.
///
/// A failing subscriber stops delivery and fails the publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Box<dyn EventSubscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(mut self, subscriber: impl EventSubscriber + 'static) -> Self {
        self.subscribers.push(Box::new(subscriber));
        self
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl EventChannel for EventBus {
    fn publish(&mut self, event: LifecycleEvent) -> Result<()> {
        for subscriber in &mut self.subscribers {
            subscriber.handle(&event)?;
        }
        Ok(())
    }
}

/// Writes an audit line per event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSubscriber;

impl EventSubscriber for LogSubscriber {
    fn handle(&mut self, event: &LifecycleEvent) -> Result<()> {
        let record = event.record();
        match event {
            LifecycleEvent::Remove { reason, .. } => {
                info!(event = event.name(), record = %record, %reason, "lifecycle event");
            }
            LifecycleEvent::Update { target_state, .. } => {
                info!(event = event.name(), record = %record, %target_state, "lifecycle event");
            }
            LifecycleEvent::Ignore { .. } => {
                debug!(event = event.name(), record = %record, "lifecycle event");
            }
        }
        Ok(())
    }
}

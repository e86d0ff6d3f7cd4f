//! Content lifecycle scheduler.
//!
//! Decides, per content record, whether it should be deleted, moved to another
//! moderation state, or left alone, and applies those decisions across the
//! whole population in bounded batches.
//!
//! - [`lifecycle`] holds the domain model and the [`DecisionEngine`].
//! - [`runner`] walks the population through a [`RecordStore`].
//! - [`config`] loads `lifecycle.toml` into a [`PolicySnapshot`].

pub mod cli;
pub mod clock;
pub mod config;
pub mod deadline;
pub mod error;
pub mod lifecycle;
pub mod notifier;
pub mod runner;
pub mod store;
pub mod ui;

#[cfg(test)]
mod testing;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LifecycleConfig;
pub use deadline::{DeadlineCalculator, DeadlineKind, OffsetDeadlineCalculator};
pub use error::{LifecycleError, Result};
pub use lifecycle::{DecisionEngine, LifecycleEvent, ModerationState, PolicySnapshot, Record};
pub use notifier::{Notification, Notifier};
pub use runner::{BatchRunner, RunReport};
pub use store::{MemoryStore, RecordStore};

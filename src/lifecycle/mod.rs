mod decision;
mod event;
mod policy;
mod record;
mod state;

pub use decision::{Decision, DecisionEngine, Outcome, SkipReason, StepDeadline};
pub use event::{
    EventBus, EventChannel, EventLog, EventSubscriber, LifecycleEvent, LogSubscriber,
    RemovalReason,
};
pub use policy::{
    DEFAULT_BATCH_SIZE, DELETE_PUBLISHED_ENTITY, DELETE_UNPUBLISHED_ENTITY, DeletionRule,
    PolicySnapshot, RuleSummary, SCHEDULED_TRASH_DATE, SCHEDULED_UNPUBLISH_DATE, TransitionRule,
};
pub use record::{Record, RecordRef};
pub use state::{LifecycleStep, ModerationState, RuleRef, StepEffect};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::deadline::DeadlineCalculator;
use crate::error::Result;
use crate::lifecycle::{
    DecisionEngine, EventChannel, LifecycleEvent, PolicySnapshot, Record, RemovalReason,
};
use crate::store::RecordStore;

/// Counters for one [`BatchRunner::run`] invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// The instant every deadline was compared against.
    pub as_of: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub disabled: bool,
    pub entity_types: usize,
    pub batches: usize,
    pub loaded: usize,
    pub deleted: usize,
    pub updated: usize,
    pub ignored: usize,
    pub skipped: usize,
}

impl RunReport {
    fn start(as_of: DateTime<Utc>, disabled: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            as_of,
            started_at: now,
            finished_at: now,
            disabled,
            entity_types: 0,
            batches: 0,
            loaded: 0,
            deleted: 0,
            updated: 0,
            ignored: 0,
            skipped: 0,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Deletions plus state updates.
    pub fn mutations(&self) -> usize {
        self.deleted + self.updated
    }
}

/// Walks every configured entity type in bounded batches, applying the
/// lifecycle rules to each record and publishing one event per outcome.
///
/// The policy snapshot is fixed at construction; build a new runner to pick
/// up configuration changes.
pub struct BatchRunner<S, C, E> {
    policy: PolicySnapshot,
    store: S,
    deadlines: C,
    events: E,
}

impl<S, C, E> BatchRunner<S, C, E>
where
    S: RecordStore,
    C: DeadlineCalculator,
    E: EventChannel,
{
    pub fn new(policy: PolicySnapshot, store: S, deadlines: C, events: E) -> Self {
        Self {
            policy,
            store,
            deadlines,
            events,
        }
    }

    pub fn policy(&self) -> &PolicySnapshot {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn into_parts(self) -> (S, E) {
        (self.store, self.events)
    }

    /// Runs every rule once against the whole population.
    ///
    /// Store, calculator and event errors abort the batch in progress and are
    /// returned as is. Batches finished before the failure stay committed.
    pub fn run(&mut self, clock: &impl Clock) -> Result<RunReport> {
        let now = clock.now();
        let mut report = RunReport::start(now, self.policy.disabled);

        if self.policy.disabled {
            info!("lifecycle management is disabled, nothing to do");
            return Ok(report.finish());
        }

        let Self {
            policy,
            store,
            deadlines,
            events,
        } = self;
        let engine = DecisionEngine::new(&*policy, &*deadlines, now);
        let batch_size = policy.batch_size.max(1);

        for entity_type in policy.entity_types() {
            let ids = store.query_ids(entity_type)?;
            report.entity_types += 1;
            info!(
                run_id = %report.run_id,
                entity_type,
                records = ids.len(),
                "processing entity type"
            );

            for batch in ids.chunks(batch_size) {
                let records = store.load_batch(entity_type, batch)?;
                report.loaded += records.len();
                for record in records {
                    process_record(&engine, store, events, record, &mut report)?;
                }
                store.release_cache(entity_type, batch);
                report.batches += 1;
            }
        }

        let report = report.finish();
        info!(
            run_id = %report.run_id,
            deleted = report.deleted,
            updated = report.updated,
            ignored = report.ignored,
            skipped = report.skipped,
            duration_ms = report.duration_ms(),
            "lifecycle run finished"
        );
        Ok(report)
    }
}

fn process_record(
    engine: &DecisionEngine<'_>,
    store: &mut impl RecordStore,
    events: &mut impl EventChannel,
    mut record: Record,
    report: &mut RunReport,
) -> Result<()> {
    if record.ignore_lifecycle {
        debug!(id = %record.id, "ignored by record flag");
        report.skipped += 1;
        return Ok(());
    }

    if engine.is_scheduled(&record) {
        debug!(id = %record.id, "manually scheduled");
        report.skipped += 1;
        return Ok(());
    }

    let never_published = engine.should_delete_unpublished_entity(&record)?;
    let too_old = !never_published && engine.should_delete_old_entity(&record)?;

    if never_published || too_old {
        let reason = removal_reason(never_published, too_old);
        events.publish(LifecycleEvent::Remove {
            record: record.summary(),
            reason,
        })?;

        let details = json!({
            "id": record.id,
            "title": record.label,
            "url": record.url,
        });
        store.delete(&record)?;
        info!(id = %record.id, %reason, info = %details, "entity has been deleted");
        report.deleted += 1;
        return Ok(());
    }

    // At most one transition per run: the first rule that fires wins.
    for rule in engine
        .policy()
        .transition_rules(&record.entity_type, &record.bundle)
    {
        if !engine.should_update_moderation_state(&record, rule)? {
            continue;
        }
        let Some(target) = rule.target_state.clone() else {
            continue;
        };
        let legal = record
            .moderation_state
            .as_ref()
            .is_some_and(|current| current.can_transition_to(&target));
        if !legal {
            warn!(id = %record.id, rule = %rule.name, %target, "refusing illegal transition");
            continue;
        }

        events.publish(LifecycleEvent::Update {
            record: record.summary(),
            target_state: target.clone(),
        })?;

        let previous = record.moderation_state.replace(target.clone());
        store.save(&record)?;
        info!(
            id = %record.id,
            rule = %rule.name,
            from = previous.as_ref().map(|s| s.as_str()).unwrap_or_default(),
            to = %target,
            "entity state has been updated"
        );
        report.updated += 1;
        return Ok(());
    }

    events.publish(LifecycleEvent::Ignore {
        record: record.summary(),
    })?;
    report.ignored += 1;
    Ok(())
}

/// The old-content check only runs when the draft check did not fire, so at
/// most one flag is set. `Unknown` covers neither.
fn removal_reason(never_published: bool, too_old: bool) -> RemovalReason {
    if too_old {
        RemovalReason::TooOld
    } else if never_published {
        RemovalReason::NeverPublished
    } else {
        RemovalReason::Unknown
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::FixedClock;
    use crate::deadline::{DeadlineKind, OffsetDeadlineCalculator};
    use crate::error::LifecycleError;
    use crate::lifecycle::{
        EventLog, ModerationState, SCHEDULED_TRASH_DATE, SCHEDULED_UNPUBLISH_DATE, TransitionRule,
    };
    use crate::store::MemoryStore;
    use crate::testing::{StubDeadlines, article, article_policy, days_ago, now};

    type Runner<C> = BatchRunner<MemoryStore, C, EventLog>;

    fn runner(policy: PolicySnapshot, records: Vec<Record>) -> Runner<OffsetDeadlineCalculator> {
        BatchRunner::new(
            policy,
            MemoryStore::from_records(records),
            OffsetDeadlineCalculator,
            EventLog::new(),
        )
    }

    fn state_of<C: DeadlineCalculator>(runner: &Runner<C>, id: &str) -> Option<ModerationState> {
        runner
            .store()
            .get("node", id)
            .and_then(|r| r.moderation_state.clone())
    }

    #[test]
    fn expired_draft_is_removed_as_never_published() {
        let calc = StubDeadlines::default()
            .with(DeadlineKind::UnpublishedDelete, now() - Duration::seconds(1));
        let mut runner = BatchRunner::new(
            article_policy(),
            MemoryStore::from_records([article("1").with_state("unpublished")]),
            calc,
            EventLog::new(),
        );

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(report.deleted, 1);
        assert!(runner.store().get("node", "1").is_none());
        assert_eq!(runner.events().len(), 1);
        assert!(matches!(
            &runner.events().events()[0],
            LifecycleEvent::Remove {
                reason: RemovalReason::NeverPublished,
                record,
            } if record.id == "1"
        ));
    }

    #[test]
    fn published_content_is_unpublished_after_offset() {
        let record = article("2").with_state("published").published_at(days_ago(31));
        let mut runner = runner(article_policy(), vec![record]);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(state_of(&runner, "2"), Some(ModerationState::UnpublishedContent));
        assert_eq!(
            runner.events().events(),
            &[LifecycleEvent::Update {
                record: article("2").summary(),
                target_state: ModerationState::UnpublishedContent,
            }]
        );
    }

    #[test]
    fn pending_content_is_only_ignored() {
        let record = article("3").with_state("published").published_at(days_ago(29));
        let mut runner = runner(article_policy(), vec![record.clone()]);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(report.mutations(), 0);
        assert_eq!(runner.store().get("node", "3"), Some(&record));
        assert!(matches!(
            runner.events().events(),
            [LifecycleEvent::Ignore { .. }]
        ));
    }

    #[test]
    fn ignored_records_produce_nothing() {
        let mut record = article("4").with_state("trash").published_at(days_ago(365));
        record.ignore_lifecycle = true;
        let mut runner = runner(article_policy(), vec![record]);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(report.skipped, 1);
        assert!(runner.events().is_empty());
        assert!(runner.store().get("node", "4").is_some());
    }

    #[test]
    fn disabled_run_touches_nothing() {
        let mut policy = article_policy();
        policy.disabled = true;
        let record = article("5").with_state("published").published_at(days_ago(365));
        let mut runner = runner(policy, vec![record]);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert!(report.disabled);
        assert_eq!(runner.store().query_count(), 0);
        assert!(runner.events().is_empty());
        assert_eq!(state_of(&runner, "5"), Some(ModerationState::Published));
    }

    #[test]
    fn manually_scheduled_records_are_skipped() {
        let mut record = article("6").with_state("published").published_at(days_ago(31));
        record
            .schedule
            .insert(SCHEDULED_UNPUBLISH_DATE.into(), Some(now() + Duration::days(7)));
        let mut runner = runner(article_policy(), vec![record]);

        runner.run(&FixedClock(now())).unwrap();

        assert!(runner.events().is_empty());
        assert_eq!(state_of(&runner, "6"), Some(ModerationState::Published));
    }

    #[test]
    fn manual_schedule_protects_records_due_for_deletion() {
        let mut record = article("15").with_state("trash").published_at(days_ago(365));
        record
            .schedule
            .insert(SCHEDULED_TRASH_DATE.into(), Some(now() + Duration::days(7)));
        let mut runner = runner(article_policy(), vec![record.clone()]);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!((report.deleted, report.skipped), (0, 1));
        assert!(runner.events().is_empty());
        assert_eq!(runner.store().get("node", "15"), Some(&record));
    }

    #[test]
    fn out_of_range_offset_does_not_stop_the_run() {
        let policy = PolicySnapshot::default().with_transition(
            "node",
            "article",
            TransitionRule::new(SCHEDULED_UNPUBLISH_DATE, "300000 years", "unpublished_content"),
        );
        let records = vec![
            article("16").with_state("published").published_at(days_ago(31)),
            article("17").with_state("published").published_at(days_ago(31)),
        ];
        let mut runner = runner(policy, records);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!((report.updated, report.ignored), (0, 2));
        assert_eq!(state_of(&runner, "16"), Some(ModerationState::Published));
        assert!(matches!(
            runner.events().events(),
            [LifecycleEvent::Ignore { .. }, LifecycleEvent::Ignore { .. }]
        ));
    }

    #[test]
    fn deletion_takes_precedence_over_transitions() {
        // Due for unpublish and also past the 90 day delete window.
        let record = article("7").with_state("published").published_at(days_ago(120));
        let mut runner = runner(article_policy(), vec![record]);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!((report.deleted, report.updated), (1, 0));
        assert_eq!(
            runner.events().events(),
            &[LifecycleEvent::Remove {
                record: article("7").summary(),
                reason: RemovalReason::TooOld,
            }]
        );
    }

    #[test]
    fn only_the_first_matching_rule_fires() {
        let policy = PolicySnapshot::default()
            .with_transition(
                "node",
                "article",
                TransitionRule::new(SCHEDULED_TRASH_DATE, "10 days", "trash"),
            )
            .with_transition(
                "node",
                "article",
                TransitionRule::new(SCHEDULED_UNPUBLISH_DATE, "5 days", "unpublished_content"),
            );
        let record = article("8").with_state("published").published_at(days_ago(30));
        let mut runner = runner(policy, vec![record]);

        runner.run(&FixedClock(now())).unwrap();

        assert_eq!(state_of(&runner, "8"), Some(ModerationState::Trash));
        assert_eq!(runner.events().len(), 1);
    }

    #[test]
    fn batches_partition_the_population() {
        let records: Vec<_> = (1..=5)
            .map(|i| {
                article(&i.to_string())
                    .with_state("published")
                    .published_at(days_ago(31))
            })
            .collect();
        let mut runner = runner(article_policy().with_batch_size(2), records);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.loaded, 5);
        assert_eq!(report.updated, 5);
        assert_eq!(runner.store().cached_len(), 0);

        let ids: Vec<_> = runner
            .events()
            .events()
            .iter()
            .map(|e| e.record().id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn events_follow_processing_order_across_batches() {
        let records = vec![
            article("a").with_state("unpublished"),
            article("b").with_state("published").published_at(days_ago(31)),
            article("c").with_state("published").published_at(days_ago(29)),
            article("d").with_state("trash").published_at(days_ago(120)),
            article("e").with_state("unpublished_content").published_at(days_ago(61)),
        ];
        let mut runner = runner(article_policy().with_batch_size(2), records);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(report.batches, 3);
        let summary: Vec<_> = runner
            .events()
            .events()
            .iter()
            .map(|e| (e.name(), e.record().id.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("lifecycle.remove", "a"),
                ("lifecycle.update", "b"),
                ("lifecycle.ignore", "c"),
                ("lifecycle.remove", "d"),
                ("lifecycle.update", "e"),
            ]
        );
    }

    #[test]
    fn second_run_at_same_instant_changes_nothing() {
        let mut stale_draft = article("10").with_state("unpublished");
        stale_draft.changed = days_ago(20);
        let records = vec![
            article("9").with_state("published").published_at(days_ago(31)),
            stale_draft,
            article("11").with_state("unpublished_content").published_at(days_ago(61)),
        ];
        let mut runner = runner(article_policy(), records);
        let clock = FixedClock(now());

        let first = runner.run(&clock).unwrap();
        assert_eq!((first.deleted, first.updated), (1, 2));
        let after_first: Vec<Record> = runner.store().records().cloned().collect();

        let (store, _) = runner.into_parts();
        let mut again = BatchRunner::new(
            article_policy(),
            store,
            OffsetDeadlineCalculator,
            EventLog::new(),
        );
        let second = again.run(&clock).unwrap();

        assert_eq!(second.mutations(), 0);
        assert_eq!(second.ignored, 2);
        let after_second: Vec<Record> = again.store().records().cloned().collect();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn unconfigured_bundles_and_types_are_left_alone() {
        let mut page = article("12").with_state("published").published_at(days_ago(365));
        page.bundle = "page".into();
        let mut media = article("13").with_state("published").published_at(days_ago(365));
        media.entity_type = "media".into();
        let mut runner = runner(article_policy(), vec![page, media]);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(report.entity_types, 1);
        assert_eq!(report.ignored, 1);
        assert_eq!(runner.events().events()[0].record().id, "12");
        assert!(runner.store().get("media", "13").is_some());
    }

    #[test]
    fn illegal_target_state_never_fires() {
        let policy = PolicySnapshot::default().with_transition(
            "node",
            "article",
            TransitionRule::new(SCHEDULED_UNPUBLISH_DATE, "1 day", "published"),
        );
        let record = article("14").with_state("unpublished_content").published_at(days_ago(30));
        let mut runner = runner(policy, vec![record]);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(report.updated, 0);
        assert_eq!(state_of(&runner, "14"), Some(ModerationState::UnpublishedContent));
    }

    #[test]
    fn removal_reason_classification() {
        assert_eq!(removal_reason(true, false), RemovalReason::NeverPublished);
        assert_eq!(removal_reason(false, true), RemovalReason::TooOld);
        assert_eq!(removal_reason(false, false), RemovalReason::Unknown);
    }

    #[test]
    fn bundled_demo_run() {
        let policy = crate::config::LifecycleConfig::parse(include_str!("../demos/lifecycle.toml"))
            .unwrap()
            .snapshot()
            .unwrap();
        let records: Vec<Record> =
            serde_json::from_str(include_str!("../demos/records.json")).unwrap();
        let mut runner = runner(policy, records);

        let report = runner.run(&FixedClock(now())).unwrap();

        assert_eq!(
            (report.deleted, report.updated, report.skipped, report.ignored),
            (1, 1, 2, 0)
        );
        assert!(runner.store().get("node", "1").is_none());
        assert_eq!(state_of(&runner, "2"), Some(ModerationState::UnpublishedContent));
        assert_eq!(state_of(&runner, "3"), Some(ModerationState::Published));
    }

    /// Fails on `delete` for one id, otherwise behaves like `MemoryStore`.
    struct FlakyStore {
        inner: MemoryStore,
        fail_on: &'static str,
    }

    impl RecordStore for FlakyStore {
        fn query_ids(&mut self, entity_type: &str) -> Result<Vec<String>> {
            self.inner.query_ids(entity_type)
        }

        fn load_batch(&mut self, entity_type: &str, ids: &[String]) -> Result<Vec<Record>> {
            self.inner.load_batch(entity_type, ids)
        }

        fn save(&mut self, record: &Record) -> Result<()> {
            self.inner.save(record)
        }

        fn delete(&mut self, record: &Record) -> Result<()> {
            if record.id == self.fail_on {
                return Err(LifecycleError::Store("connection reset".into()));
            }
            self.inner.delete(record)
        }

        fn release_cache(&mut self, entity_type: &str, ids: &[String]) {
            self.inner.release_cache(entity_type, ids)
        }
    }

    #[test]
    fn store_failure_aborts_but_keeps_earlier_batches() {
        let records = vec![
            article("a").with_state("published").published_at(days_ago(31)),
            article("b").with_state("trash").published_at(days_ago(365)),
            article("c").with_state("published").published_at(days_ago(31)),
        ];
        let store = FlakyStore {
            inner: MemoryStore::from_records(records),
            fail_on: "b",
        };
        let mut runner = BatchRunner::new(
            article_policy().with_batch_size(1),
            store,
            OffsetDeadlineCalculator,
            EventLog::new(),
        );

        let err = runner.run(&FixedClock(now())).unwrap_err();
        assert!(matches!(err, LifecycleError::Store(_)));

        let inner = &runner.store().inner;
        assert_eq!(
            inner.get("node", "a").and_then(|r| r.moderation_state.clone()),
            Some(ModerationState::UnpublishedContent)
        );
        assert!(inner.get("node", "b").is_some());
        assert_eq!(
            inner.get("node", "c").and_then(|r| r.moderation_state.clone()),
            Some(ModerationState::Published)
        );
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lifecycle::cli::{Cli, Command};
use lifecycle::lifecycle::{EventBus, EventChannel, EventLog, LifecycleEvent, LogSubscriber};
use lifecycle::ui::{self, RunProgress};
use lifecycle::{
    BatchRunner, Clock, DecisionEngine, FixedClock, LifecycleConfig, MemoryStore, Notifier,
    OffsetDeadlineCalculator, PolicySnapshot, SystemClock,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = LifecycleConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let policy = config.snapshot().context("invalid lifecycle configuration")?;

    match cli.command {
        Command::Run { records } => match cli.now {
            Some(now) => run(policy, &records, &FixedClock(now)),
            None => run(policy, &records, &SystemClock),
        },
        Command::Status { records } => {
            let now = cli.now.unwrap_or_else(|| SystemClock.now());
            status(&policy, &records, &FixedClock(now))
        }
        Command::Rules => {
            ui::print_rules(&policy.describe(), policy.disabled, policy.batch_size);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Forwards every event to the tracing audit and keeps a copy for printing.
struct AuditChannel {
    bus: EventBus,
    log: EventLog,
}

impl EventChannel for AuditChannel {
    fn publish(&mut self, event: LifecycleEvent) -> lifecycle::Result<()> {
        self.bus.publish(event.clone())?;
        self.log.publish(event)
    }
}

fn run(policy: PolicySnapshot, records: &Path, clock: &impl Clock) -> Result<()> {
    let store = MemoryStore::load_json(records)
        .with_context(|| format!("failed to read records from {}", records.display()))?;
    let events = AuditChannel {
        bus: EventBus::new().subscribe(LogSubscriber),
        log: EventLog::new(),
    };

    let progress = RunProgress::start(&format!("Processing {} records", store.len()));
    let mut runner = BatchRunner::new(policy, store, OffsetDeadlineCalculator, events);
    let report = match runner.run(clock) {
        Ok(report) => report,
        Err(e) => {
            progress.fail(&e);
            // Batches committed before the failure are kept.
            let (store, _) = runner.into_parts();
            store
                .write_json(records)
                .with_context(|| format!("failed to write records to {}", records.display()))?;
            return Err(e).context("lifecycle run aborted");
        }
    };
    progress.complete(&report);

    let (store, events) = runner.into_parts();
    if report.mutations() > 0 {
        store
            .write_json(records)
            .with_context(|| format!("failed to write records to {}", records.display()))?;
    }
    progress.print_audit(events.log.events(), &report);
    Ok(())
}

fn status(policy: &PolicySnapshot, records: &Path, clock: &impl Clock) -> Result<()> {
    let store = MemoryStore::load_json(records)
        .with_context(|| format!("failed to read records from {}", records.display()))?;
    let deadlines = OffsetDeadlineCalculator;
    let engine = DecisionEngine::new(policy, &deadlines, clock.now());

    let mut rows = Vec::with_capacity(store.len());
    for record in store.records() {
        let decision = engine.decide(record)?;
        let notice = Notifier::notification(&engine, record)?;
        rows.push((decision, notice));
    }
    ui::print_status(&rows);
    Ok(())
}

//! Terminal output: a spinner while a run is in progress and colored
//! summaries afterwards.
//!
//! Uses `indicatif` for the spinner and `console` for styling.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::lifecycle::{Decision, LifecycleEvent, Outcome, RuleSummary, SkipReason};
use crate::notifier::Notification;
use crate::runner::RunReport;

/// Spinner plus styled printing for the `run` command.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl RunProgress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Stops the spinner and prints the run summary.
    pub fn complete(&self, report: &RunReport) {
        self.pb.finish_and_clear();
        if report.disabled {
            println!(
                "  {} Lifecycle management is disabled",
                self.yellow.apply_to("!")
            );
            return;
        }
        println!(
            "  {} {} deleted, {} updated, {} ignored, {} skipped ({} records in {} batches, {} ms)",
            self.green.apply_to("✓"),
            report.deleted,
            report.updated,
            report.ignored,
            report.skipped,
            report.loaded,
            report.batches,
            report.duration_ms(),
        );
    }

    pub fn fail(&self, error: &dyn std::fmt::Display) {
        self.pb.finish_and_clear();
        println!("  {} Run failed: {error}", self.red.apply_to("✗"));
    }

    /// One line per event, then the full report as JSON.
    pub fn print_audit(&self, events: &[LifecycleEvent], report: &RunReport) {
        println!();
        println!("{}", self.dim.apply_to("─── Events ───"));
        for event in events {
            let (style, detail) = match event {
                LifecycleEvent::Remove { reason, .. } => (&self.red, reason.to_string()),
                LifecycleEvent::Update { target_state, .. } => {
                    (&self.green, format!("-> {target_state}"))
                }
                LifecycleEvent::Ignore { .. } => (&self.dim, String::new()),
            };
            println!(
                "  {:<18} {} {detail}",
                style.apply_to(event.name()),
                event.record()
            );
        }
        println!();
        println!("{}", self.dim.apply_to("─── Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}

/// Prints what the engine would do with each record and the matching notice.
pub fn print_status(rows: &[(Decision, Option<Notification>)]) {
    let label = Style::new().bold();
    let dim = Style::new().dim();
    for (decision, notice) in rows {
        println!(
            "{} {}",
            label.apply_to(&decision.record),
            dim.apply_to(format!("[{}]", outcome_text(&decision.outcome)))
        );
        if let Some(notice) = notice {
            println!("    {notice}");
        }
    }
}

pub fn print_rules(rules: &[RuleSummary], disabled: bool, batch_size: usize) {
    let on = Style::new().green();
    let off = Style::new().red();
    println!(
        "disabled = {disabled}, batch_size = {batch_size}, {} rules",
        rules.len()
    );
    for rule in rules {
        let state = if rule.enabled {
            on.apply_to("on ")
        } else {
            off.apply_to("off")
        };
        let target = rule
            .target_state
            .as_ref()
            .map(|t| format!(" -> {t}"))
            .unwrap_or_default();
        println!(
            "  {state} {}/{} {}.{} {}{target}",
            rule.entity_type,
            rule.bundle,
            rule.section,
            rule.name,
            rule.offset.as_deref().unwrap_or("-"),
        );
    }
}

fn outcome_text(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Skip(reason) => format!("skip: {}", skip_text(*reason)),
        Outcome::DeleteUnpublished => "delete draft".to_string(),
        Outcome::DeleteExpired => "delete".to_string(),
        Outcome::TransitionTo(state) => format!("move to {state}"),
        Outcome::NoOp { deadline } => format!("due {}", deadline.format("%Y-%m-%d %H:%M")),
    }
}

fn skip_text(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Disabled => "disabled",
        SkipReason::Ignored => "ignored",
        SkipReason::Scheduled => "manually scheduled",
        SkipReason::Unmoderated => "no moderation state",
        SkipReason::RuleDisabled => "rule disabled",
        SkipReason::NotApplicable => "no deadline",
        SkipReason::UnknownState => "unknown state",
    }
}

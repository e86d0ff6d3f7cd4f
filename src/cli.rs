//! Command line interface built on clap.
//!
//! [`Cli`] carries the global flags (`--config`, `--now`, `--verbose`) and a
//! [`Command`] (run, status, rules).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Content lifecycle scheduler: unpublishes, archives and deletes content on a
/// configured schedule.
#[derive(Debug, Parser)]
#[command(name = "lifecycle", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the lifecycle configuration file.
    #[arg(
        long,
        global = true,
        env = "LIFECYCLE_CONFIG",
        default_value = "lifecycle.toml"
    )]
    pub config: PathBuf,

    /// Evaluate deadlines as of this RFC 3339 instant instead of the wall clock.
    #[arg(long, global = true, value_parser = parse_instant)]
    pub now: Option<DateTime<Utc>>,

    /// Enables debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Applies every lifecycle rule once and writes the records back.
    Run {
        /// JSON file holding the record population.
        #[arg(long)]
        records: PathBuf,
    },

    /// Shows the upcoming lifecycle notice for each record without changing anything.
    Status {
        /// JSON file holding the record population.
        #[arg(long)]
        records: PathBuf,
    },

    /// Lists the validated rule set.
    Rules,
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

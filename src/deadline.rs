//! Deadline computation from a record's history.
//!
//! The engine only ever asks a [`DeadlineCalculator`] "when does this policy
//! fire for this record?" and gets back a timestamp or `None` (not
//! applicable). [`OffsetDeadlineCalculator`] is the default implementation:
//! it adds a human-readable offset such as `"+6 months"` to the record's last
//! publish time (or, for never-published drafts, its last change).

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::lifecycle::Record;

/// The policies a deadline can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeadlineKind {
    /// Deleting a draft that was never published.
    UnpublishedDelete,
    /// PUBLISHED → UNPUBLISHED_CONTENT.
    Unpublish,
    /// UNPUBLISHED_CONTENT → TRASH.
    Archive,
    /// Deleting content that was published at some point.
    TrashDelete,
    /// Generic offset from the last publish time, used per transition rule.
    OffsetFromLastPublish,
}

impl std::fmt::Display for DeadlineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeadlineKind::UnpublishedDelete => "unpublished-delete",
            DeadlineKind::Unpublish => "unpublish",
            DeadlineKind::Archive => "archive",
            DeadlineKind::TrashDelete => "trash-delete",
            DeadlineKind::OffsetFromLastPublish => "offset-from-last-publish",
        };
        f.write_str(name)
    }
}

/// Computes absolute deadlines for a record.
///
/// `Ok(None)` means the policy does not apply to this record (for example it
/// was never published, or the offset is unusable). Errors abort the current
/// run.
pub trait DeadlineCalculator {
    fn deadline_for(
        &self,
        record: &Record,
        kind: DeadlineKind,
        offset: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>>;
}

/// A relative offset split into calendar months and a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub months: u32,
    pub duration: Duration,
}

impl Offset {
    /// Parses offsets like `"30 days"`, `"+6 months"`, `"1 year 2 weeks"` or `"12h"`.
    ///
    /// Returns `None` for empty input, unknown units, a number without unit or
    /// a total too large to represent.
    pub fn parse(s: &str) -> Option<Offset> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let mut tokens = trimmed.split_whitespace();
        let mut months: u32 = 0;
        let mut duration = Duration::zero();
        let mut found = false;

        while let Some(token) = tokens.next() {
            let digits_end = token
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(token.len());
            if digits_end == 0 {
                return None;
            }
            let n: u32 = token[..digits_end].parse().ok()?;
            let unit = if digits_end < token.len() {
                &token[digits_end..]
            } else {
                tokens.next()?
            };
            let n64 = i64::from(n);

            let part = match unit.trim_end_matches(',').to_ascii_lowercase().as_str() {
                "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(n64)?,
                "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(n64)?,
                "h" | "hour" | "hours" => Duration::try_hours(n64)?,
                "d" | "day" | "days" => Duration::try_days(n64)?,
                "w" | "week" | "weeks" => Duration::try_weeks(n64)?,
                "mo" | "month" | "months" => {
                    months = months.checked_add(n)?;
                    Duration::zero()
                }
                "y" | "year" | "years" => {
                    months = months.checked_add(n.checked_mul(12)?)?;
                    Duration::zero()
                }
                _ => return None,
            };
            duration = duration.checked_add(&part)?;
            found = true;
        }

        found.then_some(Offset { months, duration })
    }

    /// `anchor + self`, or `None` if the result leaves chrono's range.
    pub fn apply(&self, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        anchor
            .checked_add_months(Months::new(self.months))?
            .checked_add_signed(self.duration)
    }
}

/// Default calculator anchored on the record's publish history.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetDeadlineCalculator;

impl DeadlineCalculator for OffsetDeadlineCalculator {
    fn deadline_for(
        &self,
        record: &Record,
        kind: DeadlineKind,
        offset: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>> {
        let raw = match offset.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                debug!(id = %record.id, %kind, "no offset configured");
                return Ok(None);
            }
        };

        let Some(offset) = Offset::parse(raw) else {
            warn!(id = %record.id, %kind, offset = raw, "unparseable offset, policy ignored");
            return Ok(None);
        };

        let anchor = match (kind, record.last_published) {
            (DeadlineKind::UnpublishedDelete, None) => record.changed,
            (DeadlineKind::UnpublishedDelete, Some(_)) => return Ok(None),
            (_, Some(published)) => published,
            (_, None) => return Ok(None),
        };

        let deadline = offset.apply(anchor);
        if deadline.is_none() {
            warn!(
                id = %record.id,
                %kind,
                offset = raw,
                %anchor,
                "offset out of range, policy ignored"
            );
        }
        Ok(deadline)
    }
}

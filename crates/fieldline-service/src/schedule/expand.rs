//! Recurrence expansion using the `rrule` crate.
//!
//! Expansion works at second granularity: the rule's anchor is truncated
//! to whole seconds when the RRULE text is built.

use chrono::{DateTime, Utc};

use super::model::{DateRange, RecurrenceRule};

/// Error during recurrence expansion.
#[derive(Debug, thiserror::Error)]
pub enum ExpansionError {
    /// The rule could not be interpreted as a valid RRULE.
    #[error("Failed to parse recurrence rule: {0}")]
    ParseError(String),
}

impl RecurrenceRule {
    /// ## Summary
    /// Renders the rule as RFC 5545 RRULE text, e.g.
    /// `FREQ=WEEKLY;INTERVAL=2;UNTIL=20260301T090000Z`.
    #[must_use]
    pub fn to_rrule_string(&self) -> String {
        let mut rule = format!(
            "FREQ={};INTERVAL={}",
            self.frequency.as_rrule(),
            self.interval.max(1)
        );
        if let Some(end_date) = self.end_date {
            rule.push_str(&format!(";UNTIL={}", end_date.format("%Y%m%dT%H%M%SZ")));
        }
        rule
    }
}

/// ## Summary
/// Expands a recurring job's rule into the occurrence instants falling
/// inside the snapshot window, anchored at `dtstart`, capped at
/// `max_instances`.
///
/// ## Errors
/// Returns an error if the rendered RRULE text fails to parse.
pub fn expand_recurrence(
    rule: &RecurrenceRule,
    dtstart: DateTime<Utc>,
    range: &DateRange,
    max_instances: u16,
) -> Result<Vec<DateTime<Utc>>, ExpansionError> {
    let rrule_string = format!(
        "DTSTART:{}\nRRULE:{}",
        dtstart.format("%Y%m%dT%H%M%SZ"),
        rule.to_rrule_string()
    );

    let rrule_set = rrule_string
        .parse::<rrule::RRuleSet>()
        .map_err(|e| ExpansionError::ParseError(e.to_string()))?;

    let tz = rrule::Tz::Tz(chrono_tz::UTC);
    let bounded = rrule_set
        .after(range.start.with_timezone(&tz))
        .before(range.end.with_timezone(&tz));

    let result = bounded.all(max_instances);
    if result.limited {
        tracing::debug!(
            max_instances,
            "Recurrence expansion truncated at instance cap"
        );
    }

    Ok(result
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc))
        .collect())
}

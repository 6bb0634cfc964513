//! Event normalization: raw provider payloads into canonical [`Event`]s.
//!
//! Timestamps come in three shapes across the two providers, so parsing is
//! a prioritized list of parser functions tried in order, first success
//! wins. A start instant no parser accepts is a typed failure and the event
//! is dropped with a warning; the rest of the batch continues.

use crate::model::{Event, Source};
use crate::providers::RawStreamEvent;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Events shorter than this are treated as noise (clips, trailers).
pub const MIN_EVENT_HOURS: f64 = 0.5;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unparseable start instant '{0}'")]
    Timestamp(String),
}

/// Parse a provider instant string into UTC.
///
/// Priority order: `Z`-suffixed UTC, explicit-offset RFC 3339, bare local
/// form assumed UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    const PARSERS: &[fn(&str) -> Option<DateTime<Utc>>] =
        &[parse_zulu, parse_offset, parse_bare];
    PARSERS.iter().find_map(|parse| parse(raw))
}

fn parse_zulu(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_offset(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_bare(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Normalize one raw event into the canonical record.
///
/// Duration comes from the explicit seconds field when present, otherwise
/// from the start/end span. A missing or unparseable end instant yields a
/// zero duration, which the noise filter then removes; negative spans clamp
/// to zero.
pub fn normalize(raw: &RawStreamEvent, source: Source, tz: Tz) -> Result<Event, NormalizeError> {
    let start = parse_instant(&raw.started_at)
        .ok_or_else(|| NormalizeError::Timestamp(raw.started_at.clone()))?;

    let duration_hours = match raw.duration_secs {
        Some(secs) => secs as f64 / 3600.0,
        None => match raw.ended_at.as_deref() {
            Some(ended_at) => match parse_instant(ended_at) {
                Some(end) => ((end - start).num_seconds() as f64 / 3600.0).max(0.0),
                None => {
                    warn!(id = %raw.id, ended_at, "unparseable end instant, duration unknown");
                    0.0
                }
            },
            None => 0.0,
        },
    };

    Ok(Event {
        id: raw.id.clone(),
        source,
        local_start: start.with_timezone(&tz),
        duration_hours,
        views: raw.views,
        title: raw.title.clone(),
        status: raw.status.clone(),
    })
}

/// Normalize a whole batch, dropping malformed events and sub-30-minute
/// noise. Drops are logged, never fatal.
pub fn normalize_batch(raws: &[RawStreamEvent], source: Source, tz: Tz) -> Vec<Event> {
    let mut events = Vec::with_capacity(raws.len());
    for raw in raws {
        match normalize(raw, source, tz) {
            Ok(event) => {
                if event.duration_hours < MIN_EVENT_HOURS {
                    continue;
                }
                events.push(event);
            }
            Err(err) => {
                warn!(source = source.as_str(), id = %raw.id, %err, "dropping malformed event");
            }
        }
    }
    events
}

/// Group normalized events by their local calendar date, preserving input
/// order within each date.
pub fn group_by_date(events: Vec<Event>) -> BTreeMap<NaiveDate, Vec<Event>> {
    let mut groups: BTreeMap<NaiveDate, Vec<Event>> = BTreeMap::new();
    for event in events {
        groups.entry(event.local_date()).or_default().push(event);
    }
    groups
}

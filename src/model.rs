use chrono::{DateTime, NaiveDate, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// The two upstream platforms events are fetched from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Source {
    Youtube,
    Vimeo,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Youtube => "youtube",
            Source::Vimeo => "vimeo",
        }
    }
}

/// A normalized per-stream record on one calendar date.
///
/// Produced by the normalizer from raw provider payloads and immutable
/// afterwards. `local_start` is already converted to the configured service
/// timezone; grouping uses the local date, not the UTC date.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub source: Source,
    pub local_start: DateTime<Tz>,
    pub duration_hours: f64,
    pub views: u64,
    pub title: Option<String>,
    pub status: Option<String>,
}

impl Event {
    /// Local calendar date the event belongs to.
    pub fn local_date(&self) -> NaiveDate {
        self.local_start.date_naive()
    }

    /// Fractional local start hour, e.g. 08:50 -> 8.83.
    pub fn start_hour(&self) -> f64 {
        f64::from(self.local_start.hour()) + f64::from(self.local_start.minute()) / 60.0
    }
}

/// Attribution outcome for one (date, source) pair.
///
/// `slot_a` is the early (~9:00) service, `slot_b` the late (~10:45) one.
/// `None` means no count could be attributed to that slot; `notes` always
/// explains how the decision was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotResult {
    pub date: NaiveDate,
    pub source: Source,
    pub slot_a: Option<u64>,
    pub slot_b: Option<u64>,
    pub notes: String,
}

/// What a source contributed to a run.
///
/// `Unavailable` means the provider call itself failed and carries no
/// information, unlike `Fetched` with zero dates. The merger accepts this
/// type so a failed fetch can never be passed off as "every date was empty".
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Fetched(Vec<SlotResult>),
    Unavailable,
}

impl SourceOutcome {
    pub fn results(&self) -> &[SlotResult] {
        match self {
            SourceOutcome::Fetched(results) => results,
            SourceOutcome::Unavailable => &[],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SourceOutcome::Unavailable)
    }
}

/// Per-date union of both sources' attribution results.
///
/// A side missing for the date stays `None` with empty notes, never a
/// defaulted zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub date: NaiveDate,
    pub youtube_slot_a: Option<u64>,
    pub youtube_slot_b: Option<u64>,
    pub vimeo_slot_a: Option<u64>,
    pub vimeo_slot_b: Option<u64>,
    pub youtube_notes: String,
    pub vimeo_notes: String,
}

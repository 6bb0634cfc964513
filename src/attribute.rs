//! Slot attribution: decide which same-day events belong to which service.
//!
//! The engine is a pure function over in-memory events. It performs no I/O,
//! keeps no state between calls, and is deterministic for a given input
//! order: duplicates are dropped keeping the first occurrence, candidates
//! are sorted by local start with a stable sort, and the first matching
//! rule of the decision table wins. Judgment calls (more than two same-day
//! candidates) are appended to the caller-supplied [`DiscrepancyLog`] for
//! manual review instead of being resolved silently.

use crate::model::{Event, SlotResult, Source};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single recording longer than this covers both services.
pub const COMBINED_MIN_HOURS: f64 = 2.5;

/// Inclusive local start-hour window, e.g. `[8.0, 10.0]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HourWindow(pub f64, pub f64);

impl HourWindow {
    pub fn contains(&self, hour: f64) -> bool {
        self.0 <= hour && hour <= self.1
    }

    pub fn is_ordered(&self) -> bool {
        self.0 <= self.1
    }
}

/// Restricts which same-day events count as slot candidates at all.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CandidateFilter {
    /// Keep only events starting within this local-hour window.
    #[serde(default)]
    pub hour_window: Option<HourWindow>,
    /// Keep only events on this weekday (the service day).
    #[serde(default)]
    pub weekday: Option<Weekday>,
}

impl CandidateFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(window) = self.hour_window {
            if !window.contains(event.start_hour()) {
                return false;
            }
        }
        if let Some(weekday) = self.weekday {
            if event.local_start.weekday() != weekday {
                return false;
            }
        }
        true
    }
}

/// How a lone short event is assigned to a slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SingleRule {
    /// Start hour below the threshold goes to slot A, at or above to slot B.
    SplitHour(f64),
    /// Explicit per-slot windows, slot A checked first. A start hour in
    /// neither window leaves both slots unresolved.
    Windows {
        slot_a: HourWindow,
        slot_b: HourWindow,
    },
}

/// Per-source attribution knobs.
///
/// The two platforms historically disagreed on what a combined recording
/// means for the second slot (same value vs. zero), so that stays an
/// explicit flag here rather than a constant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotPolicy {
    /// Combined recording: `true` credits both slots with the full count,
    /// `false` credits slot A and records zero for slot B.
    pub combined_same_value: bool,
    #[serde(default)]
    pub filter: CandidateFilter,
    pub single: SingleRule,
}

/// Ordered free-text entries describing dates where attribution required a
/// judgment call. Owned by the caller and passed into [`attribute`]; never
/// process-wide state.
#[derive(Debug, Clone, Default)]
pub struct DiscrepancyLog {
    entries: Vec<String>,
}

impl DiscrepancyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: String) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, other: DiscrepancyLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Attribute one date's events to the two service slots.
///
/// `events` must already be normalized, noise-filtered and grouped to
/// `date`; malformed records never reach this function. The decision table,
/// first match wins:
/// 1. no candidates: both slots unresolved;
/// 2. one candidate longer than [`COMBINED_MIN_HOURS`]: combined recording,
///    second slot per `combined_same_value`;
/// 3. exactly two candidates: earlier start is slot A, later is slot B;
/// 4. one short candidate: assigned by the policy's [`SingleRule`];
/// 5. more than two: first two by start time, every candidate logged.
pub fn attribute(
    date: NaiveDate,
    source: Source,
    events: &[Event],
    policy: &SlotPolicy,
    log: &mut DiscrepancyLog,
) -> SlotResult {
    let mut seen = HashSet::new();
    let mut candidates: Vec<&Event> = Vec::with_capacity(events.len());
    for event in events {
        if seen.insert(event.id.as_str()) {
            candidates.push(event);
        }
    }
    candidates.retain(|event| policy.filter.matches(event));
    candidates.sort_by_key(|event| event.local_start);

    let (slot_a, slot_b, notes) = match candidates.as_slice() {
        [] => (None, None, "No events found".to_string()),
        [only] if only.duration_hours > COMBINED_MIN_HOURS => {
            let slot_b = if policy.combined_same_value {
                Some(only.views)
            } else {
                Some(0)
            };
            let notes = format!(
                "Combined recording ({:.1}h) at {}",
                only.duration_hours,
                only.local_start.format("%I:%M %p"),
            );
            (Some(only.views), slot_b, notes)
        }
        [earlier, later] => {
            let notes = format!(
                "slot A: {} ({:.1}h), slot B: {} ({:.1}h)",
                earlier.local_start.format("%I:%M %p"),
                earlier.duration_hours,
                later.local_start.format("%I:%M %p"),
                later.duration_hours,
            );
            (Some(earlier.views), Some(later.views), notes)
        }
        [only] => assign_single(only, &policy.single),
        many => {
            for candidate in many {
                log.push(format!(
                    "{} {}: {} | {:.1}h | {} views",
                    date,
                    source.as_str(),
                    candidate.local_start.format("%I:%M %p"),
                    candidate.duration_hours,
                    candidate.views,
                ));
            }
            let notes = format!("{} events found, used first two by start time", many.len());
            (Some(many[0].views), Some(many[1].views), notes)
        }
    };

    SlotResult {
        date,
        source,
        slot_a,
        slot_b,
        notes,
    }
}

fn assign_single(event: &Event, rule: &SingleRule) -> (Option<u64>, Option<u64>, String) {
    let hour = event.start_hour();
    let start = event.local_start.format("%I:%M %p");
    match rule {
        SingleRule::SplitHour(split) => {
            if hour < *split {
                let notes = format!(
                    "Single event at {} ({:.1}h), start hour {:.1}, assumed slot A",
                    start, event.duration_hours, hour,
                );
                (Some(event.views), None, notes)
            } else {
                let notes = format!(
                    "Single event at {} ({:.1}h), start hour {:.1}, assumed slot B",
                    start, event.duration_hours, hour,
                );
                (None, Some(event.views), notes)
            }
        }
        SingleRule::Windows { slot_a, slot_b } => {
            if slot_a.contains(hour) {
                let notes = format!(
                    "Single event at {} ({:.1}h), start hour {:.1}, assumed slot A",
                    start, event.duration_hours, hour,
                );
                (Some(event.views), None, notes)
            } else if slot_b.contains(hour) {
                let notes = format!(
                    "Single event at {} ({:.1}h), start hour {:.1}, assumed slot B",
                    start, event.duration_hours, hour,
                );
                (None, Some(event.views), notes)
            } else {
                let notes = format!(
                    "Single event at {} ({:.1}h), start hour {:.1} outside both slot windows",
                    start, event.duration_hours, hour,
                );
                (None, None, notes)
            }
        }
    }
}

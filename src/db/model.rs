//! Database entity and view models used by repositories.
//!
//! Keep these structs focused on the data returned by queries. The
//! skip-vs-overwrite decision lives here as well so it stays unit-testable
//! without a database.

use crate::model::MergedRecord;
use chrono::{DateTime, NaiveDate, Utc};

/// The four nullable count columns of a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub youtube_slot_a: Option<i64>,
    pub youtube_slot_b: Option<i64>,
    pub vimeo_slot_a: Option<i64>,
    pub vimeo_slot_b: Option<i64>,
}

impl RowCounts {
    /// A row is populated iff at least one count column is non-null.
    pub fn is_populated(&self) -> bool {
        self.youtube_slot_a.is_some()
            || self.youtube_slot_b.is_some()
            || self.vimeo_slot_a.is_some()
            || self.vimeo_slot_b.is_some()
    }
}

impl From<&MergedRecord> for RowCounts {
    fn from(record: &MergedRecord) -> Self {
        Self {
            youtube_slot_a: record.youtube_slot_a.map(|v| v as i64),
            youtube_slot_b: record.youtube_slot_b.map(|v| v as i64),
            vimeo_slot_a: record.vimeo_slot_a.map(|v| v as i64),
            vimeo_slot_b: record.vimeo_slot_b.map(|v| v as i64),
        }
    }
}

/// One persisted `service_stats` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub date: NaiveDate,
    pub counts: RowCounts,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// What the publisher will do for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    /// No row exists; insert with `created_at`.
    Insert,
    /// A row exists and may be written; update counts and `updated_at`,
    /// `created_at` untouched.
    Update,
    /// A populated row exists and overwrite is off.
    Skip,
}

impl WriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAction::Insert => "insert",
            WriteAction::Update => "update",
            WriteAction::Skip => "skip",
        }
    }
}

/// Decide the write action for a date given the existing row.
///
/// An empty row (all four counts null) never blocks a write; only a
/// populated row does, and `overwrite` forces through it.
pub fn decide(existing: Option<&StoredRow>, overwrite: bool) -> WriteAction {
    match existing {
        None => WriteAction::Insert,
        Some(row) if !row.counts.is_populated() => WriteAction::Update,
        Some(_) if overwrite => WriteAction::Update,
        Some(_) => WriteAction::Skip,
    }
}

//! Merge the two sources' per-date attribution results.
//!
//! Pure set-union-and-zip over the date keys, no recomputation: a date seen
//! by one source leaves the other source's slots `None` and its notes empty.
//! Output is sorted ascending by date.

use crate::model::{MergedRecord, SlotResult, SourceOutcome};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Union both sources' results into one record per date.
///
/// An `Unavailable` source contributes no dates at all, which is distinct
/// from a source that fetched fine and found nothing.
pub fn merge_sources(youtube: &SourceOutcome, vimeo: &SourceOutcome) -> Vec<MergedRecord> {
    let mut by_date: BTreeMap<NaiveDate, MergedRecord> = BTreeMap::new();

    for result in youtube.results() {
        let record = entry(&mut by_date, result.date);
        record.youtube_slot_a = result.slot_a;
        record.youtube_slot_b = result.slot_b;
        record.youtube_notes = result.notes.clone();
    }
    for result in vimeo.results() {
        let record = entry(&mut by_date, result.date);
        record.vimeo_slot_a = result.slot_a;
        record.vimeo_slot_b = result.slot_b;
        record.vimeo_notes = result.notes.clone();
    }

    by_date.into_values().collect()
}

fn entry(by_date: &mut BTreeMap<NaiveDate, MergedRecord>, date: NaiveDate) -> &mut MergedRecord {
    by_date.entry(date).or_insert_with(|| MergedRecord {
        date,
        youtube_slot_a: None,
        youtube_slot_b: None,
        vimeo_slot_a: None,
        vimeo_slot_b: None,
        youtube_notes: String::new(),
        vimeo_notes: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;
    use chrono::Datelike;

    fn result(source: Source, day: u32, slot_a: Option<u64>, slot_b: Option<u64>) -> SlotResult {
        SlotResult {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            source,
            slot_a,
            slot_b,
            notes: format!("{} notes", source.as_str()),
        }
    }

    #[test]
    fn union_of_both_date_sets_sorted() {
        let youtube = SourceOutcome::Fetched(vec![
            result(Source::Youtube, 14, Some(120), Some(90)),
            result(Source::Youtube, 7, Some(100), Some(150)),
        ]);
        let vimeo = SourceOutcome::Fetched(vec![result(Source::Vimeo, 21, Some(40), None)]);

        let merged = merge_sources(&youtube, &vimeo);
        let dates: Vec<u32> = merged.iter().map(|r| r.date.day0() + 1).collect();
        assert_eq!(dates, vec![7, 14, 21]);
    }

    #[test]
    fn shared_date_carries_both_sides() {
        let youtube = SourceOutcome::Fetched(vec![result(Source::Youtube, 7, Some(100), Some(150))]);
        let vimeo = SourceOutcome::Fetched(vec![result(Source::Vimeo, 7, Some(40), Some(60))]);

        let merged = merge_sources(&youtube, &vimeo);
        assert_eq!(merged.len(), 1);
        let record = &merged[0];
        assert_eq!(record.youtube_slot_a, Some(100));
        assert_eq!(record.youtube_slot_b, Some(150));
        assert_eq!(record.vimeo_slot_a, Some(40));
        assert_eq!(record.vimeo_slot_b, Some(60));
        assert_eq!(record.youtube_notes, "youtube notes");
        assert_eq!(record.vimeo_notes, "vimeo notes");
    }

    #[test]
    fn one_sided_date_leaves_other_side_absent() {
        let youtube = SourceOutcome::Fetched(vec![result(Source::Youtube, 7, Some(100), Some(150))]);
        let vimeo = SourceOutcome::Fetched(vec![]);

        let merged = merge_sources(&youtube, &vimeo);
        assert_eq!(merged.len(), 1);
        let record = &merged[0];
        assert_eq!(record.vimeo_slot_a, None);
        assert_eq!(record.vimeo_slot_b, None);
        assert!(record.vimeo_notes.is_empty());
    }

    #[test]
    fn unavailable_source_contributes_nothing() {
        let youtube = SourceOutcome::Fetched(vec![result(Source::Youtube, 7, Some(100), None)]);
        let vimeo = SourceOutcome::Unavailable;

        let merged = merge_sources(&youtube, &vimeo);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].vimeo_slot_a, None);
        assert!(merged[0].vimeo_notes.is_empty());
    }

    #[test]
    fn both_empty_is_empty() {
        let merged = merge_sources(
            &SourceOutcome::Fetched(vec![]),
            &SourceOutcome::Fetched(vec![]),
        );
        assert!(merged.is_empty());
    }
}

//! Run orchestration: fetch, normalize, attribute, merge, publish.
//!
//! The two sources' fetch+normalize+attribute legs are independent and run
//! as concurrent futures; the merger is the single join point. Each leg
//! owns its own discrepancy log, combined afterwards in source order.

use crate::attribute::{attribute, DiscrepancyLog, SlotPolicy};
use crate::config::Config;
use crate::db::Pool;
use crate::merge::merge_sources;
use crate::model::{MergedRecord, Source, SourceOutcome};
use crate::normalize::{group_by_date, normalize_batch};
use crate::providers::EventSource;
use crate::publish::{publish, PublishOptions, PublishReport};
use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub overwrite: bool,
    pub dry_run: bool,
}

/// One source leg's output.
#[derive(Debug)]
pub struct SourceRun {
    pub outcome: SourceOutcome,
    pub log: DiscrepancyLog,
}

/// Fetch one provider and attribute its events date by date.
///
/// A failed provider call yields `SourceOutcome::Unavailable` — absence of
/// data, not a run of empty dates — and the pipeline continues with the
/// other source.
pub async fn run_source(
    provider: &dyn EventSource,
    policy: &SlotPolicy,
    tz: Tz,
    start: NaiveDate,
    end: NaiveDate,
) -> SourceRun {
    let source = provider.source();
    let raws = match provider.fetch_events(start, end).await {
        Ok(raws) => raws,
        Err(err) => {
            warn!(source = source.as_str(), ?err, "provider fetch failed, source unavailable");
            return SourceRun {
                outcome: SourceOutcome::Unavailable,
                log: DiscrepancyLog::new(),
            };
        }
    };

    let events = normalize_batch(&raws, source, tz);
    let mut log = DiscrepancyLog::new();
    let mut results = Vec::new();
    for (date, day_events) in group_by_date(events) {
        if date < start || date > end {
            continue;
        }
        results.push(attribute(date, source, &day_events, policy, &mut log));
    }

    info!(
        source = source.as_str(),
        dates = results.len(),
        "source attribution complete"
    );
    SourceRun {
        outcome: SourceOutcome::Fetched(results),
        log,
    }
}

/// Full run outcome.
#[derive(Debug)]
pub struct RunReport {
    pub merged: Vec<MergedRecord>,
    pub discrepancies: DiscrepancyLog,
    pub unavailable: Vec<Source>,
    pub publish: PublishReport,
}

impl RunReport {
    /// A run succeeds only if both sources answered and every date persisted.
    pub fn is_success(&self) -> bool {
        self.unavailable.is_empty() && self.publish.failure.is_none()
    }
}

/// Execute the whole pipeline for one date range.
pub async fn run(
    pool: &Pool,
    youtube: &dyn EventSource,
    vimeo: &dyn EventSource,
    cfg: &Config,
    params: RunParams,
) -> RunReport {
    let tz = cfg.app.timezone;
    let (youtube_run, vimeo_run) = tokio::join!(
        run_source(youtube, &cfg.youtube.policy, tz, params.start, params.end),
        run_source(vimeo, &cfg.vimeo.policy, tz, params.start, params.end),
    );

    let mut discrepancies = youtube_run.log;
    discrepancies.extend(vimeo_run.log);
    for entry in discrepancies.entries() {
        warn!(discrepancy = %entry, "attribution required a judgment call");
    }

    let mut unavailable = Vec::new();
    if youtube_run.outcome.is_unavailable() {
        unavailable.push(Source::Youtube);
    }
    if vimeo_run.outcome.is_unavailable() {
        unavailable.push(Source::Vimeo);
    }

    let merged = merge_sources(&youtube_run.outcome, &vimeo_run.outcome);
    info!(dates = merged.len(), "merged both sources");

    let publish_report = publish(
        pool,
        &merged,
        PublishOptions {
            overwrite: params.overwrite,
            dry_run: params.dry_run,
        },
    )
    .await;

    RunReport {
        merged,
        discrepancies,
        unavailable,
        publish: publish_report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::RawStreamEvent;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono_tz::America::New_York;

    struct ScriptedSource {
        source: Source,
        events: Result<Vec<RawStreamEvent>>,
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        fn source(&self) -> Source {
            self.source
        }

        async fn fetch_events(
            &self,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<RawStreamEvent>> {
            match &self.events {
                Ok(events) => Ok(events.clone()),
                Err(err) => Err(anyhow!("{err}")),
            }
        }
    }

    fn raw(id: &str, started_at: &str, duration_secs: u64, views: u64) -> RawStreamEvent {
        RawStreamEvent {
            id: id.to_string(),
            title: None,
            started_at: started_at.to_string(),
            ended_at: None,
            duration_secs: Some(duration_secs),
            views,
            status: None,
        }
    }

    fn policy() -> SlotPolicy {
        let cfg: crate::config::Config =
            serde_yaml::from_str(crate::config::example()).unwrap();
        cfg.vimeo.policy
    }

    #[tokio::test]
    async fn attributes_each_date_in_range() {
        // Two Sundays, 13:50 UTC = 08:50 New York.
        let provider = ScriptedSource {
            source: Source::Vimeo,
            events: Ok(vec![
                raw("a", "2024-01-07T13:50:00Z", 4200, 100),
                raw("b", "2024-01-07T15:50:00Z", 3960, 150),
                raw("c", "2024-01-14T13:50:00Z", 11000, 200),
            ]),
        };
        let run = run_source(
            &provider,
            &policy(),
            New_York,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .await;

        let results = run.outcome.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].slot_a, Some(100));
        assert_eq!(results[0].slot_b, Some(150));
        // Lone combined recording, zero-for-second-slot policy.
        assert_eq!(results[1].slot_a, Some(200));
        assert_eq!(results[1].slot_b, Some(0));
        assert!(run.log.is_empty());
    }

    #[tokio::test]
    async fn dates_outside_range_are_dropped() {
        let provider = ScriptedSource {
            source: Source::Vimeo,
            events: Ok(vec![raw("a", "2023-12-31T13:50:00Z", 4200, 100)]),
        };
        let run = run_source(
            &provider,
            &policy(),
            New_York,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .await;
        assert!(run.outcome.results().is_empty());
        assert!(!run.outcome.is_unavailable());
    }

    #[tokio::test]
    async fn fetch_failure_marks_source_unavailable() {
        let provider = ScriptedSource {
            source: Source::Youtube,
            events: Err(anyhow!("quota exceeded")),
        };
        let run = run_source(
            &provider,
            &policy(),
            New_York,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .await;
        assert!(run.outcome.is_unavailable());
    }
}

//! Publish merged records to the store, one date at a time.
//!
//! Dry-run walks the identical decision path through a read-only preview; a
//! live run applies each date in its own transaction. A persistence failure
//! stops the run after the failing date, leaving the remaining dates
//! untouched and reporting the already-applied ones.

use crate::db::{self, Pool, WriteAction};
use crate::model::MergedRecord;
use chrono::NaiveDate;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    pub overwrite: bool,
    pub dry_run: bool,
}

/// A persistence failure on one date.
#[derive(Debug, Clone)]
pub struct PublishFailure {
    pub date: NaiveDate,
    pub error: String,
    /// Dates after the failing one that were never attempted.
    pub unprocessed: Vec<NaiveDate>,
}

/// Per-date outcomes of a publish pass.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub dry_run: bool,
    pub outcomes: Vec<(NaiveDate, WriteAction)>,
    pub failure: Option<PublishFailure>,
}

impl PublishReport {
    pub fn count(&self, action: WriteAction) -> usize {
        self.outcomes.iter().filter(|(_, a)| *a == action).count()
    }
}

/// Publish all records in date order.
pub async fn publish(pool: &Pool, records: &[MergedRecord], opts: PublishOptions) -> PublishReport {
    let mut report = PublishReport {
        dry_run: opts.dry_run,
        ..Default::default()
    };

    for (index, record) in records.iter().enumerate() {
        let result = if opts.dry_run {
            db::preview_record(pool, record, opts.overwrite).await
        } else {
            db::upsert_record(pool, record, opts.overwrite).await
        };

        match result {
            Ok(action) => {
                match action {
                    WriteAction::Skip => {
                        info!(date = %record.date, "skipped, row already populated")
                    }
                    _ => {
                        if opts.dry_run {
                            info!(date = %record.date, action = action.as_str(), "dry run, would write");
                        } else {
                            info!(date = %record.date, action = action.as_str(), "row written");
                        }
                    }
                }
                report.outcomes.push((record.date, action));
            }
            Err(err) => {
                error!(date = %record.date, ?err, "persistence failed, aborting remaining dates");
                report.failure = Some(PublishFailure {
                    date: record.date,
                    error: format!("{err:#}"),
                    unprocessed: records[index + 1..].iter().map(|r| r.date).collect(),
                });
                break;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fetch_row;
    use sqlx::SqlitePool;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn record(day: u32, views: u64) -> MergedRecord {
        MergedRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            youtube_slot_a: Some(views),
            youtube_slot_b: None,
            vimeo_slot_a: None,
            vimeo_slot_b: None,
            youtube_notes: String::new(),
            vimeo_notes: String::new(),
        }
    }

    #[tokio::test]
    async fn live_run_inserts_every_date() {
        let pool = setup_pool().await;
        let records = vec![record(7, 100), record(14, 150)];

        let report = publish(&pool, &records, PublishOptions::default()).await;
        assert!(report.failure.is_none());
        assert_eq!(report.count(WriteAction::Insert), 2);
        assert!(fetch_row(&pool, records[1].date).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dry_run_decides_but_writes_nothing() {
        let pool = setup_pool().await;
        let records = vec![record(7, 100)];

        let opts = PublishOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = publish(&pool, &records, opts).await;
        assert!(report.dry_run);
        assert_eq!(report.outcomes, vec![(records[0].date, WriteAction::Insert)]);
        assert!(fetch_row(&pool, records[0].date).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_failure_aborts_remaining_dates() {
        let pool = setup_pool().await;
        // Make writes for the middle date fail at the engine level.
        sqlx::query(
            "CREATE TRIGGER reject_mid_date BEFORE INSERT ON service_stats \
             WHEN NEW.date = '2024-01-14' \
             BEGIN SELECT RAISE(ABORT, 'simulated storage failure'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let records = vec![record(7, 100), record(14, 150), record(21, 200)];
        let report = publish(&pool, &records, PublishOptions::default()).await;

        let failure = report.failure.expect("failure reported");
        assert_eq!(failure.date, records[1].date);
        assert!(failure.error.contains("insert"));
        assert_eq!(failure.unprocessed, vec![records[2].date]);

        // The date applied before the failure survives; nothing after lands.
        assert_eq!(report.outcomes, vec![(records[0].date, WriteAction::Insert)]);
        assert!(fetch_row(&pool, records[0].date).await.unwrap().is_some());
        assert!(fetch_row(&pool, records[1].date).await.unwrap().is_none());
        assert!(fetch_row(&pool, records[2].date).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_pass_without_overwrite_skips() {
        let pool = setup_pool().await;
        let records = vec![record(7, 100)];

        publish(&pool, &records, PublishOptions::default()).await;
        let report = publish(&pool, &records, PublishOptions::default()).await;
        assert_eq!(report.count(WriteAction::Skip), 1);
    }
}

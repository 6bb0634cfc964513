use super::model::{decide, RowCounts, StoredRow, WriteAction};
use crate::model::MergedRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, ensure the parent directory exists.
/// Leaves in-memory URLs and other schemes untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, _query) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    if let Some(parent) = std::path::Path::new(path_part).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    url.to_string()
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn fetch_row(pool: &Pool, date: NaiveDate) -> Result<Option<StoredRow>> {
    let row = sqlx::query(
        "SELECT date, youtube_slot_a, youtube_slot_b, vimeo_slot_a, vimeo_slot_b, \
                created_at, updated_at \
         FROM service_stats WHERE date = ?",
    )
    .bind(date)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(StoredRow {
        date: row.get("date"),
        counts: RowCounts {
            youtube_slot_a: row.get("youtube_slot_a"),
            youtube_slot_b: row.get("youtube_slot_b"),
            vimeo_slot_a: row.get("vimeo_slot_a"),
            vimeo_slot_b: row.get("vimeo_slot_b"),
        },
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<Option<DateTime<Utc>>, _>("updated_at"),
    }))
}

/// Run the existence check and decision without writing anything.
/// Dry-run mode uses this to report what a live run would do.
#[instrument(skip_all)]
pub async fn preview_record(
    pool: &Pool,
    record: &MergedRecord,
    overwrite: bool,
) -> Result<WriteAction> {
    let existing = fetch_row(pool, record.date).await?;
    Ok(decide(existing.as_ref(), overwrite))
}

/// Apply one merged record inside a single transaction.
///
/// The read-check-then-write runs on one connection between `begin` and
/// `commit`; a concurrent duplicate insert trips the `date` primary key and
/// rolls back rather than losing an update. The four columns are written
/// together or not at all.
#[instrument(skip_all, fields(date = %record.date))]
pub async fn upsert_record(
    pool: &Pool,
    record: &MergedRecord,
    overwrite: bool,
) -> Result<WriteAction> {
    let counts = RowCounts::from(record);
    let mut tx = pool.begin().await?;

    let existing = sqlx::query(
        "SELECT youtube_slot_a, youtube_slot_b, vimeo_slot_a, vimeo_slot_b, \
                created_at, updated_at \
         FROM service_stats WHERE date = ?",
    )
    .bind(record.date)
    .fetch_optional(&mut *tx)
    .await?
    .map(|row| StoredRow {
        date: record.date,
        counts: RowCounts {
            youtube_slot_a: row.get("youtube_slot_a"),
            youtube_slot_b: row.get("youtube_slot_b"),
            vimeo_slot_a: row.get("vimeo_slot_a"),
            vimeo_slot_b: row.get("vimeo_slot_b"),
        },
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<Option<DateTime<Utc>>, _>("updated_at"),
    });

    let action = decide(existing.as_ref(), overwrite);
    match action {
        WriteAction::Insert => {
            sqlx::query(
                "INSERT INTO service_stats \
                 (date, youtube_slot_a, youtube_slot_b, vimeo_slot_a, vimeo_slot_b, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(record.date)
            .bind(counts.youtube_slot_a)
            .bind(counts.youtube_slot_b)
            .bind(counts.vimeo_slot_a)
            .bind(counts.vimeo_slot_b)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .context("failed to insert service stats row")?;
        }
        WriteAction::Update => {
            sqlx::query(
                "UPDATE service_stats \
                 SET youtube_slot_a = ?, youtube_slot_b = ?, vimeo_slot_a = ?, vimeo_slot_b = ?, \
                     updated_at = ? \
                 WHERE date = ?",
            )
            .bind(counts.youtube_slot_a)
            .bind(counts.youtube_slot_b)
            .bind(counts.vimeo_slot_a)
            .bind(counts.vimeo_slot_b)
            .bind(Utc::now())
            .bind(record.date)
            .execute(&mut *tx)
            .await
            .context("failed to update service stats row")?;
        }
        WriteAction::Skip => {}
    }

    tx.commit().await?;
    Ok(action)
}

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use stream_tally::db::WriteAction;
use stream_tally::pipeline::{self, RunParams};
use stream_tally::providers::{VimeoClient, YoutubeClient};
use stream_tally::{config, db, export};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Attribute per-stream view counts to the weekly service slots and upsert them"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// First date to process (inclusive, YYYY-MM-DD)
    #[arg(long)]
    start_date: NaiveDate,

    /// Last date to process (inclusive, YYYY-MM-DD)
    #[arg(long)]
    end_date: NaiveDate,

    /// Decide and report without writing to the store
    #[arg(long)]
    dry_run: bool,

    /// Overwrite rows that already carry values
    #[arg(long)]
    overwrite: bool,

    /// Also write the merged records to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Also write discrepancy log entries to this file
    #[arg(long)]
    discrepancy_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if args.start_date > args.end_date {
        bail!("--start-date must not be after --end-date");
    }

    let cfg = config::load(Some(&args.config))?;
    let pool = db::init_pool(&cfg.resolved_database_url()).await?;
    db::run_migrations(&pool).await?;

    let youtube = YoutubeClient::new(
        cfg.youtube.api_key.clone(),
        cfg.youtube.channel_id.clone(),
        cfg.app.fetch_cap,
    );
    let vimeo = VimeoClient::new(
        cfg.vimeo.access_token.clone(),
        cfg.vimeo.user_id.clone(),
        cfg.app.fetch_cap,
    );

    if args.dry_run {
        info!("dry run: no store writes will be performed");
    }
    let report = pipeline::run(
        &pool,
        &youtube,
        &vimeo,
        &cfg,
        RunParams {
            start: args.start_date,
            end: args.end_date,
            overwrite: args.overwrite,
            dry_run: args.dry_run,
        },
    )
    .await;

    if let Some(path) = &args.csv {
        export::write_csv(path, &report.merged)?;
    }
    if let Some(path) = &args.discrepancy_log {
        export::write_discrepancies(path, &report.discrepancies)?;
    }

    info!(
        dates = report.merged.len(),
        inserted = report.publish.count(WriteAction::Insert),
        updated = report.publish.count(WriteAction::Update),
        skipped = report.publish.count(WriteAction::Skip),
        discrepancies = report.discrepancies.len(),
        "run complete"
    );

    if let Some(failure) = &report.publish.failure {
        let unprocessed: Vec<String> = failure
            .unprocessed
            .iter()
            .map(ToString::to_string)
            .collect();
        bail!(
            "persistence failed for {}: {} (unprocessed dates: [{}])",
            failure.date,
            failure.error,
            unprocessed.join(", ")
        );
    }
    if !report.unavailable.is_empty() {
        let names: Vec<&str> = report.unavailable.iter().map(|s| s.as_str()).collect();
        bail!("source(s) unavailable: {}", names.join(", "));
    }

    Ok(())
}

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use stream_tally::server::{serve, AppContext};
use stream_tally::{config, db};

#[derive(Debug, Parser)]
#[command(author, version, about = "Serve the asynchronous pipeline trigger endpoint")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let pool = db::init_pool(&cfg.resolved_database_url()).await?;
    db::run_migrations(&pool).await?;

    serve(AppContext::new(pool, cfg), args.bind).await
}

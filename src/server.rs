//! Asynchronous HTTP trigger for the pipeline.
//!
//! `POST /runs` answers immediately with a job id and executes the run
//! out-of-band; `GET /runs/:id` reports where that job stands.

use crate::config::Config;
use crate::db::Pool;
use crate::pipeline::{self, RunParams};
use crate::providers::{VimeoClient, YoutubeClient};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};
use uuid::Uuid;

/// Upper bound on remembered jobs; finished ones are evicted oldest-first
/// once the registry is full.
const MAX_TRACKED_JOBS: usize = 256;

/// Shared application context passed to all handlers.
#[derive(Clone)]
pub struct AppContext {
    pool: Pool,
    cfg: Arc<Config>,
    jobs: Arc<Mutex<JobRegistry>>,
}

impl AppContext {
    pub fn new(pool: Pool, cfg: Config) -> Self {
        Self {
            pool,
            cfg: Arc::new(cfg),
            jobs: Arc::new(Mutex::new(JobRegistry::default())),
        }
    }
}

/// Job states keyed by id, with insertion order kept for eviction.
#[derive(Default)]
struct JobRegistry {
    states: HashMap<Uuid, JobState>,
    order: VecDeque<Uuid>,
}

impl JobRegistry {
    fn set(&mut self, id: Uuid, state: JobState) {
        if self.states.insert(id, state).is_none() {
            self.order.push_back(id);
            self.evict_finished();
        }
    }

    fn get(&self, id: &Uuid) -> Option<JobState> {
        self.states.get(id).cloned()
    }

    fn evict_finished(&mut self) {
        while self.order.len() > MAX_TRACKED_JOBS {
            let finished = self.order.iter().position(|id| {
                matches!(self.states.get(id), Some(JobState::Completed { .. }))
            });
            // Queued and running jobs are never evicted.
            let Some(pos) = finished else { break };
            if let Some(evicted) = self.order.remove(pos) {
                self.states.remove(&evicted);
            }
        }
    }
}

/// A panicked holder leaves usable data behind; recover the guard instead
/// of cascading the poison to every later status query.
fn lock_jobs(jobs: &Mutex<JobRegistry>) -> MutexGuard<'_, JobRegistry> {
    jobs.lock().unwrap_or_else(|err| err.into_inner())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed {
        dates: usize,
        discrepancies: usize,
        success: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Serialize)]
struct RunAccepted {
    job_id: Uuid,
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/runs", post(submit_run))
        .route("/runs/:id", get(job_status))
        .with_state(ctx)
}

/// Bind and serve until the process is stopped.
pub async fn serve(ctx: AppContext, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "trigger endpoint listening");
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn submit_run(
    State(ctx): State<AppContext>,
    Json(req): Json<RunRequest>,
) -> impl IntoResponse {
    if req.start_date > req.end_date {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "start_date must not be after end_date" })),
        )
            .into_response();
    }

    let job_id = Uuid::new_v4();
    set_state(&ctx, job_id, JobState::Queued);
    info!(%job_id, start = %req.start_date, end = %req.end_date, "run accepted");

    let job_ctx = ctx.clone();
    tokio::spawn(async move {
        execute_run(job_ctx, job_id, req).await;
    });

    (StatusCode::ACCEPTED, Json(RunAccepted { job_id })).into_response()
}

async fn job_status(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobState>, StatusCode> {
    lock_jobs(&ctx.jobs)
        .get(&id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn execute_run(ctx: AppContext, job_id: Uuid, req: RunRequest) {
    set_state(&ctx, job_id, JobState::Running);

    let cfg = &ctx.cfg;
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
    let params = RunParams {
        start: req.start_date,
        end: req.end_date,
        overwrite: req.overwrite,
        dry_run: req.dry_run,
    };

    let report = pipeline::run(&ctx.pool, &youtube, &vimeo, cfg, params).await;
    if !report.is_success() {
        error!(%job_id, unavailable = ?report.unavailable, "background run did not fully succeed");
    }
    set_state(
        &ctx,
        job_id,
        JobState::Completed {
            dates: report.merged.len(),
            discrepancies: report.discrepancies.len(),
            success: report.is_success(),
        },
    );
}

fn set_state(ctx: &AppContext, job_id: Uuid, state: JobState) {
    lock_jobs(&ctx.jobs).set(job_id, state);
}

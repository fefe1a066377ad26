//! # HTTP Job Surface
//!
//! A small web surface for launching campaign runs and polling their
//! progress, the way the hosted product drives the engine.
//!
//! ## Usage
//!
//! ```bash
//! certiflow serve --listen 0.0.0.0:8080
//! ```
//!
//! `POST /api/campaigns/run` accepts a project plus its template bytes,
//! spawns the run in the background and immediately returns a job id. The
//! client polls `GET /api/jobs/{id}` for a status that moves through
//! `pending` → `running` (with an integer percent) → `done` or `failed`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::MemoryAuditLog;
use crate::campaign::{CampaignRunner, RunEvent, RunSelection};
use crate::error::CertiflowError;
use crate::project::Project;
use crate::quota::{MemoryQuotaStore, PlanTier, UsagePolicy};
use crate::transport::{MessageTransport, MockTransport, SmtpRelayConfig, SmtpTransport};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080").
    pub listen_addr: String,
    /// Plan tier applied to every caller of this instance.
    pub plan: PlanTier,
    /// Tier → daily limit mapping.
    pub policy: UsagePolicy,
    /// Relay for outgoing mail; `None` falls back to the mock transport
    /// (useful for local trials without an SMTP sink).
    pub smtp: Option<SmtpRelayConfig>,
}

/// Status of a background campaign job.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running {
        percent: u8,
    },
    Done {
        sent: usize,
        failed: usize,
        /// The project with per-row statuses updated, so the caller can see
        /// which rows failed and resubmit the project with `retryFailed`.
        project: Box<Project>,
    },
    Failed {
        error: String,
    },
}

struct AppState {
    jobs: RwLock<HashMap<String, JobStatus>>,
    transport: Box<dyn MessageTransport>,
    quota: MemoryQuotaStore,
    audit: MemoryAuditLog,
}

/// Request body for `POST /api/campaigns/run`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub user_id: String,
    pub project: Project,
    /// Template asset, base64-encoded.
    pub template: String,
    /// Retry only the rows that previously failed.
    #[serde(default)]
    pub retry_failed: bool,
}

/// Start the HTTP server.
pub async fn serve(config: ServerConfig) -> Result<(), CertiflowError> {
    let transport: Box<dyn MessageTransport> = match &config.smtp {
        Some(relay) => Box::new(SmtpTransport::new(relay)?),
        None => Box::new(MockTransport::new()),
    };

    let state = Arc::new(AppState {
        jobs: RwLock::new(HashMap::new()),
        transport,
        quota: MemoryQuotaStore::new(config.policy.limit_for(config.plan)),
        audit: MemoryAuditLog::new(),
    });

    let app = router(state);

    info!(listen = %config.listen_addr, "certiflow job server starting");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            CertiflowError::Precondition(format!(
                "failed to bind to {}: {e}",
                config.listen_addr
            ))
        })?;
    axum::serve(listener, app)
        .await
        .map_err(|e| CertiflowError::Precondition(format!("server error: {e}")))?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/campaigns/run", post(run_handler))
        .route("/api/jobs/:id", get(job_handler))
        .with_state(state)
}

/// Handle `POST /api/campaigns/run`: register the job, spawn the run, and
/// return the job id for polling.
async fn run_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Response {
    let template = match BASE64_STANDARD.decode(&request.template) {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("invalid template encoding: {e}") })),
            )
                .into_response();
        }
    };

    let job_id = Uuid::new_v4().to_string();
    state
        .jobs
        .write()
        .await
        .insert(job_id.clone(), JobStatus::Pending);

    let (events_tx, mut events_rx) = mpsc::channel::<RunEvent>(100);

    // Listener task: translate run events into job-map updates so the
    // polling endpoint sees progress incrementally.
    let listener_state = state.clone();
    let listener_job_id = job_id.clone();
    let listener = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if let RunEvent::Progress { percent, .. } = event {
                listener_state
                    .jobs
                    .write()
                    .await
                    .insert(listener_job_id.clone(), JobStatus::Running { percent });
            }
        }
    });

    let job_state = state.clone();
    let spawned_job_id = job_id.clone();
    tokio::spawn(async move {
        let mut project = request.project;
        let runner = CampaignRunner::new(
            job_state.transport.as_ref(),
            &job_state.quota,
            &job_state.audit,
        )
        .with_events(events_tx);

        let result = if request.retry_failed {
            runner
                .retry_failed(&mut project, &request.user_id, &template)
                .await
        } else {
            runner
                .run(&mut project, &request.user_id, &template, RunSelection::All)
                .await
        };

        // Close the event channel and join the listener before writing the
        // terminal status, so a still-queued Progress event can never
        // overwrite Done or Failed in the job map.
        drop(runner);
        let _ = listener.await;

        let status = match result {
            Ok(outcome) => JobStatus::Done {
                sent: outcome.sent,
                failed: outcome.failed,
                project: Box::new(project),
            },
            Err(err) => {
                error!(job = %spawned_job_id, %err, "campaign job failed");
                JobStatus::Failed {
                    error: err.to_string(),
                }
            }
        };
        job_state.jobs.write().await.insert(spawned_job_id, status);
    });

    (StatusCode::ACCEPTED, Json(serde_json::json!({ "jobId": job_id }))).into_response()
}

/// Handle `GET /api/jobs/{id}`.
async fn job_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.jobs.read().await.get(&id) {
        Some(status) => Json(status.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "unknown job" })),
        )
            .into_response(),
    }
}

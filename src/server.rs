use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::app::dispatcher::{
    ExecutionMode, InProcessJobDispatcher, JobDispatcher, ProcessJobDispatcher,
    WorkerPoolExhausted,
};
use crate::app::job_store::{InMemoryJobStore, JobStore};
use crate::app::model::Job;
use crate::app::queue::BoundedQueue;
use crate::app::runner::CrawlRunner;
use crate::config::AppConfig;
use crate::formats::{CrawlRequest, WorkerReport};

#[derive(Clone)]
pub struct AppState {
    pub job_store: Arc<dyn JobStore>,
    pub dispatcher: Arc<dyn JobDispatcher>,
}

impl AppState {
    pub fn from_config(config: &AppConfig, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let queue = BoundedQueue::new(config.server.max_workers);

        let dispatcher: Arc<dyn JobDispatcher> = match config.server.execution_mode {
            ExecutionMode::Process => Arc::new(ProcessJobDispatcher::for_current_exe(
                config_path,
                queue,
                Arc::clone(&job_store),
            )?),
            ExecutionMode::InProcess => Arc::new(InProcessJobDispatcher::new(
                queue,
                Arc::new(CrawlRunner::from_config(config)?),
                Arc::clone(&job_store),
            )),
        };

        Ok(Self {
            job_store,
            dispatcher,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/crawl", get(start_crawl))
        .route("/jobs/:job_id", get(get_job))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {addr}: {err}"))?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "install ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Query values are parsed leniently: anything unparsable falls back to the
/// default, and a page below 1 becomes 1.
#[derive(Debug, Default, Deserialize)]
pub struct CrawlQuery {
    page: Option<String>,
    num_chapters: Option<String>,
}

impl CrawlQuery {
    pub fn into_request(self) -> CrawlRequest {
        let page_num = self
            .page
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| *v >= 1)
            .unwrap_or_else(CrawlRequest::default_page_num);
        let num_chapters = self
            .num_chapters
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or_else(CrawlRequest::default_num_chapters);
        CrawlRequest {
            page_num,
            num_chapters,
        }
    }
}

async fn start_crawl(
    State(state): State<AppState>,
    Query(query): Query<CrawlQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let request = query.into_request();
    let job = Job::new(request);
    state
        .job_store
        .create(&job)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")))?;

    let dispatched = match state.dispatcher.dispatch(&job).await {
        Ok(dispatched) => dispatched,
        Err(err) => {
            tracing::warn!(job_id = %job.job_id, ?err, "dispatch failed");
            let mut failed = job.clone();
            failed.apply_report(&WorkerReport::Error {
                error: format!("{err:#}"),
            });
            if let Err(store_err) = state.job_store.put(&failed).await {
                tracing::warn!(job_id = %job.job_id, ?store_err, "record dispatch failure failed");
            }

            let status = if err.is::<WorkerPoolExhausted>() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return Err((status, format!("{err:#}")));
        }
    };

    tracing::info!(
        job_id = %job.job_id,
        page = request.page_num,
        num_chapters = request.num_chapters,
        worker_pid = dispatched.worker_pid,
        "crawl started"
    );
    Ok(Json(serde_json::json!({
        "status": "started",
        "worker_pid": dispatched.worker_pid,
        "job_id": job.job_id,
    })))
}

async fn get_job(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> Result<Json<Job>, StatusCode> {
    if uuid::Uuid::parse_str(job_id.trim()).is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }
    match state.job_store.get(&job_id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::process::{Child, Command};

use crate::app::job_store::{self, JobStore};
use crate::app::model::Job;
use crate::app::queue::BoundedQueue;
use crate::app::runner::CrawlRunner;
use crate::formats::{CrawlRequest, WorkerReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One OS process per crawl.
    Process,
    /// One tokio task per crawl inside the serving process.
    #[value(name = "inprocess")]
    InProcess,
}

impl ExecutionMode {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "process" => Ok(Self::Process),
            "inprocess" => Ok(Self::InProcess),
            other => anyhow::bail!("unsupported execution mode: {other}"),
        }
    }
}

/// Every worker slot is taken; the trigger should be retried later.
#[derive(Debug)]
pub struct WorkerPoolExhausted;

impl std::fmt::Display for WorkerPoolExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("all crawl workers are busy")
    }
}

impl std::error::Error for WorkerPoolExhausted {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub worker_pid: Option<u32>,
}

/// Starts a crawl for `job` without waiting for it. The terminal report is
/// written to the job store when it arrives.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: &Job) -> anyhow::Result<Dispatched>;
}

#[derive(Clone)]
pub struct InProcessJobDispatcher {
    queue: BoundedQueue,
    runner: Arc<CrawlRunner>,
    job_store: Arc<dyn JobStore>,
}

impl InProcessJobDispatcher {
    pub fn new(queue: BoundedQueue, runner: Arc<CrawlRunner>, job_store: Arc<dyn JobStore>) -> Self {
        Self {
            queue,
            runner,
            job_store,
        }
    }
}

#[async_trait]
impl JobDispatcher for InProcessJobDispatcher {
    async fn dispatch(&self, job: &Job) -> anyhow::Result<Dispatched> {
        let runner = Arc::clone(&self.runner);
        let job_store = Arc::clone(&self.job_store);
        let job_id = job.job_id.clone();
        let request = job.request;

        self.queue.spawn(async move {
            if let Err(err) = job_store::mark_running(job_store.as_ref(), &job_id, None).await {
                tracing::warn!(job_id, ?err, "mark job running failed");
            }
            let report = runner.report_isolated(request).await;
            finish(job_store.as_ref(), &job_id, &report).await;
        });
        Ok(Dispatched { worker_pid: None })
    }
}

/// Launches a separate worker process per job.
#[derive(Clone)]
pub struct ProcessJobDispatcher {
    program: OsString,
    args: Vec<OsString>,
    queue: BoundedQueue,
    job_store: Arc<dyn JobStore>,
}

impl ProcessJobDispatcher {
    pub fn new(
        program: impl Into<OsString>,
        args: Vec<OsString>,
        queue: BoundedQueue,
        job_store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            queue,
            job_store,
        }
    }

    /// Workers re-run the current executable as `[--config <path>] worker`.
    pub fn for_current_exe(
        config_path: Option<&Path>,
        queue: BoundedQueue,
        job_store: Arc<dyn JobStore>,
    ) -> anyhow::Result<Self> {
        let program = std::env::current_exe().context("locate current executable")?;
        let mut args = Vec::new();
        if let Some(path) = config_path {
            args.push(OsString::from("--config"));
            args.push(path.as_os_str().to_owned());
        }
        args.push(OsString::from("worker"));
        Ok(Self::new(program, args, queue, job_store))
    }

    async fn spawn_worker(&self, request: CrawlRequest) -> anyhow::Result<Child> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn worker: {}", self.program.to_string_lossy()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("worker stdin is not piped"))?;
        let mut message = serde_json::to_vec(&request).context("serialize crawl request")?;
        message.push(b'\n');
        stdin
            .write_all(&message)
            .await
            .context("send crawl request to worker")?;
        drop(stdin);

        Ok(child)
    }
}

#[async_trait]
impl JobDispatcher for ProcessJobDispatcher {
    async fn dispatch(&self, job: &Job) -> anyhow::Result<Dispatched> {
        let permit = self.queue.try_reserve().ok_or(WorkerPoolExhausted)?;
        let child = self.spawn_worker(job.request).await?;
        let worker_pid = child.id();
        tracing::info!(job_id = %job.job_id, worker_pid, "worker started");

        job_store::mark_running(self.job_store.as_ref(), &job.job_id, worker_pid)
            .await
            .context("mark job running")?;

        let job_store = Arc::clone(&self.job_store);
        let job_id = job.job_id.clone();
        self.queue.spawn_reserved(permit, async move {
            let report = collect_report(child).await;
            finish(job_store.as_ref(), &job_id, &report).await;
        });
        Ok(Dispatched { worker_pid })
    }
}

/// Reads the worker's stdout until it closes; the last report line wins.
async fn collect_report(mut child: Child) -> WorkerReport {
    let mut last = None;
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_report_line(&line) {
                    Some(report) => last = Some(report),
                    None => tracing::debug!(line, "ignoring worker output"),
                },
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(?err, "read worker output failed");
                    break;
                }
            }
        }
    }

    let status = child.wait().await;
    match (last, status) {
        (Some(report), _) => report,
        (None, Ok(status)) => WorkerReport::Error {
            error: format!("worker exited without a report ({status})"),
        },
        (None, Err(err)) => WorkerReport::Error {
            error: format!("wait for worker: {err}"),
        },
    }
}

fn parse_report_line(line: &str) -> Option<WorkerReport> {
    serde_json::from_str(line.trim()).ok()
}

async fn finish(job_store: &dyn JobStore, job_id: &str, report: &WorkerReport) {
    match report {
        WorkerReport::Done { total } => tracing::info!(job_id, total, "[worker] done"),
        WorkerReport::Error { error } => tracing::warn!(job_id, error, "[worker] error"),
    }
    if let Err(err) = job_store::record_report(job_store, job_id, report).await {
        tracing::error!(job_id, ?err, "record worker report failed");
    }
}

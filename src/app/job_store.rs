use std::collections::HashMap;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::app::model::Job;
use crate::formats::WorkerReport;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> anyhow::Result<()>;
    async fn get(&self, job_id: &str) -> anyhow::Result<Option<Job>>;
    async fn put(&self, job: &Job) -> anyhow::Result<()>;
}

/// Job records for the lifetime of the serving process.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> anyhow::Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            anyhow::bail!("job already exists: {}", job.job_id);
        }
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> anyhow::Result<Option<Job>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn put(&self, job: &Job) -> anyhow::Result<()> {
        self.jobs
            .write()
            .await
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }
}

pub async fn mark_running(
    store: &dyn JobStore,
    job_id: &str,
    worker_pid: Option<u32>,
) -> anyhow::Result<()> {
    let mut job = store
        .get(job_id)
        .await
        .context("load job")?
        .ok_or_else(|| anyhow::anyhow!("job not found: {job_id}"))?;
    job.mark_running(worker_pid);
    store.put(&job).await.context("save job")?;
    Ok(())
}

pub async fn record_report(
    store: &dyn JobStore,
    job_id: &str,
    report: &WorkerReport,
) -> anyhow::Result<()> {
    let Some(mut job) = store.get(job_id).await.context("load job")? else {
        anyhow::bail!("job not found: {job_id}");
    };
    job.apply_report(report);
    store.put(&job).await.context("save job")?;
    Ok(())
}

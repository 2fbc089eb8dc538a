use std::sync::Arc;

use anyhow::Context as _;

use crate::config::AppConfig;
use crate::crawl::Crawler;
use crate::formats::{CrawlRequest, CrawlResult, WorkerReport};
use crate::render::EngineLauncher;
use crate::render::chromium::ChromiumLauncher;

/// Runs one crawl on its own browser engine instance.
pub struct CrawlRunner {
    launcher: Arc<dyn EngineLauncher>,
    crawler: Crawler,
}

impl CrawlRunner {
    pub fn new(launcher: Arc<dyn EngineLauncher>, crawler: Crawler) -> Self {
        Self { launcher, crawler }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let crawler = Crawler::from_config(config.crawl.clone())?;
        let launcher = ChromiumLauncher::from_config(config);
        Ok(Self::new(Arc::new(launcher), crawler))
    }

    pub async fn run(&self, request: CrawlRequest) -> anyhow::Result<CrawlResult> {
        request.validate()?;

        let engine = self.launcher.launch().await.context("launch browser")?;
        let result = self.crawler.crawl(engine.as_ref(), request).await;
        if let Err(err) = engine.close().await {
            tracing::warn!(?err, "close browser failed");
        }
        result
    }

    pub async fn report(&self, request: CrawlRequest) -> WorkerReport {
        match self.run(request).await {
            Ok(books) => {
                tracing::info!(
                    page = request.page_num,
                    total = books.len(),
                    "crawl done"
                );
                WorkerReport::Done { total: books.len() }
            }
            Err(err) => {
                tracing::error!(page = request.page_num, ?err, "crawl failed");
                WorkerReport::Error {
                    error: format!("{err:#}"),
                }
            }
        }
    }

    /// Like [`Self::report`], but a panic inside the crawl becomes an error
    /// report instead of unwinding into the caller.
    pub async fn report_isolated(self: &Arc<Self>, request: CrawlRequest) -> WorkerReport {
        let runner = Arc::clone(self);
        match tokio::spawn(async move { runner.report(request).await }).await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(?err, "crawl task aborted");
                WorkerReport::Error {
                    error: format!("crawl task aborted: {err}"),
                }
            }
        }
    }
}

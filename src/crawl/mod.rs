//! Three-level crawl: catalog page → books → chapters.
//!
//! Each level works in fixed-size batches: a batch's items run concurrently on
//! the current task, the whole batch is awaited, then the next one starts.
//! Results are written back by position, so output order never depends on
//! completion order.

pub mod catalog;
pub mod chapters;
pub mod detail;

use std::sync::Arc;

use anyhow::Context as _;
use futures::future::join_all;

use crate::config::CrawlConfig;
use crate::formats::{BookStub, CrawlRequest, CrawlResult, FetchState};
use crate::render::{BrowserEngine, BrowsingContext, RenderOptions};
use crate::site::{SiteProfile, WriterWorking};

/// Everything a resolver needs for one crawl: the shared browsing context,
/// the site markup and the tunables.
#[derive(Clone, Copy)]
pub struct CrawlScope<'a> {
    pub context: &'a dyn BrowsingContext,
    pub site: &'a dyn SiteProfile,
    pub config: &'a CrawlConfig,
}

impl CrawlScope<'_> {
    pub fn page_options(&self) -> RenderOptions {
        RenderOptions {
            timeout: self.config.navigation_timeout(),
            block_resources: false,
        }
    }

    pub fn chapter_options(&self) -> RenderOptions {
        RenderOptions {
            timeout: self.config.navigation_timeout(),
            block_resources: self.config.block_assets,
        }
    }
}

pub struct Crawler {
    config: CrawlConfig,
    site: Arc<dyn SiteProfile>,
}

impl Crawler {
    pub fn new(config: CrawlConfig, site: Arc<dyn SiteProfile>) -> Self {
        Self { config, site }
    }

    /// Crawler for the default catalog site at `config.base_url`.
    pub fn from_config(config: CrawlConfig) -> anyhow::Result<Self> {
        config.validate().context("validate crawl config")?;
        let site = WriterWorking::from_config(&config)?;
        Ok(Self::new(config, Arc::new(site)))
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawls one catalog page inside a fresh browsing context, closing the
    /// context afterwards whatever the outcome.
    pub async fn crawl(
        &self,
        engine: &dyn BrowserEngine,
        request: CrawlRequest,
    ) -> anyhow::Result<CrawlResult> {
        let context = engine
            .new_context()
            .await
            .context("open browsing context")?;

        let result = self.crawl_in(context.as_ref(), request).await;

        if let Err(err) = context.close().await {
            tracing::warn!(?err, "close browsing context failed");
        }
        result
    }

    /// Resolves the catalog page and enriches its books. Only a catalog-page
    /// failure is returned as an error.
    pub async fn crawl_in(
        &self,
        context: &dyn BrowsingContext,
        request: CrawlRequest,
    ) -> anyhow::Result<CrawlResult> {
        let scope = CrawlScope {
            context,
            site: self.site.as_ref(),
            config: &self.config,
        };

        let mut books = catalog::resolve_catalog(scope, request.page_num)
            .await
            .with_context(|| format!("resolve catalog page {}", request.page_num))?;
        tracing::info!(
            page = request.page_num,
            books = books.len(),
            "catalog page resolved"
        );

        let cap = self.config.max_book_tabs.max(1);
        for (index, batch) in books.chunks_mut(cap).enumerate() {
            tracing::debug!(batch = index, size = batch.len(), "enriching books");
            join_all(
                batch
                    .iter_mut()
                    .map(|book| enrich_book(scope, book, request.num_chapters)),
            )
            .await;
        }

        tracing::info!(
            page = request.page_num,
            books = books.len(),
            "catalog page crawled"
        );
        Ok(books)
    }
}

async fn enrich_book(scope: CrawlScope<'_>, book: &mut BookStub, num_chapters: usize) {
    let (Some(url), Some(book_id)) = (book.url.clone(), book.book_id.clone()) else {
        tracing::debug!(title = %book.title, "book has no id; passing through");
        book.detail = FetchState::Skipped;
        book.chapter_list = FetchState::Skipped;
        return;
    };

    let (detail, state) = detail::resolve_detail(scope, &url).await.into_parts();
    book.author = Some(detail.author);
    book.genres = detail.genre.into_iter().collect();
    book.detail = state;

    let (chapters, state) = chapters::resolve_chapters(scope, &book_id, num_chapters).await;
    book.chapters = chapters;
    book.chapter_list = state;
}

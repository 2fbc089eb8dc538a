//! Site-specific page extraction.
//!
//! A [`SiteProfile`] knows the target site's URLs and markup: it produces an
//! [`Extraction`] (URL + in-page script + arguments) for each page kind and
//! turns the script's raw JSON output into typed records. The crawl modules
//! only ever talk to this trait.

pub mod writerworking;

use url::Url;

use crate::formats::{BookDetail, BookStub, Chapter, ChapterText};

pub use writerworking::WriterWorking;

/// One page to render and the script to run against its DOM.
///
/// `script` is a JS function expression taking a single JSON argument; it
/// must not close over anything outside the page.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub url: String,
    pub script: &'static str,
    pub args: serde_json::Value,
}

pub trait SiteProfile: Send + Sync {
    fn base_url(&self) -> &Url;

    fn catalog_page(&self, page_num: u32) -> anyhow::Result<Extraction>;
    fn parse_catalog_page(&self, raw: serde_json::Value) -> anyhow::Result<Vec<BookStub>>;

    fn book_detail(&self, book_url: &str) -> Extraction;
    fn parse_book_detail(&self, raw: serde_json::Value) -> anyhow::Result<BookDetail>;

    fn chapter_list(&self, book_id: &str, limit: usize) -> anyhow::Result<Extraction>;
    /// Returns at most `limit` chapters in list order, content still pending.
    fn parse_chapter_list(
        &self,
        raw: serde_json::Value,
        limit: usize,
    ) -> anyhow::Result<Vec<Chapter>>;

    fn chapter(&self, chapter_url: &str) -> Extraction;
    fn parse_chapter(&self, raw: serde_json::Value) -> anyhow::Result<ChapterText>;
}

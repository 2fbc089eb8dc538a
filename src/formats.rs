use serde::{Deserialize, Serialize};

/// Outcome of a best-effort fetch for one chapter or one book detail page.
///
/// An empty `content` with `Fetched` means the page loaded but had nothing to
/// extract; `Failed` means navigation or evaluation broke and the fields were
/// left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchState {
    #[default]
    Pending,
    Fetched,
    Skipped,
    Failed {
        cause: String,
    },
}

impl FetchState {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub url: Option<String>,
    pub content: String,
    pub title: String,
    #[serde(default)]
    pub fetch: FetchState,
}

impl Chapter {
    pub fn pending(url: Option<String>) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStub {
    pub url: Option<String>,
    pub book_id: Option<String>,
    pub title: String,
    pub cover_image: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub genres: Vec<String>,
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub detail: FetchState,
    #[serde(default)]
    pub chapter_list: FetchState,
}

impl BookStub {
    /// Stubs without both a url and a book id are passed through untouched.
    pub fn is_resolvable(&self) -> bool {
        self.url.is_some() && self.book_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDetail {
    pub author: String,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterText {
    pub content: String,
    pub title: String,
}

/// One-shot message handed to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    pub page_num: u32,
    pub num_chapters: usize,
}

impl CrawlRequest {
    pub fn default_page_num() -> u32 {
        1
    }
    pub fn default_num_chapters() -> usize {
        5
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_num < 1 {
            anyhow::bail!("pageNum must be >= 1, got {}", self.page_num);
        }
        Ok(())
    }
}

impl Default for CrawlRequest {
    fn default() -> Self {
        Self {
            page_num: Self::default_page_num(),
            num_chapters: Self::default_num_chapters(),
        }
    }
}

pub type CrawlResult = Vec<BookStub>;

/// Terminal status a worker sends back to the process that launched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReport {
    Done { total: usize },
    Error { error: String },
}

//! Rendering capability consumed by the crawl.
//!
//! An engine hands out browsing contexts (shared cookie/cache scope), a
//! context hands out pages, and a page can navigate and evaluate a script.
//! The Chromium implementation lives in [`chromium`]; tests provide fakes.

pub mod chromium;
pub mod session;

use async_trait::async_trait;

pub use session::{RenderOptions, Rendered, render, render_or_default};

/// Sub-resource categories a page may refuse to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Stylesheet,
    Font,
    Media,
}

impl ResourceKind {
    /// Everything that does not contribute to the text DOM.
    pub const NON_ESSENTIAL: [ResourceKind; 4] = [
        ResourceKind::Image,
        ResourceKind::Stylesheet,
        ResourceKind::Font,
        ResourceKind::Media,
    ];
}

#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserEngine>>;
}

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn new_context(&self) -> anyhow::Result<Box<dyn BrowsingContext>>;
    async fn close(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait BrowsingContext: Send + Sync {
    async fn new_page(&self) -> anyhow::Result<Box<dyn RenderPage>>;
    async fn close(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait RenderPage: Send + Sync {
    /// Abort every subsequent request whose resource kind is in `kinds`.
    async fn block_resources(&self, kinds: &[ResourceKind]) -> anyhow::Result<()>;

    async fn goto(&self, url: &str) -> anyhow::Result<()>;

    /// Calls `script` (a JS function expression) with `args` as its single
    /// argument and returns the JSON result.
    async fn evaluate(
        &self,
        script: &str,
        args: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

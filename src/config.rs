use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::dispatcher::ExecutionMode;

pub const DEFAULT_BASE_URL: &str = "https://www.writerworking.net";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub crawl: CrawlConfig,
    pub browser: BrowserSettings,
    pub server: ServerSettings,
}

/// Tunables for one catalog-page crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    pub base_url: String,
    /// Books enriched concurrently per catalog page.
    pub max_book_tabs: usize,
    /// Chapter pages open concurrently per book.
    pub max_chapter_tabs: usize,
    pub navigation_timeout_secs: u64,
    /// Abort image/stylesheet/font/media requests on chapter pages.
    pub block_assets: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            max_book_tabs: 24,
            max_chapter_tabs: 20,
            navigation_timeout_secs: 180,
            block_assets: true,
        }
    }
}

impl CrawlConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn base_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("parse base url: {}", self.base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("base url must be http/https: {url}");
        }
        Ok(url)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.base_url()?;
        if self.max_book_tabs == 0 {
            anyhow::bail!("max_book_tabs must be >= 1");
        }
        if self.max_chapter_tabs == 0 {
            anyhow::bail!("max_chapter_tabs must be >= 1");
        }
        if self.navigation_timeout_secs == 0 {
            anyhow::bail!("navigation_timeout_secs must be >= 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSettings {
    pub headless: bool,
    /// When false, Chromium runs with `--no-sandbox --disable-setuid-sandbox`.
    pub sandbox: bool,
    pub executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            executable: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub execution_mode: ExecutionMode,
    pub max_workers: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Process,
            max_workers: 4,
        }
    }
}

impl AppConfig {
    /// Reads the optional YAML file, then applies `BOOKCRAWL_*` overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("BOOKCRAWL_BASE_URL") {
            self.crawl.base_url = v;
        }
        if let Some(v) = var("BOOKCRAWL_MAX_BOOK_TABS") {
            self.crawl.max_book_tabs = parse_env("BOOKCRAWL_MAX_BOOK_TABS", &v)?;
        }
        if let Some(v) = var("BOOKCRAWL_MAX_CHAPTER_TABS") {
            self.crawl.max_chapter_tabs = parse_env("BOOKCRAWL_MAX_CHAPTER_TABS", &v)?;
        }
        if let Some(v) = var("BOOKCRAWL_NAVIGATION_TIMEOUT_SECS") {
            self.crawl.navigation_timeout_secs =
                parse_env("BOOKCRAWL_NAVIGATION_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("BOOKCRAWL_BLOCK_ASSETS") {
            self.crawl.block_assets = parse_bool("BOOKCRAWL_BLOCK_ASSETS", &v)?;
        }
        if let Some(v) = var("BOOKCRAWL_HEADLESS") {
            self.browser.headless = parse_bool("BOOKCRAWL_HEADLESS", &v)?;
        }
        if let Some(v) = var("BOOKCRAWL_CHROME") {
            self.browser.executable = Some(PathBuf::from(v));
        }
        if let Some(v) = var("BOOKCRAWL_EXECUTION_MODE") {
            self.server.execution_mode = ExecutionMode::parse(&v).with_context(|| {
                format!("invalid BOOKCRAWL_EXECUTION_MODE={v:?}. expected one of: process, inprocess")
            })?;
        }
        if let Some(v) = var("BOOKCRAWL_MAX_WORKERS") {
            self.server.max_workers = parse_env("BOOKCRAWL_MAX_WORKERS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.crawl.validate().context("crawl config")?;
        if self.server.max_workers == 0 {
            anyhow::bail!("server.max_workers must be >= 1");
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("invalid {key}={raw:?}"))
}

fn parse_bool(key: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid {key}={other:?}: expected a boolean"),
    }
}

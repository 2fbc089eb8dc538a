use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use futures::StreamExt as _;
use tokio::task::JoinHandle;

use crate::config::{AppConfig, BrowserSettings};
use crate::render::{BrowserEngine, BrowsingContext, EngineLauncher, RenderPage, ResourceKind};

/// Slack on top of the navigation timeout for DevTools commands, so a slow
/// page trips the session's own deadline rather than a command timeout.
const COMMAND_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Launches a local Chromium over the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: BrowserSettings,
    navigation_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings, navigation_timeout: Duration) -> Self {
        Self {
            settings,
            navigation_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.browser.clone(), config.crawl.navigation_timeout())
    }

    /// Per-command DevTools timeout. Navigation is a single `Page.navigate`
    /// command, so this must outlast the navigation timeout.
    pub fn request_timeout(&self) -> Duration {
        self.navigation_timeout + COMMAND_TIMEOUT_SLACK
    }

    fn browser_config(&self) -> anyhow::Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder().request_timeout(self.request_timeout());
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if !self.settings.sandbox {
            builder = builder.no_sandbox().arg("--disable-setuid-sandbox");
        }
        if let Some(executable) = &self.settings.executable {
            builder = builder.chrome_executable(executable);
        }
        builder
            .build()
            .map_err(|err| anyhow::anyhow!("build browser config: {err}"))
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserEngine>> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launch chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(?err, "devtools handler error");
                }
            }
        });

        tracing::debug!(
            headless = self.settings.headless,
            request_timeout_secs = self.request_timeout().as_secs(),
            "chromium launched"
        );
        Ok(Box::new(ChromiumEngine {
            browser: Arc::new(browser),
            handler,
        }))
    }
}

pub struct ChromiumEngine {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_context(&self) -> anyhow::Result<Box<dyn BrowsingContext>> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("create browser context")?;
        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            id: created.result.browser_context_id.clone(),
        }))
    }

    async fn close(&self) -> anyhow::Result<()> {
        let closed = self.browser.execute(CloseParams::default()).await;
        self.handler.abort();
        closed.context("close browser")?;
        Ok(())
    }
}

pub struct ChromiumContext {
    browser: Arc<Browser>,
    id: BrowserContextId,
}

#[async_trait]
impl BrowsingContext for ChromiumContext {
    async fn new_page(&self) -> anyhow::Result<Box<dyn RenderPage>> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(|err| anyhow::anyhow!("build target params: {err}"))?;
        let page = self.browser.new_page(target).await.context("create page")?;
        Ok(Box::new(ChromiumPage {
            page,
            interceptor: Mutex::new(None),
        }))
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.browser
            .execute(DisposeBrowserContextParams::new(self.id.clone()))
            .await
            .context("dispose browser context")?;
        Ok(())
    }
}

pub struct ChromiumPage {
    page: Page,
    interceptor: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl RenderPage for ChromiumPage {
    async fn block_resources(&self, kinds: &[ResourceKind]) -> anyhow::Result<()> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .context("listen for paused requests")?;
        self.page
            .execute(
                EnableParams::builder()
                    .patterns(vec![RequestPattern::builder().url_pattern("*").build()])
                    .build(),
            )
            .await
            .context("enable request interception")?;

        let page = self.page.clone();
        let blocked = kinds.to_vec();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request_id = event.request_id.clone();
                let is_blocked =
                    resource_kind(&event.resource_type).is_some_and(|kind| blocked.contains(&kind));
                let outcome = if is_blocked {
                    page.execute(FailRequestParams::new(
                        request_id,
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(request_id))
                        .await
                        .map(|_| ())
                };
                if let Err(err) = outcome {
                    tracing::debug!(?err, "resolve paused request failed");
                }
            }
        });

        if let Ok(mut slot) = self.interceptor.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }
        Ok(())
    }

    /// Navigates with `Page.navigate` and waits for the load event. The
    /// deadline is enforced by the caller.
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        let mut loaded = self
            .page
            .event_listener::<EventLoadEventFired>()
            .await
            .context("listen for load event")?;

        let navigated = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .with_context(|| format!("navigate to {url}"))?;
        if let Some(error) = navigated.result.error_text.as_deref() {
            anyhow::bail!("navigate to {url}: {error}");
        }
        // Same-document navigation: no new load event follows.
        if navigated.result.loader_id.is_none() {
            return Ok(());
        }

        loaded
            .next()
            .await
            .ok_or_else(|| anyhow::anyhow!("page closed before {url} finished loading"))?;
        Ok(())
    }

    async fn evaluate(
        &self,
        script: &str,
        args: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let args = serde_json::to_string(&args).context("serialize script args")?;
        let params = EvaluateParams::builder()
            .expression(format!("({script})({args})"))
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|err| anyhow::anyhow!("build evaluate params: {err}"))?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        let ChromiumPage { page, interceptor } = *self;
        if let Ok(mut slot) = interceptor.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        page.close().await?;
        Ok(())
    }
}

fn resource_kind(resource_type: &ResourceType) -> Option<ResourceKind> {
    match resource_type {
        ResourceType::Image => Some(ResourceKind::Image),
        ResourceType::Stylesheet => Some(ResourceKind::Stylesheet),
        ResourceType::Font => Some(ResourceKind::Font),
        ResourceType::Media => Some(ResourceKind::Media),
        _ => None,
    }
}

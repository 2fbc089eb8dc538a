use std::time::Duration;

use anyhow::Context as _;

use crate::formats::FetchState;
use crate::render::{BrowsingContext, RenderPage, ResourceKind};
use crate::site::Extraction;

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub timeout: Duration,
    pub block_resources: bool,
}

/// Result of a best-effort render: either the parsed data or the cause of
/// the failure, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    Extracted(T),
    Failed(String),
}

impl<T: Default> Rendered<T> {
    /// Splits into the value (default on failure) and its fetch state.
    pub fn into_parts(self) -> (T, FetchState) {
        match self {
            Self::Extracted(value) => (value, FetchState::Fetched),
            Self::Failed(cause) => (T::default(), FetchState::Failed { cause }),
        }
    }
}

/// Opens one page in `context`, navigates, evaluates the extraction script and
/// parses its output. The page is closed on every exit path.
pub async fn render<T, F>(
    context: &dyn BrowsingContext,
    extraction: &Extraction,
    options: RenderOptions,
    parse: F,
) -> anyhow::Result<T>
where
    F: FnOnce(serde_json::Value) -> anyhow::Result<T>,
{
    let page = context
        .new_page()
        .await
        .with_context(|| format!("open page for {}", extraction.url))?;

    let raw = drive(page.as_ref(), extraction, options).await;

    if let Err(err) = page.close().await {
        tracing::debug!(url = %extraction.url, ?err, "close page failed");
    }

    let raw = raw?;
    parse(raw).with_context(|| format!("parse extraction result from {}", extraction.url))
}

/// Like [`render`], but logs and captures any failure instead of returning it.
pub async fn render_or_default<T, F>(
    context: &dyn BrowsingContext,
    extraction: &Extraction,
    options: RenderOptions,
    parse: F,
) -> Rendered<T>
where
    F: FnOnce(serde_json::Value) -> anyhow::Result<T>,
{
    match render(context, extraction, options, parse).await {
        Ok(value) => Rendered::Extracted(value),
        Err(err) => {
            tracing::warn!(url = %extraction.url, err = %format!("{err:#}"), "render failed");
            Rendered::Failed(format!("{err:#}"))
        }
    }
}

async fn drive(
    page: &dyn RenderPage,
    extraction: &Extraction,
    options: RenderOptions,
) -> anyhow::Result<serde_json::Value> {
    if options.block_resources {
        page.block_resources(&ResourceKind::NON_ESSENTIAL)
            .await
            .context("install resource filter")?;
    }

    match tokio::time::timeout(options.timeout, page.goto(&extraction.url)).await {
        Ok(navigated) => {
            navigated.with_context(|| format!("navigate to {}", extraction.url))?;
        }
        Err(_) => anyhow::bail!(
            "navigation to {} timed out after {}s",
            extraction.url,
            options.timeout.as_secs()
        ),
    }

    page.evaluate(extraction.script, extraction.args.clone())
        .await
        .with_context(|| format!("evaluate extraction script on {}", extraction.url))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Clone, Copy)]
    enum Behavior {
        Ok,
        FailGoto,
        HangGoto,
        FailEvaluate,
    }

    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
        blocked: AtomicUsize,
    }

    struct TestContext {
        behavior: Behavior,
        counters: Arc<Counters>,
    }

    struct TestPage {
        behavior: Behavior,
        counters: Arc<Counters>,
    }

    impl TestContext {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                counters: Arc::new(Counters {
                    opened: AtomicUsize::new(0),
                    closed: AtomicUsize::new(0),
                    blocked: AtomicUsize::new(0),
                }),
            }
        }
    }

    #[async_trait]
    impl BrowsingContext for TestContext {
        async fn new_page(&self) -> anyhow::Result<Box<dyn RenderPage>> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TestPage {
                behavior: self.behavior,
                counters: Arc::clone(&self.counters),
            }))
        }

        async fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl RenderPage for TestPage {
        async fn block_resources(&self, kinds: &[ResourceKind]) -> anyhow::Result<()> {
            assert_eq!(kinds, ResourceKind::NON_ESSENTIAL);
            self.counters.blocked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn goto(&self, _url: &str) -> anyhow::Result<()> {
            match self.behavior {
                Behavior::FailGoto => anyhow::bail!("net::ERR_NAME_NOT_RESOLVED"),
                Behavior::HangGoto => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
                _ => Ok(()),
            }
        }

        async fn evaluate(
            &self,
            _script: &str,
            args: serde_json::Value,
        ) -> anyhow::Result<serde_json::Value> {
            match self.behavior {
                Behavior::FailEvaluate => anyhow::bail!("Cannot read properties of null"),
                _ => Ok(json!({ "echo": args })),
            }
        }

        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn extraction() -> Extraction {
        Extraction {
            url: "https://example.com/page".to_owned(),
            script: "() => null",
            args: json!({ "limit": 3 }),
        }
    }

    fn options(block_resources: bool) -> RenderOptions {
        RenderOptions {
            timeout: Duration::from_secs(5),
            block_resources,
        }
    }

    #[tokio::test]
    async fn render_returns_parsed_value_and_closes_page() -> anyhow::Result<()> {
        let context = TestContext::new(Behavior::Ok);
        let value = render(&context, &extraction(), options(true), |raw| {
            Ok(raw["echo"]["limit"].as_u64())
        })
        .await?;

        assert_eq!(value, Some(3));
        assert_eq!(context.counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(context.counters.closed.load(Ordering::SeqCst), 1);
        assert_eq!(context.counters.blocked.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn resource_filter_is_opt_in() -> anyhow::Result<()> {
        let context = TestContext::new(Behavior::Ok);
        render(&context, &extraction(), options(false), |_| Ok(())).await?;
        assert_eq!(context.counters.blocked.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn page_closed_on_every_failure_path() {
        for behavior in [Behavior::FailGoto, Behavior::FailEvaluate] {
            let context = TestContext::new(behavior);
            let result = render(&context, &extraction(), options(false), |_| Ok(())).await;
            assert!(result.is_err());
            assert_eq!(context.counters.closed.load(Ordering::SeqCst), 1);
        }

        let context = TestContext::new(Behavior::Ok);
        let result: anyhow::Result<()> = render(&context, &extraction(), options(false), |_| {
            anyhow::bail!("unexpected shape")
        })
        .await;
        assert!(result.is_err());
        assert_eq!(context.counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_timeout_is_a_failure() {
        let context = TestContext::new(Behavior::HangGoto);
        let rendered = render_or_default(&context, &extraction(), options(false), |_| Ok(())).await;

        let Rendered::Failed(cause) = rendered else {
            panic!("expected failure");
        };
        assert!(cause.contains("timed out after 5s"), "{cause}");
        assert_eq!(context.counters.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn into_parts_distinguishes_failure_from_empty() {
        let (value, state) = Rendered::Extracted(String::new()).into_parts();
        assert_eq!(value, "");
        assert_eq!(state, FetchState::Fetched);

        let (value, state) = Rendered::<String>::Failed("boom".to_owned()).into_parts();
        assert_eq!(value, "");
        assert!(state.is_failed());
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bookcrawl::render::{BrowserEngine, BrowsingContext, EngineLauncher, RenderPage, ResourceKind};
use serde_json::{Value, json};

pub const BASE_URL: &str = "https://www.writerworking.net";

#[derive(Debug, Clone)]
enum Canned {
    Json(Value),
    Fail(String),
}

#[derive(Debug, Default)]
struct State {
    pages: HashMap<String, Canned>,
    visits: Vec<String>,
    blocked: Vec<String>,
    open: HashMap<String, usize>,
    peak: HashMap<String, usize>,
    contexts_opened: usize,
    contexts_closed: usize,
    engines_closed: usize,
}

/// Canned site served to the crawl through fake browser pages.
///
/// Every navigation sleeps briefly so that concurrently driven pages overlap,
/// and the number of simultaneously open pages is tracked per page kind and
/// per book.
#[derive(Debug, Clone, Default)]
pub struct FakeWeb {
    state: Arc<Mutex<State>>,
    latency: Duration,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            latency: Duration::from_millis(5),
        }
    }

    pub fn page(&self, url: impl Into<String>, raw: Value) -> &Self {
        self.lock().pages.insert(url.into(), Canned::Json(raw));
        self
    }

    pub fn fail(&self, url: impl Into<String>, cause: &str) -> &Self {
        self.lock()
            .pages
            .insert(url.into(), Canned::Fail(cause.to_owned()));
        self
    }

    pub fn launcher(&self) -> Arc<dyn EngineLauncher> {
        Arc::new(FakeLauncher(self.clone()))
    }

    pub fn visits(&self) -> Vec<String> {
        self.lock().visits.clone()
    }

    pub fn blocked(&self) -> Vec<String> {
        self.lock().blocked.clone()
    }

    /// Highest number of pages open at once under `gauge`: `"all"`, a page
    /// kind (`"catalog"`, `"detail"`, `"list"`, `"chapter"`) or
    /// `"chapter:<book id>"`.
    pub fn peak(&self, gauge: &str) -> usize {
        self.lock().peak.get(gauge).copied().unwrap_or(0)
    }

    pub fn open_pages(&self) -> usize {
        self.lock().open.get("all").copied().unwrap_or(0)
    }

    pub fn contexts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.contexts_opened, state.contexts_closed)
    }

    pub fn engines_closed(&self) -> usize {
        self.lock().engines_closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake web state lock")
    }

    fn enter(&self, url: &str, blocked: bool) -> Option<Canned> {
        let mut state = self.lock();
        state.visits.push(url.to_owned());
        if blocked {
            state.blocked.push(url.to_owned());
        }
        for gauge in gauges(url) {
            let open = state.open.entry(gauge.clone()).or_default();
            *open += 1;
            let now = *open;
            let peak = state.peak.entry(gauge).or_default();
            *peak = (*peak).max(now);
        }
        state.pages.get(url).cloned()
    }

    fn leave(&self, url: &str) {
        let mut state = self.lock();
        for gauge in gauges(url) {
            if let Some(open) = state.open.get_mut(&gauge) {
                *open = open.saturating_sub(1);
            }
        }
    }
}

fn gauges(url: &str) -> Vec<String> {
    let path = url.strip_prefix(BASE_URL).unwrap_or(url);
    let mut gauges = vec!["all".to_owned()];
    if path.starts_with("/ben/all/") {
        gauges.push("catalog".to_owned());
    } else if path.starts_with("/kanshu/") {
        gauges.push("detail".to_owned());
    } else if let Some(rest) = path.strip_prefix("/xs/") {
        let book_id = rest.split('/').next().unwrap_or_default();
        if path.ends_with(".html") {
            gauges.push("chapter".to_owned());
            gauges.push(format!("chapter:{book_id}"));
        } else {
            gauges.push("list".to_owned());
        }
    }
    gauges
}

pub struct FakeLauncher(FakeWeb);

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserEngine>> {
        Ok(Box::new(FakeEngine(self.0.clone())))
    }
}

pub struct FakeEngine(pub FakeWeb);

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn new_context(&self) -> anyhow::Result<Box<dyn BrowsingContext>> {
        self.0.lock().contexts_opened += 1;
        Ok(Box::new(FakeContext(self.0.clone())))
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.0.lock().engines_closed += 1;
        Ok(())
    }
}

struct FakeContext(FakeWeb);

#[async_trait]
impl BrowsingContext for FakeContext {
    async fn new_page(&self) -> anyhow::Result<Box<dyn RenderPage>> {
        Ok(Box::new(FakePage {
            web: self.0.clone(),
            blocking: Mutex::new(false),
            current: Mutex::new(None),
        }))
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.0.lock().contexts_closed += 1;
        Ok(())
    }
}

struct FakePage {
    web: FakeWeb,
    blocking: Mutex<bool>,
    current: Mutex<Option<(String, Option<Canned>)>>,
}

#[async_trait]
impl RenderPage for FakePage {
    async fn block_resources(&self, kinds: &[ResourceKind]) -> anyhow::Result<()> {
        *self.blocking.lock().expect("blocking lock") = !kinds.is_empty();
        Ok(())
    }

    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        let blocking = *self.blocking.lock().expect("blocking lock");
        let canned = self.web.enter(url, blocking);
        *self.current.lock().expect("current lock") = Some((url.to_owned(), canned.clone()));

        tokio::time::sleep(self.web.latency).await;
        match canned {
            Some(Canned::Json(_)) => Ok(()),
            Some(Canned::Fail(cause)) => anyhow::bail!("{cause}"),
            None => anyhow::bail!("net::ERR_NAME_NOT_RESOLVED at {url}"),
        }
    }

    async fn evaluate(&self, _script: &str, _args: Value) -> anyhow::Result<Value> {
        match self.current.lock().expect("current lock").as_ref() {
            Some((_, Some(Canned::Json(raw)))) => Ok(raw.clone()),
            _ => anyhow::bail!("evaluate on a page that did not load"),
        }
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        if let Some((url, _)) = self.current.lock().expect("current lock").take() {
            self.web.leave(&url);
        }
        Ok(())
    }
}

pub fn catalog_url(page: u32) -> String {
    format!("{BASE_URL}/ben/all/{page}/")
}

pub fn book_url(book_id: &str) -> String {
    format!("{BASE_URL}/kanshu/{book_id}/")
}

pub fn chapter_list_url(book_id: &str) -> String {
    format!("{BASE_URL}/xs/{book_id}/1/")
}

pub fn chapter_url(book_id: &str, index: usize) -> String {
    format!("{BASE_URL}/xs/{book_id}/{}.html", 5000 + index)
}

/// Catalog page `page` listing `book_ids` in order, plus one sidebar entry
/// that must never be crawled.
pub fn serve_catalog(web: &FakeWeb, page: u32, book_ids: &[&str]) {
    let mut listings: Vec<Value> = book_ids
        .iter()
        .map(|id| {
            json!({
                "href": format!("/kanshu/{id}/"),
                "titleAttr": format!("Book {id}"),
                "text": format!("Book {id}"),
                "dataSrc": format!("https://img.example/{id}.jpg"),
                "src": null,
                "description": format!("About book {id}."),
            })
        })
        .collect();
    listings.insert(
        1,
        json!({
            "sidebar": true,
            "href": "/kanshu/999/",
            "titleAttr": "Sidebar pick",
            "text": "Sidebar pick",
            "dataSrc": null,
            "src": null,
            "description": null,
        }),
    );
    web.page(catalog_url(page), Value::Array(listings));
}

/// Detail page, table of contents and `chapters` chapter pages for one book.
pub fn serve_book(web: &FakeWeb, book_id: &str, chapters: usize) {
    web.page(
        book_url(book_id),
        json!({
            "author": format!(" Author {book_id} "),
            "crumbs": ["Home", "Fantasy", format!("Book {book_id}")],
        }),
    );

    let links: Vec<Value> = (0..chapters)
        .map(|i| {
            let path = chapter_url(book_id, i).replace(BASE_URL, "").replace('/', "\\/");
            json!({ "onclick": format!("location.href='{path}'") })
        })
        .collect();
    web.page(chapter_list_url(book_id), Value::Array(links));

    for i in 0..chapters {
        web.page(
            chapter_url(book_id, i),
            json!({
                "paragraphs": [format!("Book {book_id} chapter {i}."), "  ", "The end."],
                "heading": format!("Chapter {i} (free)"),
                "documentTitle": "ignored",
            }),
        );
    }
}

use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::CrawlConfig;
use crate::formats::{BookDetail, BookStub, Chapter, ChapterText};
use crate::site::{Extraction, SiteProfile};

const AUTHOR_LABEL: &str = "作者：";

static BOOK_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/kanshu/(\d+)/").expect("book id pattern is valid")
});
static ONCLICK_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"location\.href='(.*?)'").expect("onclick pattern is valid")
});
static TITLE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*[(（][^()（）]*[)）]\s*$").expect("title suffix pattern is valid")
});

const CATALOG_SCRIPT: &str = r#"() => Array.from(document.querySelectorAll("dl")).map((dl) => {
  const a = dl.querySelector("dt a");
  const img = dl.querySelector("a.cover img");
  const dd = dl.querySelector("dd");
  return {
    sidebar: !!dl.closest("div.right.hidden-xs"),
    href: a ? a.getAttribute("href") : null,
    titleAttr: a ? a.title : null,
    text: a ? a.innerText : null,
    dataSrc: img ? img.getAttribute("data-src") : null,
    src: img ? img.getAttribute("src") : null,
    description: dd ? dd.innerText : null,
  };
})"#;

const DETAIL_SCRIPT: &str = r#"(args) => {
  const label = Array.from(document.querySelectorAll("p")).find((p) => {
    const b = p.querySelector("b");
    return b && b.innerText.trim() === args.authorLabel;
  });
  const link = label ? label.querySelector("a") : null;
  const ol = document.querySelector("ol.container");
  return {
    author: link ? link.innerText : null,
    crumbs: ol ? Array.from(ol.querySelectorAll("li")).map((li) => li.innerText) : [],
  };
}"#;

const CHAPTER_LIST_SCRIPT: &str = r#"(args) => Array.from(document.querySelectorAll("div.all ul li"))
  .map((li) => li.querySelector("a"))
  .filter((a) => a)
  .slice(0, args.limit)
  .map((a) => ({ onclick: a.getAttribute("onclick") }))"#;

const CHAPTER_SCRIPT: &str = r##"() => {
  const container = document.querySelector("#booktxthtml");
  const h1 = document.querySelector("h1");
  return {
    paragraphs: container ? Array.from(container.querySelectorAll("p")).map((p) => p.innerText) : null,
    heading: h1 ? h1.innerText : null,
    documentTitle: document.title || "",
  };
}"##;

/// Markup of the writerworking.net catalog.
#[derive(Debug, Clone)]
pub struct WriterWorking {
    base_url: Url,
}

impl WriterWorking {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn from_config(config: &CrawlConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.base_url()?))
    }

    fn absolute(&self, path: &str) -> Option<String> {
        self.base_url.join(path.trim()).ok().map(String::from)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
    #[serde(default)]
    sidebar: bool,
    href: Option<String>,
    title_attr: Option<String>,
    text: Option<String>,
    data_src: Option<String>,
    src: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDetail {
    author: Option<String>,
    #[serde(default)]
    crumbs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawChapterLink {
    onclick: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChapter {
    paragraphs: Option<Vec<String>>,
    heading: Option<String>,
    #[serde(default)]
    document_title: String,
}

impl SiteProfile for WriterWorking {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn catalog_page(&self, page_num: u32) -> anyhow::Result<Extraction> {
        let url = self
            .base_url
            .join(&format!("/ben/all/{page_num}/"))
            .context("build catalog url")?;
        Ok(Extraction {
            url: url.into(),
            script: CATALOG_SCRIPT,
            args: serde_json::Value::Null,
        })
    }

    fn parse_catalog_page(&self, raw: serde_json::Value) -> anyhow::Result<Vec<BookStub>> {
        let listings: Vec<RawListing> =
            serde_json::from_value(raw).context("decode catalog listing")?;

        Ok(listings
            .into_iter()
            .filter(|listing| !listing.sidebar)
            .map(|listing| {
                let href = listing.href.as_deref().unwrap_or_default();
                BookStub {
                    url: listing.href.as_deref().and_then(|href| self.absolute(href)),
                    book_id: book_id_from_href(href),
                    title: first_non_empty([listing.title_attr, listing.text]).unwrap_or_default(),
                    cover_image: first_non_empty([listing.data_src, listing.src]),
                    description: listing.description.unwrap_or_default().trim().to_owned(),
                    ..BookStub::default()
                }
            })
            .collect())
    }

    fn book_detail(&self, book_url: &str) -> Extraction {
        Extraction {
            url: book_url.to_owned(),
            script: DETAIL_SCRIPT,
            args: json!({ "authorLabel": AUTHOR_LABEL }),
        }
    }

    fn parse_book_detail(&self, raw: serde_json::Value) -> anyhow::Result<BookDetail> {
        let detail: RawDetail = serde_json::from_value(raw).context("decode book detail")?;
        Ok(BookDetail {
            author: detail.author.unwrap_or_default().trim().to_owned(),
            genre: detail
                .crumbs
                .get(1)
                .map(|genre| genre.trim().to_owned())
                .filter(|genre| !genre.is_empty()),
        })
    }

    fn chapter_list(&self, book_id: &str, limit: usize) -> anyhow::Result<Extraction> {
        let url = self
            .base_url
            .join(&format!("/xs/{book_id}/1/"))
            .with_context(|| format!("build chapter list url for book {book_id}"))?;
        Ok(Extraction {
            url: url.into(),
            script: CHAPTER_LIST_SCRIPT,
            args: json!({ "limit": limit }),
        })
    }

    fn parse_chapter_list(
        &self,
        raw: serde_json::Value,
        limit: usize,
    ) -> anyhow::Result<Vec<Chapter>> {
        let links: Vec<Option<RawChapterLink>> =
            serde_json::from_value(raw).context("decode chapter list")?;

        Ok(links
            .into_iter()
            .flatten()
            .take(limit)
            .map(|link| {
                let url = link
                    .onclick
                    .as_deref()
                    .and_then(onclick_target)
                    .and_then(|path| self.absolute(&path));
                Chapter::pending(url)
            })
            .collect())
    }

    fn chapter(&self, chapter_url: &str) -> Extraction {
        Extraction {
            url: chapter_url.to_owned(),
            script: CHAPTER_SCRIPT,
            args: serde_json::Value::Null,
        }
    }

    fn parse_chapter(&self, raw: serde_json::Value) -> anyhow::Result<ChapterText> {
        let chapter: RawChapter = serde_json::from_value(raw).context("decode chapter")?;

        let content = chapter
            .paragraphs
            .unwrap_or_default()
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let title = match chapter.heading {
            Some(heading) => heading,
            None => chapter.document_title,
        };

        Ok(ChapterText {
            content,
            title: strip_title_suffix(&title),
        })
    }
}

pub fn book_id_from_href(href: &str) -> Option<String> {
    BOOK_ID
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Extracts the path from `location.href='...'`, dropping escaping backslashes.
pub fn onclick_target(onclick: &str) -> Option<String> {
    let path = ONCLICK_TARGET.captures(onclick)?.get(1)?.as_str().replace('\\', "");
    if path.trim().is_empty() {
        return None;
    }
    Some(path)
}

/// `"Chapter One (完)"` and `"Chapter One（完）"` both become `"Chapter One"`.
pub fn strip_title_suffix(title: &str) -> String {
    TITLE_SUFFIX.replace(title.trim(), "").trim().to_owned()
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
}

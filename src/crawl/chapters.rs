use futures::future::join_all;

use crate::crawl::CrawlScope;
use crate::formats::{Chapter, ChapterText, FetchState};
use crate::render::{self, Rendered};

/// Fetches one chapter's title and body text.
pub async fn extract_chapter(scope: CrawlScope<'_>, chapter_url: &str) -> Rendered<ChapterText> {
    let extraction = scope.site.chapter(chapter_url);
    render::render_or_default(scope.context, &extraction, scope.chapter_options(), |raw| {
        scope.site.parse_chapter(raw)
    })
    .await
}

/// Resolves the first `num_chapters` chapters of a book and fills in their
/// text, at most `max_chapter_tabs` pages at a time.
///
/// A table of contents that fails to load yields no chapters and a failed
/// state; individual chapter failures leave that chapter empty in place.
pub async fn resolve_chapters(
    scope: CrawlScope<'_>,
    book_id: &str,
    num_chapters: usize,
) -> (Vec<Chapter>, FetchState) {
    let listed = match scope.site.chapter_list(book_id, num_chapters) {
        Ok(extraction) => {
            render::render_or_default(scope.context, &extraction, scope.page_options(), |raw| {
                scope.site.parse_chapter_list(raw, num_chapters)
            })
            .await
        }
        Err(err) => Rendered::Failed(format!("{err:#}")),
    };

    let (mut chapters, state) = listed.into_parts();
    if state.is_failed() {
        tracing::warn!(book_id, "chapter list unavailable");
        return (Vec::new(), state);
    }

    let cap = scope.config.max_chapter_tabs.max(1);
    for batch in chapters.chunks_mut(cap) {
        join_all(batch.iter_mut().map(|chapter| fill_chapter(scope, chapter))).await;
    }

    tracing::debug!(book_id, chapters = chapters.len(), "chapters resolved");
    (chapters, state)
}

async fn fill_chapter(scope: CrawlScope<'_>, chapter: &mut Chapter) {
    let Some(url) = chapter.url.clone() else {
        chapter.fetch = FetchState::Skipped;
        return;
    };

    let (text, state) = extract_chapter(scope, &url).await.into_parts();
    chapter.content = text.content;
    chapter.title = text.title;
    chapter.fetch = state;
}

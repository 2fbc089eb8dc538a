use crate::crawl::CrawlScope;
use crate::formats::BookDetail;
use crate::render::{self, Rendered};

pub async fn resolve_detail(scope: CrawlScope<'_>, book_url: &str) -> Rendered<BookDetail> {
    let extraction = scope.site.book_detail(book_url);
    render::render_or_default(scope.context, &extraction, scope.page_options(), |raw| {
        scope.site.parse_book_detail(raw)
    })
    .await
}

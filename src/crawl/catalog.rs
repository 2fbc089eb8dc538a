use crate::crawl::CrawlScope;
use crate::formats::BookStub;
use crate::render;

/// Lists the book stubs of one catalog page in page order.
///
/// Navigation or extraction failures are returned: without the listing there
/// is nothing to crawl.
pub async fn resolve_catalog(scope: CrawlScope<'_>, page_num: u32) -> anyhow::Result<Vec<BookStub>> {
    let extraction = scope.site.catalog_page(page_num)?;
    tracing::debug!(url = %extraction.url, "resolving catalog page");

    render::render(scope.context, &extraction, scope.page_options(), |raw| {
        scope.site.parse_catalog_page(raw)
    })
    .await
}

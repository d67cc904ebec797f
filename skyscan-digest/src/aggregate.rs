//! Pagination-until-enough.
//!
//! The upstream cannot filter by engagement, so enough raw volume has to be
//! scanned client-side; `max_scan` bounds latency and upstream load.
use anyhow::Result;
use skyscan_social::bluesky::{PostSearch, PostView, SearchPageRequest};

/// Largest page requested from the upstream.
pub const PAGE_SIZE: usize = 25;

/// Fetch pages sequentially until `max_scan` posts were collected, a page
/// comes back empty, or the upstream stops returning a cursor.
///
/// Posts are returned in upstream order (latest first). The first failing
/// page aborts the whole scan and discards what was collected.
pub async fn collect_posts<S>(source: &S, query: &str, max_scan: usize) -> Result<Vec<PostView>>
where
    S: PostSearch + ?Sized,
{
    let mut out: Vec<PostView> = Vec::with_capacity(max_scan.min(PAGE_SIZE * 4));
    let mut cursor: Option<String> = None;
    let mut page_idx = 0usize;

    while out.len() < max_scan {
        let want = PAGE_SIZE.min(max_scan - out.len());
        let page = source
            .search_page(SearchPageRequest {
                query,
                limit: want as u32,
                cursor: cursor.as_deref(),
            })
            .await?;

        let batch = page.posts.len();
        tracing::debug!(
            target: "digest.aggregate",
            page = page_idx,
            requested = want,
            batch,
            has_cursor = page.cursor.is_some(),
            total = out.len() + batch,
            "aggregate.page"
        );

        if batch == 0 {
            break;
        }
        out.extend(page.posts);
        page_idx += 1;

        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    // Some servers ignore `limit`; never hand back more than was asked for.
    out.truncate(max_scan);
    tracing::info!(
        target: "digest.aggregate",
        query,
        pages = page_idx,
        scanned = out.len(),
        max_scan,
        "aggregate.done"
    );
    Ok(out)
}

//! Traits the aggregation pipeline is written against.
use super::types::PostView;
use async_trait::async_trait;

/// One page request against a cursor-paginated search.
#[derive(Debug, Clone, Copy)]
pub struct SearchPageRequest<'a> {
    pub query: &'a str,
    pub limit: u32,
    /// Continuation token from the previous page; `None` for the first page.
    pub cursor: Option<&'a str>,
}

/// Items of one page plus the cursor for the next, if any.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub posts: Vec<PostView>,
    pub cursor: Option<String>,
}

/// A session able to page through post search results, most recent first.
#[async_trait]
pub trait PostSearch: Send + Sync {
    async fn search_page(&self, req: SearchPageRequest<'_>) -> anyhow::Result<SearchPage>;
}

/// Establishes a fresh authenticated search session.
#[async_trait]
pub trait Authenticator: Send + Sync {
    type Session: PostSearch;

    async fn authenticate(&self, identifier: &str, password: &str)
    -> anyhow::Result<Self::Session>;
}

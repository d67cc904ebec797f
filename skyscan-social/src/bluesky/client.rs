//! Thin wrapper around the Bluesky XRPC endpoints skyscan needs.
//!
//! [`BlueskyApi`] logs in with an identifier + app password and hands back a
//! [`BlueskySession`] carrying the access token. Sessions are meant to live for
//! one search request; refresh tokens are never used.
use super::search::{Authenticator, PostSearch, SearchPage, SearchPageRequest};
use super::types::{CreateSessionRequest, SearchPostsResponse, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use skyscan_http::{Auth, HttpClient, RequestOpts};
use std::borrow::Cow;
use std::time::{Duration, Instant};

const CREATE_SESSION: &str = "xrpc/com.atproto.server.createSession";
const SEARCH_POSTS: &str = "xrpc/app.bsky.feed.searchPosts";
const SORT_LATEST: &str = "latest";

/// Upper bound the AppView accepts for `limit`.
pub const MAX_SEARCH_LIMIT: u32 = 100;

#[derive(Clone, Debug)]
pub struct BlueskyApi {
    http: HttpClient,
}

impl BlueskyApi {
    pub fn new(service: &str) -> Result<Self> {
        let http = HttpClient::new(service)
            .with_context(|| format!("invalid bluesky service url: {service}"))?;
        Ok(Self { http })
    }

    /// Deadline for every call made by this client and its sessions.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.http = self.http.with_timeout(dur);
        self
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<BlueskySession> {
        let started = Instant::now();
        let body = CreateSessionRequest {
            identifier,
            password,
        };
        let session: Session = match self
            .http
            .post_json(CREATE_SESSION, &body, RequestOpts::default())
            .await
        {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    target: "social.bluesky",
                    identifier,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "bluesky.login.error"
                );
                return Err(anyhow::Error::new(e)).context("bluesky login failed");
            }
        };

        tracing::info!(
            target: "social.bluesky",
            handle = %session.handle,
            did = %session.did,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bluesky.login.success"
        );
        Ok(BlueskySession {
            http: self.http.clone(),
            session,
        })
    }
}

#[async_trait]
impl Authenticator for BlueskyApi {
    type Session = BlueskySession;

    async fn authenticate(&self, identifier: &str, password: &str) -> Result<BlueskySession> {
        self.login(identifier, password).await
    }
}

/// An authenticated handle scoped to a single request.
#[derive(Clone, Debug)]
pub struct BlueskySession {
    http: HttpClient,
    session: Session,
}

impl BlueskySession {
    pub fn handle(&self) -> &str {
        &self.session.handle
    }

    pub fn did(&self) -> &str {
        &self.session.did
    }

    /// One call to `app.bsky.feed.searchPosts`.
    pub async fn search_posts(&self, req: SearchPageRequest<'_>) -> Result<SearchPostsResponse> {
        let limit = req.limit.clamp(1, MAX_SEARCH_LIMIT);
        let mut params: Vec<(&str, Cow<'_, str>)> = vec![
            ("q", req.query.into()),
            ("sort", SORT_LATEST.into()),
            ("limit", limit.to_string().into()),
        ];
        if let Some(cursor) = req.cursor {
            params.push(("cursor", cursor.into()));
        }

        let started = Instant::now();
        let resp: SearchPostsResponse = self
            .http
            .get_json(
                SEARCH_POSTS,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.session.access_jwt)),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await
            .map_err(anyhow::Error::new)
            .context("bluesky search request failed")?;

        tracing::debug!(
            target: "social.bluesky",
            query = %req.query,
            limit,
            has_cursor = req.cursor.is_some(),
            returned = resp.posts.len(),
            hits_total = ?resp.hits_total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bluesky.search_posts"
        );
        Ok(resp)
    }
}

#[async_trait]
impl PostSearch for BlueskySession {
    async fn search_page(&self, req: SearchPageRequest<'_>) -> Result<SearchPage> {
        let SearchPostsResponse { posts, cursor, .. } = self.search_posts(req).await?;
        Ok(SearchPage {
            posts,
            // An empty cursor is as final as a missing one.
            cursor: cursor.filter(|c| !c.is_empty()),
        })
    }
}

//! Request boundary: parameter validation, pipeline invocation, JSON envelope.
use crate::aggregate::collect_posts;
use crate::criteria::SearchCriteria;
use crate::rank::filter_and_rank;
use crate::render::{Digest, render_digest};
use serde::{Deserialize, Serialize};
use skyscan_common::{Result, SkyscanError};
use skyscan_config::{BlueskyConfig, Credentials, MissingCredentials, SkyscanConfig};
use skyscan_http::StatusCode;
use skyscan_social::bluesky::{Authenticator, BlueskyApi};
use std::time::Instant;
use time::OffsetDateTime;

/// Raw query parameters, exactly as a caller supplies them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: Option<String>,
    pub hours: Option<String>,
    pub min_reposts: Option<String>,
    pub min_likes: Option<String>,
    pub limit: Option<String>,
}

/// Response body: the digest on success, `{ "error": ... }` otherwise.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Success(Digest),
    Failure { error: String },
}

#[derive(Debug)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub body: Envelope,
}

impl HandlerResponse {
    fn ok(digest: Digest) -> Self {
        Self {
            status: StatusCode::OK,
            body: Envelope::Success(digest),
        }
    }

    fn from_error(err: &SkyscanError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            body: Envelope::Failure {
                error: err.public_message(),
            },
        }
    }
}

/// Turn raw parameters into criteria, applying defaults for absent values.
///
/// Blank values count as absent. Present but malformed numbers are rejected
/// rather than silently replaced. Counts accept any integral number, so
/// `10`, `10.0` and `1e1` are the same value.
pub fn parse_criteria(params: &SearchParams) -> Result<SearchCriteria> {
    let query = present(&params.q)
        .ok_or_else(|| SkyscanError::Validation("Missing query.".into()))?
        .to_string();
    let defaults = SearchCriteria::new(String::new());

    let window_hours = match present(&params.hours) {
        None => defaults.window_hours,
        Some(s) => match s.parse::<f64>() {
            Ok(h) if h.is_finite() && h > 0.0 => h,
            _ => return Err(invalid("hours", "a positive number")),
        },
    };

    let max_scan = parse_count("limit", &params.limit, defaults.max_scan as u64)?;
    let max_scan = usize::try_from(max_scan)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| invalid("limit", "a positive integer"))?;

    Ok(SearchCriteria {
        query,
        window_hours,
        min_reposts: parse_count("minReposts", &params.min_reposts, defaults.min_reposts)?,
        min_likes: parse_count("minLikes", &params.min_likes, defaults.min_likes)?,
        max_scan,
    })
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_count(name: &str, raw: &Option<String>, default: u64) -> Result<u64> {
    let Some(s) = present(raw) else {
        return Ok(default);
    };
    if let Ok(n) = s.parse::<u64>() {
        return Ok(n);
    }
    match s.parse::<f64>() {
        Ok(x) if x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x < u64::MAX as f64 => {
            Ok(x as u64)
        }
        _ => Err(invalid(name, "a non-negative integer")),
    }
}

fn invalid(name: &str, expected: &str) -> SkyscanError {
    SkyscanError::Validation(format!("Invalid '{name}' parameter: expected {expected}."))
}

/// Runs searches for one configured account.
///
/// Credentials are resolved once at construction and never change; a missing
/// pair is only reported when a request arrives.
pub struct SearchHandler<A> {
    credentials: std::result::Result<Credentials, MissingCredentials>,
    authenticator: A,
}

impl SearchHandler<BlueskyApi> {
    /// Handler talking to the configured Bluesky service.
    pub fn from_config(cfg: &SkyscanConfig) -> anyhow::Result<Self> {
        let api = BlueskyApi::new(&cfg.bluesky.service)?.with_timeout(cfg.http.timeout());
        Ok(Self::new(&cfg.bluesky, api))
    }
}

impl<A: Authenticator> SearchHandler<A> {
    pub fn new(config: &BlueskyConfig, authenticator: A) -> Self {
        Self {
            credentials: config.credentials(),
            authenticator,
        }
    }

    /// Full request: never fails, errors become an error envelope.
    pub async fn handle(&self, params: &SearchParams) -> HandlerResponse {
        let started = Instant::now();
        match self.search(params, OffsetDateTime::now_utc()).await {
            Ok(digest) => {
                tracing::info!(
                    count = digest.count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "search.ok"
                );
                HandlerResponse::ok(digest)
            }
            Err(err) => {
                let resp = HandlerResponse::from_error(&err);
                tracing::warn!(
                    status = resp.status.as_u16(),
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "search.failed"
                );
                resp
            }
        }
    }

    /// Authenticate, aggregate, filter/rank and render, with `now` fixing the
    /// time window.
    pub async fn search(&self, params: &SearchParams, now: OffsetDateTime) -> Result<Digest> {
        let creds = self
            .credentials
            .as_ref()
            .map_err(|e| SkyscanError::Config(e.to_string()))?;
        let criteria = parse_criteria(params)?;
        tracing::info!(
            query = %criteria.query,
            window_hours = criteria.window_hours,
            min_reposts = criteria.min_reposts,
            min_likes = criteria.min_likes,
            max_scan = criteria.max_scan,
            "search.start"
        );

        let session = self
            .authenticator
            .authenticate(&creds.identifier, &creds.password)
            .await?;
        let raw = collect_posts(&session, &criteria.query, criteria.max_scan).await?;
        let ranked = filter_and_rank(&raw, &criteria, now);
        Ok(render_digest(ranked))
    }
}

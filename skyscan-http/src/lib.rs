//! Minimal JSON-over-HTTP client with safe logging and a per-call deadline.
//!
//! - Request options: [`Auth`], query params, timeout
//! - Every call carries a deadline; exceeding it yields [`HttpError::Timeout`]
//! - No retries: a failed call is returned to the caller as-is
//! - Redacts secret query params, `Authorization` headers and credential
//!   fields in JSON bodies before anything reaches the logs
//! - Optional *raw* request/response logging via `SKYSCAN_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust,no_run
//! # async fn demo() -> Result<(), skyscan_http::HttpError> {
//! let client = skyscan_http::HttpClient::new("https://bsky.social")?;
//! let got: serde_json::Value = client
//!     .get_json("xrpc/_health", skyscan_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

pub use reqwest::StatusCode;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "SKYSCAN_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const REDACTED: &str = "<redacted>";

/// Query param names whose values never reach the logs.
const SECRET_QUERY_KEYS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "password",
];

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}")]
    Api {
        status: StatusCode,
        /// Machine-readable error name when the server sent one
        /// (e.g. XRPC's `AuthenticationRequired`).
        error: Option<String>,
        message: String,
    },
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the client.
///
/// ```
/// use skyscan_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// assert_eq!(bearer.kind(), "bearer");
/// assert_eq!(Auth::None.kind(), "none");
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    None,
}

impl Auth<'_> {
    /// Label used in logs in place of the secret itself.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::None => "none",
        }
    }
}

/// Per-request tuning knobs.
///
/// ```
/// use skyscan_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(5)),
///     auth: Some(Auth::Bearer("jwt")),
///     query: Some(vec![("q", "trade".into())]),
///     ..Default::default()
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 5);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    /// Overrides [`HttpClient::default_timeout`] for this call.
    pub timeout: Option<Duration>,
    pub auth: Option<Auth<'a>>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

// ==============================
// Client
// ==============================

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use skyscan_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://bsky.social")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        // A base without a trailing slash would make `join` drop its last segment.
        let normalized = if base.ends_with('/') {
            Cow::Borrowed(base)
        } else {
            Cow::Owned(format!("{base}/"))
        };
        let base = Url::parse(&normalized).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
        })
    }

    /// Override the per-call deadline.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// GET and decode a JSON response.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.send_json::<(), T>(Method::GET, path, None, opts).await
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, Some(body), opts).await
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(e.to_string()))?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let mut rb = self.inner.request(method.clone(), url.clone()).timeout(timeout);

        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }

        let mut body_len = 0usize;
        if let Some(b) = body {
            let bytes = serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?;
            body_len = bytes.len();
            rb = rb.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        let auth_kind = opts.auth.as_ref().map_or("none", Auth::kind);
        if let Some(Auth::Bearer(tok)) = &opts.auth {
            let tok = sanitize_bearer(tok)?;
            rb = rb.bearer_auth(tok);
        }

        let req_id = format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(
            req_id = %req_id,
            method = %method,
            host_path = %host_path(&url),
            query = ?redact_query(opts.query.as_deref().unwrap_or_default()),
            timeout_ms = timeout.as_millis() as u64,
            auth_kind,
            body_len,
            "http.request.start"
        );
        if raw_enabled() {
            // Request bodies may carry credentials, so only their size is logged.
            tracing::debug!(
                target: "http.raw",
                %req_id,
                request = %format!("{method} {url} ({body_len} byte body)"),
                "request"
            );
        }

        let t0 = Instant::now();
        let resp = rb
            .send()
            .await
            .map_err(|e| network_error(&req_id, e, timeout))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| network_error(&req_id, e, timeout))?;
        let duration_ms = t0.elapsed().as_millis() as u64;

        let snippet = redacted_snippet(&bytes, SNIPPET_MAX);
        tracing::debug!(
            req_id = %req_id,
            %status,
            duration_ms,
            body_len = bytes.len(),
            ratelimit_remaining = ?headers.get("ratelimit-remaining").and_then(|v| v.to_str().ok()),
            "http.response"
        );
        if raw_enabled() {
            tracing::info!(
                target: "http.raw",
                %req_id,
                %status,
                duration_ms,
                headers = ?redact_headers(&headers),
                body = %redacted_snippet(&bytes, RAW_MAX_BODY),
                "response"
            );
        }
        tracing::trace!(req_id = %req_id, body_snippet = %snippet, "http.response.body_snippet");

        if status.is_success() {
            return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                tracing::warn!(
                    req_id = %req_id,
                    serde_line = e.line(),
                    serde_col = e.column(),
                    serde_err = %e,
                    body_snippet = %snippet,
                    "http.response.decode_error"
                );
                HttpError::Decode(e.to_string(), snippet)
            });
        }

        let (error, message) = extract_error(&bytes);
        tracing::warn!(
            req_id = %req_id,
            %status,
            error = ?error,
            message = %message,
            "http.error"
        );
        Err(HttpError::Api {
            status,
            error,
            message,
        })
    }
}

// ==============================
// Helpers
// ==============================

fn network_error(req_id: &str, err: reqwest::Error, timeout: Duration) -> HttpError {
    if err.is_timeout() {
        tracing::warn!(req_id, timeout_ms = timeout.as_millis() as u64, "http.timeout");
        return HttpError::Timeout(timeout);
    }
    let message = err.to_string();
    tracing::warn!(req_id, message = %message, "http.network_error");
    HttpError::Network(message)
}

fn host_path(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or("-"), url.path())
}

/// Pull `(error, message)` out of an error body.
///
/// XRPC servers answer `{"error": "Name", "message": "human text"}`; other
/// JSON shapes fall back to whichever of the two is present, and non-JSON
/// bodies to a truncated snippet.
fn extract_error(body: &[u8]) -> (Option<String>, String) {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        let error = non_empty(map.get("error"));
        let message = non_empty(map.get("message"))
            .or_else(|| non_empty(map.get("detail")))
            .or_else(|| error.clone());
        if let Some(message) = message {
            return (error, message);
        }
    }
    (None, snip(&String::from_utf8_lossy(body), SNIPPET_MAX))
}

fn is_secret_field(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("jwt")
        || lower.contains("password")
        || lower.contains("token")
        || lower.contains("secret")
}

fn redact_json(v: &mut Value) {
    match v {
        Value::Object(map) => {
            for (k, val) in map.iter_mut() {
                if is_secret_field(k) {
                    *val = Value::String(REDACTED.into());
                } else {
                    redact_json(val);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}

/// Body text for logs with credential-looking JSON fields blanked out.
fn redacted_snippet(body: &[u8], max: usize) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(mut v) => {
            redact_json(&mut v);
            snip(&v.to_string(), max)
        }
        Err(_) => snip(&String::from_utf8_lossy(body), max),
    }
}

fn snip(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

fn redact_query(q: &[(&str, Cow<'_, str>)]) -> Vec<(String, String)> {
    q.iter()
        .map(|(k, v)| {
            let secret = SECRET_QUERY_KEYS.contains(&k.to_ascii_lowercase().as_str());
            (
                (*k).to_string(),
                if secret { REDACTED.to_string() } else { v.to_string() },
            )
        })
        .collect()
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let val = if *k == AUTHORIZATION || k.as_str().eq_ignore_ascii_case("set-cookie") {
                REDACTED.to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (k.as_str().to_string(), val)
        })
        .collect()
}

fn sanitize_bearer(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !s.is_ascii() || s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "bearer token contains non-ASCII or control characters".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {s}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

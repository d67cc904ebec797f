//! Normalization of raw upstream posts into [`CanonicalPost`]s.
use crate::criteria::epoch_ms;
use crate::render::{SafeHtml, render_text};
use serde::Serialize;
use skyscan_social::bluesky::{PostView, ProfileView};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

const PERMALINK_BASE: &str = "https://bsky.app";

/// A normalized post. Lives for one request only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPost {
    /// Record key: the final path segment of `uri`.
    pub id: String,
    pub uri: String,
    pub author: ProfileView,
    /// Raw body text, unescaped.
    pub text: String,
    /// Escaped body with bare URLs turned into anchors.
    pub rendered_html: SafeHtml,
    pub created_at_ms: i64,
    pub repost_count: u64,
    pub like_count: u64,
    pub permalink: String,
}

impl CanonicalPost {
    /// Engagement score used for ranking only.
    pub fn score(&self) -> u64 {
        self.repost_count.saturating_add(self.like_count)
    }
}

/// Build a [`CanonicalPost`], substituting defaults for anything missing:
/// counters become 0, text becomes empty, and the timestamp falls back from
/// `indexedAt` to `record.createdAt` to `now`.
pub fn normalize(raw: &PostView, now: OffsetDateTime) -> CanonicalPost {
    let uri = raw.uri.clone().unwrap_or_default();
    let id = record_key(&uri).to_string();
    let author = raw.author.clone().unwrap_or_default();
    let text = raw
        .record
        .as_ref()
        .and_then(|r| r.text.clone())
        .unwrap_or_default();

    let created_at = [
        raw.indexed_at.as_deref(),
        raw.record.as_ref().and_then(|r| r.created_at.as_deref()),
    ]
    .into_iter()
    .flatten()
    .find_map(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
    .unwrap_or(now);

    let permalink = permalink(&author, &id);
    CanonicalPost {
        rendered_html: render_text(&text),
        created_at_ms: epoch_ms(created_at),
        repost_count: raw.repost_count.unwrap_or(0),
        like_count: raw.like_count.unwrap_or(0),
        id,
        uri,
        author,
        text,
        permalink,
    }
}

/// `at://did:plc:x/app.bsky.feed.post/3lajf` -> `3lajf`.
pub fn record_key(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or_default()
}

/// Web URL for a post: `https://bsky.app/profile/{handle}/post/{id}`.
///
/// Falls back to the author's DID when the handle is unknown. Segments are
/// percent-encoded, so the result is always safe inside a quoted attribute.
pub fn permalink(author: &ProfileView, id: &str) -> String {
    let actor = author
        .handle
        .as_deref()
        .or(author.did.as_deref())
        .unwrap_or_default();

    let mut url = match Url::parse(PERMALINK_BASE) {
        Ok(url) => url,
        Err(_) => return String::new(),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(["profile", actor, "post", id]);
    }
    url.into()
}

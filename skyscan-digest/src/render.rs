//! Escaping and HTML rendering.
//!
//! Rendering is two-phase. Untrusted text is first turned into a [`SafeHtml`]
//! by [`SafeHtml::escape`]; templates then assemble fragments from fixed
//! markup and `SafeHtml` values only. There is no way to splice a raw `&str`
//! into a template, so upstream text cannot inject markup.
use crate::post::CanonicalPost;
use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("static url pattern"));

/// Escape exactly `&`, `<` and `>`.
///
/// ```
/// use skyscan_digest::render::escape_html;
///
/// assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
/// assert_eq!(escape_html("\"quoted\""), "\"quoted\"");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// HTML that is safe to emit as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SafeHtml(String);

impl SafeHtml {
    /// Escape untrusted text for use as element content.
    pub fn escape(text: &str) -> Self {
        Self(escape_html(text))
    }

    /// Escape untrusted text for use inside a double-quoted attribute value.
    /// On top of the content rules, `"` becomes `&quot;`.
    pub fn escape_attr(text: &str) -> Self {
        Self(escape_html(text).replace('"', "&quot;"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<u64> for SafeHtml {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts only fixed markup and already-safe values.
struct Template(String);

impl Template {
    fn new() -> Self {
        Self(String::new())
    }

    fn markup(mut self, m: &'static str) -> Self {
        self.0.push_str(m);
        self
    }

    fn value(mut self, v: &SafeHtml) -> Self {
        self.0.push_str(v.as_str());
        self
    }

    fn finish(self) -> SafeHtml {
        SafeHtml(self.0)
    }
}

/// Wrap every bare `http(s)://` URL of already-escaped text in an anchor that
/// opens in a new tab without leaking the referrer.
pub fn linkify(escaped: &SafeHtml) -> SafeHtml {
    let out = URL_RE.replace_all(escaped.as_str(), |caps: &Captures<'_>| {
        // The match is escaped for content already; only `"` still needs
        // encoding before it can sit inside the attribute.
        let display = SafeHtml(caps[0].to_string());
        let href = SafeHtml(caps[0].replace('"', "&quot;"));
        Template::new()
            .markup("<a href=\"")
            .value(&href)
            .markup("\" target=\"_blank\" rel=\"noreferrer\">")
            .value(&display)
            .markup("</a>")
            .finish()
            .into_string()
    });
    SafeHtml(out.into_owned())
}

/// Escape, then linkify: the `renderedHtml` of a post body.
pub fn render_text(text: &str) -> SafeHtml {
    linkify(&SafeHtml::escape(text))
}

fn render_item(post: &CanonicalPost) -> SafeHtml {
    let handle = post
        .author
        .handle
        .as_deref()
        .or(post.author.did.as_deref())
        .unwrap_or_default();

    Template::new()
        .markup("<li>\n  <p><strong>@")
        .value(&SafeHtml::escape(handle))
        .markup("</strong>: ")
        .value(&SafeHtml::escape(&post.text))
        .markup("</p>\n  <p><em>Reposts:</em> ")
        .value(&SafeHtml::from(post.repost_count))
        .markup(" · <em>Likes:</em> ")
        .value(&SafeHtml::from(post.like_count))
        .markup(" — <a href=\"")
        .value(&SafeHtml::escape_attr(&post.permalink))
        .markup("\" target=\"_blank\" rel=\"noreferrer\">link</a></p>\n</li>")
        .finish()
}

/// The copy-pastable fragment: an ordered list with one item per post, in
/// the order given.
pub fn render_fragment(posts: &[CanonicalPost]) -> SafeHtml {
    let mut t = Template::new().markup("<ol>\n");
    for (i, post) in posts.iter().enumerate() {
        if i > 0 {
            t = t.markup("\n");
        }
        t = t.value(&render_item(post));
    }
    t.markup("\n</ol>").finish()
}

/// Ranked posts plus their fragment, ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub count: usize,
    pub posts: Vec<CanonicalPost>,
    pub prep_html: SafeHtml,
}

pub fn render_digest(posts: Vec<CanonicalPost>) -> Digest {
    let prep_html = render_fragment(&posts);
    Digest {
        count: posts.len(),
        posts,
        prep_html,
    }
}

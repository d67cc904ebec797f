use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Wrong-typed values become `None` instead of failing the whole page.
fn lenient<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(de)?.and_then(|v| T::deserialize(v).ok()))
}

/// Entries that do not decode are dropped; the rest survive.
fn lenient_list<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Option::<Value>::deserialize(de)? {
        Some(Value::Array(items)) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|v| T::deserialize(v).ok())
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_jwt: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub did: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchPostsResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub posts: Vec<PostView>,
    #[serde(default, deserialize_with = "lenient")]
    pub cursor: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub hits_total: Option<u64>,
}

/// A post as returned by `app.bsky.feed.searchPosts`.
///
/// Every field is optional and a wrong-typed value reads as absent;
/// normalization substitutes defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PostView {
    #[serde(deserialize_with = "lenient")]
    pub uri: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub cid: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub author: Option<ProfileView>,
    #[serde(deserialize_with = "lenient")]
    pub record: Option<PostRecord>,
    #[serde(deserialize_with = "lenient")]
    pub indexed_at: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub repost_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub like_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub reply_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub quote_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileView {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub did: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub avatar: Option<String>,
}

/// The `app.bsky.feed.post` record body. Embeds, facets and the rest are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PostRecord {
    #[serde(deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub created_at: Option<String>,
}

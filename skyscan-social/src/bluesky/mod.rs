//! Bluesky integration surface.
//!
//! `client` wraps the two XRPC calls we need (session login and post search),
//! `types` holds the wire models, and `search` defines the traits the
//! aggregator pages through.
pub mod client;
pub mod search;
pub mod types;

pub use client::{BlueskyApi, BlueskySession};
pub use search::{Authenticator, PostSearch, SearchPage, SearchPageRequest};
pub use types::{PostRecord, PostView, ProfileView};

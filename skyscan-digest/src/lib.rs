//! The skyscan aggregation pipeline.
//!
//! A search request flows through four stages:
//!
//! 1. [`aggregate`] pages through a [`PostSearch`] session until enough raw
//!    posts were scanned or the upstream runs dry;
//! 2. [`rank`] normalizes them into [`CanonicalPost`]s, drops those outside
//!    the time window or under the engagement thresholds, and orders the rest;
//! 3. [`render`] escapes untrusted text and builds the HTML fragment;
//! 4. [`handler`] validates request parameters and wraps the outcome in a
//!    JSON envelope with an HTTP status.
//!
//! [`PostSearch`]: skyscan_social::bluesky::PostSearch
pub mod aggregate;
pub mod criteria;
pub mod handler;
pub mod post;
pub mod rank;
pub mod render;

pub use aggregate::{PAGE_SIZE, collect_posts};
pub use criteria::SearchCriteria;
pub use handler::{Envelope, HandlerResponse, SearchHandler, SearchParams, parse_criteria};
pub use post::CanonicalPost;
pub use rank::filter_and_rank;
pub use render::{Digest, SafeHtml, render_digest, render_fragment};

//! Social network clients used by skyscan.
//!
//! Only Bluesky (AT Protocol XRPC) is implemented. The [`bluesky::PostSearch`]
//! and [`bluesky::Authenticator`] traits are the seam the aggregation pipeline
//! is written against, so tests can swap in canned pages.
pub mod bluesky;

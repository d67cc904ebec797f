//! Shared error handling and observability helpers for the skyscan crates.
//!
//! This crate stays dependency-minimal so that every other crate in the
//! workspace can depend on it.
//!
//! # Overview
//!
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`SkyscanError`] and [`Result`]: the error kinds a search request can
//!   surface to its caller
//!
//! ```rust
//! use skyscan_common::SkyscanError;
//!
//! let err = SkyscanError::Validation("Missing query.".into());
//! assert_eq!(err.public_message(), "Missing query.");
//! assert!(err.is_client_error());
//! ```

pub mod observability;

/// Error kinds surfaced by a search request.
///
/// Malformed upstream data is deliberately absent: missing fields are
/// defaulted during normalization and never raise.
#[derive(thiserror::Error, Debug)]
pub enum SkyscanError {
    /// Required server-side configuration (credentials) is absent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied parameters were missing or malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication or a page fetch against the upstream failed.
    #[error("Upstream error: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl SkyscanError {
    /// Message placed in the `{ "error": ... }` envelope.
    ///
    /// Unlike `Display`, this omits the kind prefix so the caller sees the
    /// configured text or the upstream's own message.
    pub fn public_message(&self) -> String {
        match self {
            Self::Config(msg) | Self::Validation(msg) => msg.clone(),
            Self::Upstream(err) => {
                let msg = format!("{err:#}");
                if msg.trim().is_empty() {
                    "Server error".to_string()
                } else {
                    msg
                }
            }
        }
    }

    /// True when the caller, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Convenient alias for results that use [`SkyscanError`].
pub type Result<T> = std::result::Result<T, SkyscanError>;

// src/error.rs
//! Typed errors for the pipeline boundaries.
//!
//! The orchestrator needs to tell three things apart without string matching:
//! a rate-limited source (back off that source, keep the others), a
//! quota-exhausted translator (keep the original text, stop retrying), and a
//! storage conflict (a duplicate, not a failure). Everything else flows
//! through `anyhow` as in the rest of the crate.

use thiserror::Error;

/// Errors raised by source adapters.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The provider signalled a rate limit. Retryable with backoff; must not
    /// abort fetches from other sources.
    #[error("{provider} rate limited")]
    RateLimited { provider: &'static str },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }
}

/// Errors raised by the translation provider.
#[derive(Error, Debug)]
pub enum TranslateError {
    /// The translation quota for the account is spent. Terminal for the run:
    /// retrying cannot succeed, so callers short-circuit immediately.
    #[error("translation quota exhausted")]
    QuotaExhausted,

    /// Network/timeout/5xx class failure; retryable with backoff.
    #[error("transient translation failure: {0}")]
    Transient(String),
}

impl TranslateError {
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, TranslateError::QuotaExhausted)
    }
}

/// Errors raised by the persistence gateway.
///
/// Unique-constraint conflicts are NOT an error variant: the store contract
/// maps them to `skipped_as_duplicate` in its insert report.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Hard errors at the run boundary. Partial shortfalls, rejected items and
/// duplicates are never surfaced through this type.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no source adapters configured")]
    NoSources,

    #[error(transparent)]
    Store(#[from] StoreError),
}

//! Semantic augmentation: an external natural-language extraction service
//! invoked per free-text field to catch capabilities the vocabulary matcher
//! cannot phrase-match.
//!
//! Every failure mode here is recoverable by design — a timeout, a quota
//! error, or malformed output degrades that facility to rule-only
//! candidates with a warning. Nothing in this module can fail the run.

pub mod client;
pub mod http;

pub use client::{validate_findings, RawFinding, SemanticExtractor, SemanticFinding};
pub use http::HttpSemanticClient;

/// Failures of the external extraction service. All recovered — the caller
/// falls back to rule-only candidates and flags the run degraded.
#[derive(Debug, thiserror::Error)]
pub enum SemanticError {
    #[error("semantic extraction service unreachable at {0}")]
    Connection(String),

    #[error("semantic extraction timed out after {0}ms")]
    Timeout(u64),

    #[error("semantic extraction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("semantic extraction response failed schema validation: {0}")]
    InvalidResponse(String),
}

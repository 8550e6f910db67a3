//! Unified error taxonomy for the extraction pipeline.
//!
//! Every sub-step maps its failure into exactly one of these kinds at the
//! point it crosses into the orchestrator; the orchestrator never
//! reinterprets an already-typed error. The HTTP layer (out of scope here)
//! maps kinds to status codes via [`Error::status_code`].

/// Unified error types for the readgate pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Malformed URL, disallowed scheme/port/credentials, or non-HTML
    /// content. Never retried.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// An SSRF rejection. Never retried; logged at higher severity since it
    /// may indicate probing.
    #[error("FORBIDDEN: {0}")]
    Forbidden(String),

    /// Upstream fetch/render/extract failure, DNS failure when disallowed,
    /// too many redirects, or byte budget exceeded. Safe to retry at the
    /// caller's discretion.
    #[error("SERVICE_UNAVAILABLE: {0}")]
    ServiceUnavailable(String),

    /// Unexpected failure from a collaborator with no remaining fallback.
    #[error("INTERNAL_ERROR: {0}")]
    InternalError(String),
}

impl Error {
    /// HTTP-equivalent status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::Forbidden(_) => 403,
            Error::ServiceUnavailable(_) => 503,
            Error::InternalError(_) => 500,
        }
    }

    /// Stable machine-readable code string.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Error::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

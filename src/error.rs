//! Error types for mail-triage.

use std::time::Duration;

/// Top-level error type for the triage run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Configuration-related errors. These fail fast before any email is
/// scanned — matching against an empty entity list or taxonomy would
/// silently produce a misleading empty result set.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Entity list {path} contains no usable entries")]
    EmptyEntityList { path: String },

    #[error("Keyword taxonomy has no categories")]
    EmptyTaxonomy,

    #[error("Category {category} has no terms")]
    EmptyCategory { category: String },

    #[error("Category {category} has weight {weight}, expected 1-3")]
    InvalidWeight { category: String, weight: u32 },

    #[error("Invalid whole-word term '{term}' in category {category}: {reason}")]
    InvalidTerm {
        category: String,
        term: String,
        reason: String,
    },

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Failed to parse taxonomy file {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extraction-related errors. Only container-level failures surface here;
/// individual unreadable messages are skipped and counted, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Mailbox path not found: {0}")]
    NotFound(String),

    #[error("No mbox files found under {0}")]
    NoMailboxes(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// External judge errors. Recorded per-email as an absent judgment and
/// never propagated as a pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Judge request failed: {0}")]
    Network(String),

    #[error("Judge rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Judge returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Judge authentication failed")]
    AuthFailed,

    #[error("Judge response unparseable: {0}")]
    InvalidResponse(String),

    #[error("Judge call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Judging aborted")]
    Aborted,

    #[error("Judge is disabled")]
    Disabled,
}

impl JudgeError {
    /// Whether this failure is worth retrying with backoff.
    ///
    /// Rate limits, network failures, timeouts and server errors are
    /// transient. Auth failures and malformed requests/responses are not —
    /// retrying would burn the attempt budget for nothing.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited { .. } | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::AuthFailed | Self::InvalidResponse(_) | Self::Aborted | Self::Disabled => false,
        }
    }
}

/// Export errors. Fatal: a silently-empty output file is worse than a
/// crash for a legal deliverable.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Nothing to export: result set is empty")]
    Empty,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for packsplit.
//!
//! `PackSplitError` covers both fatal conditions (which abort the run before any
//! file is written) and backend failures that the estimator and suggestion
//! layers recover from locally. Recoverable outcomes that should only be
//! reported live in [`crate::types::Warning`].

use std::path::PathBuf;

use thiserror::Error;

/// Exit code for a general failure.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code when a required external tool is missing.
pub const EXIT_TOOL_MISSING: i32 = 2;

/// Exit code for invalid command-line arguments.
pub const EXIT_INVALID_ARGS: i32 = 3;

/// Exit code when a configuration artifact already exists and `--force` was not given.
pub const EXIT_CONFLICT: i32 = 64;

/// Main error type for the packsplit library.
#[derive(Debug, Error)]
pub enum PackSplitError {
    /// Required external tool is not on `PATH`.
    #[error("Required tool '{tool}' was not found on PATH")]
    ToolMissing { tool: String },

    /// Analyzed root (or a subtree) does not exist or cannot be read.
    #[error("Cannot read directory {}: {reason}", .path.display())]
    RootUnreadable { path: PathBuf, reason: String },

    /// Invalid argument or configuration value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unsupported token encoding.
    #[error("Unsupported encoding: '{0}'. Expected one of o200k_base, cl100k_base, p50k_base, p50k_edit, r50k_base, gpt2")]
    InvalidEncoding(String),

    /// A configuration artifact already exists and `force` was not set.
    #[error("Configuration already exists at {} (use --force to overwrite)", .path.display())]
    Conflict { path: PathBuf },

    /// Packaging tool could not be started.
    #[error("Packaging tool '{command}' could not be started: {reason}")]
    PackagerUnavailable { command: String, reason: String },

    /// Packaging tool exceeded its time limit.
    #[error("Packaging tool '{command}' timed out after {secs}s")]
    PackagerTimeout { command: String, secs: u64 },

    /// Packaging tool ran but exited unsuccessfully.
    #[error("Packaging tool exited with status {status:?}: {stderr}")]
    PackagerFailed { status: Option<i32>, stderr: String },

    /// Suggestion service request failed.
    #[error("Suggestion request failed: {0}")]
    SuggestionRequest(String),

    /// Suggestion service answered with something that is not a pattern list.
    #[error("Suggestion response is not a JSON array of glob strings: {0}")]
    SuggestionParse(String),

    /// An exclusion pattern could not be compiled.
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl PackSplitError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ToolMissing { .. } => EXIT_TOOL_MISSING,
            Self::InvalidArgument(_) | Self::InvalidEncoding(_) => EXIT_INVALID_ARGS,
            Self::Conflict { .. } => EXIT_CONFLICT,
            _ => EXIT_FAILURE,
        }
    }
}

/// Result type alias for packsplit operations.
pub type Result<T> = std::result::Result<T, PackSplitError>;

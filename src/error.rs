//! Rich diagnostic error types for akh-diag.
//!
//! Only operational failures live here: unreadable files, invalid JSON or TOML,
//! unknown scenarios. Data-quality problems inside a dataset (a malformed rule,
//! a cyclic hierarchy, an unknown relation kind) are never errors; they are
//! returned as [`ValidationIssue`](crate::ontology::ValidationIssue) values.

use miette::Diagnostic;
use thiserror::Error;

use crate::acquisition::AcquisitionError;
use crate::config::ConfigError;

/// Top-level error type for akh-diag.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum DiagError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Acquisition(#[from] AcquisitionError),
}

// ---------------------------------------------------------------------------
// Knowledge errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KnowledgeError {
    #[error("failed to read dataset: {path}")]
    #[diagnostic(
        code(akh::knowledge::io),
        help("Ensure the dataset file exists and is readable, or pass --dataset with a valid path.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset is not valid JSON: {message}")]
    #[diagnostic(
        code(akh::knowledge::json),
        help(
            "The dataset must be a single JSON document. Check for trailing commas, \
             unquoted keys, or a truncated file."
        )
    )]
    Json { message: String },

    #[error("dataset root must be a JSON object, found {found}")]
    #[diagnostic(
        code(akh::knowledge::root_shape),
        help(
            "Wrap the dataset in an object with `rules`, `vocabulary` and `ontology` keys. \
             See data/knowledge/ev-ssb.json for the expected layout."
        )
    )]
    RootShape { found: String },

    #[error("failed to write dataset: {path}")]
    #[diagnostic(
        code(akh::knowledge::write),
        help("Ensure you have write permissions to the dataset file and its directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("the bundled dataset cannot be saved")]
    #[diagnostic(
        code(akh::knowledge::read_only),
        help("Pass --dataset with a file path to record captured rules.")
    )]
    ReadOnly,
}

/// Result type for knowledge loading and persistence.
pub type KnowledgeResult<T> = std::result::Result<T, KnowledgeError>;

/// Result type for akh-diag operations.
pub type DiagResult<T> = std::result::Result<T, DiagError>;

//! Errors raised by the translation core (tool registry, translators, model routing).
//!
//! HTTP-facing error mapping lives in the `serve` crate; this enum only covers
//! conditions the core itself can detect before any upstream call is made.

use thiserror::Error;

/// Errors raised while translating a request or resolving tool/model names.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two tools (built-in or function) resolved to the same upstream function name.
    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),

    /// A user-declared function tool used the registry's reserved internal prefix.
    #[error("tool name uses reserved prefix: {0}")]
    ReservedToolPrefix(String),

    /// `reasoning` was present but was not a JSON object.
    #[error("reasoning field must be an object")]
    InvalidReasoning,

    /// The on-disk model map file exists but does not parse as a flat string map.
    #[error("failed to parse model map at {path}: {source}")]
    ModelMapParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The on-disk model map file could not be read.
    #[error("failed to read model map at {path}: {source}")]
    ModelMapRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

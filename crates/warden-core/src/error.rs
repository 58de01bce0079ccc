//! Error taxonomy (§7). Only [`WardenError::Invariant`] indicates a
//! corrupted internal data structure; every other variant is an ordinary,
//! recoverable condition the caller is expected to log and move past
//! (skip the offending rule, skip the rewrite, forward the request as-is).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("parse error at {list_name}:{line_no}: {message}")]
    Parse {
        list_name: String,
        line_no: u32,
        message: String,
    },

    #[error("index error: {0}")]
    Index(String),

    #[error("rewrite error: {0}")]
    Rewrite(String),

    #[error("modifier error: {0}")]
    Modifier(String),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, WardenError>;

//! Error types for tbl-engine
//!
//! Errors only occur at the load/validation boundary (parsing a node
//! graph, validating capability configs). Interactive evaluation never
//! fails; it degrades to safe defaults instead.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// tbl-engine errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Graph parse error: {0}")]
    GraphParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

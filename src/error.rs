//! Error types for session and statement operations.
//!
//! Every fallible operation either returns a fully usable result or fails
//! with one of these variants, each carrying the engine's diagnostic text.
//! An unknown change kind reported by the engine during a row-change hook is
//! an engine contract violation and panics instead of returning an error.

use thiserror::Error;

/// Errors surfaced by database operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection could not be opened or created.
    #[error("failed to open database: {0}")]
    Open(String),

    /// The SQL text failed to compile into a statement.
    #[error("failed to prepare statement: {0}")]
    Prepare(String),

    /// One-shot execution failed.
    #[error("execution failed: {0}")]
    Exec(String),

    /// Stepping a prepared statement failed.
    #[error("statement step failed: {0}")]
    Step(String),
}

pub type Result<T> = std::result::Result<T, Error>;

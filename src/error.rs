// src/error.rs

//! Central error type for the braise crate

use thiserror::Error;

/// Errors surfaced by the parser driver and the persistence backend
#[derive(Error, Debug)]
pub enum Error {
    /// Recipe source could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Backend initialization failed
    #[error("Initialization error: {0}")]
    InitError(String),

    /// A requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

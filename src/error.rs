//! Error types and the result alias used throughout the crate.
//!
//! Absent and corrupt persisted records are distinct variants even though
//! most callers degrade both to the same behavior; the distinction keeps
//! the lossy paths visible.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColloquyError {
    #[error("no API key available; set the COLLOQUY_API_KEY environment variable or run `colloquy configure`")]
    MissingCredential,

    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("thread record {id} is corrupt: {source}")]
    ThreadDecode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ColloquyError>;

//! Crate-wide error type.
//!
//! Internal functions return `Result<T, CrawlError>`; the two binaries flatten
//! this into `anyhow::Error` at the `main` boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("document store error: {0}")]
    Store(String),

    #[error("input error: {0}")]
    Input(String),
}

pub type CrawlResult<T> = Result<T, CrawlError>;

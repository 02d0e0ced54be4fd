//! Error types for the fund data source.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request to fund data source failed")]
    Request(#[from] reqwest::Error),
    #[error("fund data source returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("fund data source returned no rows")]
    Empty,
    #[error("failed to parse fund data payload from {url}")]
    Malformed {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("fund data source did not answer within {0:?}")]
    Timeout(Duration),
}

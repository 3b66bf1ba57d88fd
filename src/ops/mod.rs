//! HTTP operations run through the dispatcher: page-title fetch and file
//! download. Both take a URL payload and honour the dispatch token.

pub mod download;
pub mod http;
pub mod title;

pub use download::{FileDownloader, Progress, ProgressFn, file_name_for};
pub use http::HttpClient;
pub use title::{TitleFetcher, extract_title};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("bearer token is not a valid header value")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("no {0} tag found")]
    MissingTag(&'static str),

    #[error("cannot derive a file name from {0}")]
    NoFileName(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

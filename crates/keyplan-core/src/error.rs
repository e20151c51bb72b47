//! Error types for Keyplan.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline timed out after {0}s")]
    PipelineTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error category, stable across the HTTP and CLI surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedInput,
    DataSourceUnavailable,
    Generation,
    RateLimited,
    Embedding,
    Retrieval,
    Configuration,
    PipelineTimeout,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedInput(_) => ErrorKind::MalformedInput,
            Error::DataSourceUnavailable(_) => ErrorKind::DataSourceUnavailable,
            Error::Generation(_) => ErrorKind::Generation,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::Embedding(_) => ErrorKind::Embedding,
            Error::Retrieval(_) => ErrorKind::Retrieval,
            Error::Config(_) => ErrorKind::Configuration,
            Error::PipelineTimeout(_) => ErrorKind::PipelineTimeout,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Internal => 1,
            ErrorKind::MalformedInput => 2,
            ErrorKind::DataSourceUnavailable => 3,
            ErrorKind::Generation => 4,
            ErrorKind::RateLimited => 5,
            ErrorKind::Embedding => 6,
            ErrorKind::Retrieval => 7,
            ErrorKind::Configuration => 8,
            ErrorKind::PipelineTimeout => 9,
        }
    }

    /// HTTP status code used by the server.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::MalformedInput => 422,
            ErrorKind::DataSourceUnavailable
            | ErrorKind::Generation
            | ErrorKind::Embedding
            | ErrorKind::Retrieval => 502,
            ErrorKind::RateLimited => 429,
            ErrorKind::Configuration => 400,
            ErrorKind::PipelineTimeout => 504,
            ErrorKind::Internal => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use std::fmt;

use thiserror::Error;

use crate::upload::SchemaField;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A user record disagrees with the first record on whether `field` is present.
    #[error("inconsistent data provided in the {field} users field")]
    InconsistentField { field: SchemaField },

    /// No identifying field is present on any user record.
    #[error("user data provided is absolutely empty")]
    EmptyInput,

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("base url cannot carry path segments: {0}")]
    InvalidBaseUrl(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`], for callers deciding on a resilience policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputConsistency,
    Transport,
    Decode,
    Cancelled,
    Configuration,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InconsistentField { .. } | Error::EmptyInput => ErrorKind::InputConsistency,
            Error::Status { .. } | Error::Http(_) => ErrorKind::Transport,
            Error::Decode(_) => ErrorKind::Decode,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Url(_) | Error::InvalidBaseUrl(_) | Error::Config(_) => {
                ErrorKind::Configuration
            }
            Error::Csv(_) | Error::Io(_) => ErrorKind::Io,
        }
    }

    /// HTTP status of a rejected call, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InputConsistency => "input consistency",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

//! Error types for the CLI

use std::path::PathBuf;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Harvest(#[from] itr_harvest::Error),

    #[error(transparent)]
    Common(#[from] itr_common::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid test report {path}: {message}")]
    Report { path: PathBuf, message: String },

    #[error("login to {url} rejected with status {status}")]
    Authentication { url: String, status: u16 },

    #[error("request to {url} failed with status {status}")]
    InstanceStatus { url: String, status: u16 },

    #[error("scm-manager at {url} not available after {attempts} attempts")]
    ServerUnavailable { url: String, attempts: u32 },

    #[error("failed to collect tests of: {}", failed.join(", "))]
    HarvestFailed { failed: Vec<String> },

    #[error("cypress exited with code {code:?}")]
    TestsFailed { code: Option<i32> },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("command failed: {message}")]
    CommandFailed { message: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn command_failed(message: impl Into<String>) -> Self {
        Error::CommandFailed {
            message: message.into(),
        }
    }
}

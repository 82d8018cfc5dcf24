//! Error types shared by the harvest and provisioning stages

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by filesystem synchronization and polling
#[derive(Debug, Error)]
pub enum Error {
    /// A filesystem operation on a specific path failed
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the failing operation was applied to
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A bounded poll ran out of attempts
    #[error("gave up waiting for {description} after {attempts} attempts")]
    PollExhausted {
        /// Human-readable description of the awaited condition
        description: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// A poll check reported a fatal error
    #[error("error waiting for {description}: {message}")]
    PollFailed {
        /// Human-readable description of the awaited condition
        description: String,
        /// Failure reported by the check
        message: String,
    },

    /// Logging could not be initialized
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Extension trait attaching a path to `std::io::Result`s.
pub trait IoResultExt<T> {
    /// Convert the I/O error into [`Error::Io`] carrying `path`.
    fn at_path(self, path: impl Into<PathBuf>) -> crate::Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path(self, path: impl Into<PathBuf>) -> crate::Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}

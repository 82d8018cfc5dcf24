//! Error types for revision collection and extraction

use thiserror::Error;

/// Errors raised while collecting revisions or harvesting a repository
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem or polling error from the shared layer
    #[error(transparent)]
    Common(#[from] itr_common::Error),

    /// HTTP transport error talking to the hosting service
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The hosting API answered with an unexpected status
    #[error("hosting API request {url} failed with status {status}")]
    HostingStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// I/O error outside of a path-aware operation
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// `git` exited with a non-zero status
    #[error("git {args} failed with exit code {code:?}: {stderr}")]
    Git {
        /// Arguments passed to git
        args: String,
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Neither the remote build descriptor nor a project descriptor yielded a version
    #[error("could not resolve development version of {repository}")]
    DevelopmentVersionUnresolved {
        /// Repository whose development branch was probed
        repository: String,
    },

    /// A project descriptor could not be parsed
    #[error("invalid project descriptor: {0}")]
    Descriptor(String),

    /// Two revisions resolved to the same version label
    #[error("duplicate version {version} in {repository}")]
    DuplicateVersion {
        /// Repository with the collision
        repository: String,
        /// Colliding version label
        version: String,
    },

    /// Clone URL could not be constructed
    #[error("invalid clone url: {0}")]
    CloneUrl(String),
}

impl Error {
    /// Create a descriptor error with the given message
    pub fn descriptor(msg: impl Into<String>) -> Self {
        Self::Descriptor(msg.into())
    }
}

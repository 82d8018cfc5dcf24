//! Common types for the integration test runner: artifact categories,
//! directory synchronization, bounded polling and logging setup

#![deny(missing_docs)]

pub mod category;
pub mod error;
pub mod poll;
pub mod sync;
pub mod telemetry;

pub use category::ArtifactCategory;
pub use error::Error;
pub use sync::{empty_dir, sync_tree, TransferMode};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Repository holding the core product (and its own E2E tests)
pub const CORE_REPOSITORY: &str = "scm-manager";

/// Organization owning the core and plugin repositories
pub const DEFAULT_ORGANIZATION: &str = "scm-manager";

/// Branch carrying unreleased development work in every repository
pub const DEVELOPMENT_BRANCH: &str = "develop";

/// Environment variable holding the hosting API / clone access token
pub const ACCESS_TOKEN_ENV: &str = "GITHUB_API_TOKEN";

/// Environment variable holding the log filter
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

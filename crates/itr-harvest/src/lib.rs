//! Harvesting of E2E test artifacts from repository release history
//!
//! - [`hosting`] - Code-hosting REST API (repository, release and tag listing)
//! - [`descriptor`] - Build descriptor parsing (`gradle.properties`, `pom.xml`)
//! - [`revisions`] - Release history to ordered revision lists
//! - [`git`] - `git` subprocess driver
//! - [`extractor`] - Sparse checkout and per-revision harvesting

#![deny(missing_docs)]

pub mod descriptor;
pub mod error;
pub mod extractor;
pub mod git;
pub mod hosting;
pub mod revisions;

pub use error::Error;
pub use extractor::{Extractor, SparseScope};
pub use git::{CloneSource, GitCli, VersionControl};
pub use hosting::{GithubClient, HostingApi, HostingConfig};
pub use revisions::{DuplicateVersionPolicy, Revision, RevisionCollector, RevisionKind};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Test directory of the core repository
pub const CORE_TEST_DIR: &str = "scm-ui/e2e-tests/cypress";

/// Test directory of every plugin repository
pub const PLUGIN_TEST_DIR: &str = "src/test/e2e/cypress";

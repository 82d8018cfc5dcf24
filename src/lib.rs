//! Integration test runner library
//!
//! Orchestrates the E2E test suite of scm-manager and its plugins:
//!
//! - [`harvest`] - Collect test artifacts from every repository's release history
//! - [`instance`] - Client for a running scm-manager instance
//! - [`commands`] - `collect`, `prepare`, `provision`, `run` and `init`
//! - [`video`] - Post-processing of recorded test videos

pub mod commands;
pub mod config;
pub mod error;
pub mod harvest;
pub mod instance;
pub mod video;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

use crate::config::HarnessSettings;

/// Collect, provision and run the scm-manager E2E test suite
#[derive(Parser, Debug)]
#[command(name = "integration-test-runner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: HarnessSettings,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect available tests from all repositories and archive them
    Collect(commands::collect::CollectArgs),
    /// Collect available tests without archiving
    Prepare(commands::prepare::PrepareArgs),
    /// Assemble the tests matching a running instance's versions
    Provision(commands::provision::ProvisionArgs),
    /// Run the provisioned tests against an instance
    Run(commands::run::RunArgs),
    /// Initialize a plugin for BDD E2E testing
    Init(commands::init::InitArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Collect(args) => commands::collect::run(args, &self.settings).await,
            Commands::Prepare(args) => commands::prepare::run(args, &self.settings).await,
            Commands::Provision(args) => commands::provision::run(args).await,
            Commands::Run(args) => commands::run::run(args).await,
            Commands::Init(args) => commands::init::run(args).await,
        }
    }
}

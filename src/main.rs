//! Integration test runner
//!
//! CLI for collecting, provisioning and running the scm-manager E2E test suite.

use clap::Parser;

use integration_test_runner::{Cli, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    itr_common::telemetry::init_logging()?;

    let cli = Cli::parse();
    cli.run().await
}

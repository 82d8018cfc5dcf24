//! Prepare command - collect tests without archiving them

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::config::HarnessSettings;
use crate::harvest::Harvester;
use crate::Result;

/// Collect the tests of every repository into the tests directory
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Directory harvested tests are written to
    #[arg(long, default_value = "./e2e-tests")]
    pub tests_dir: PathBuf,
}

pub async fn run(args: PrepareArgs, settings: &HarnessSettings) -> Result<()> {
    info!(tests_dir = %args.tests_dir.display(), "Starting preparation");
    tokio::fs::create_dir_all(&args.tests_dir).await?;

    Harvester::from_settings(settings)?
        .harvest_all(&args.tests_dir)
        .await?;

    info!("Done");
    Ok(())
}

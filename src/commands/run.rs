//! Run command - execute the provisioned suite against an instance

use std::path::{Path, PathBuf};
use std::process::Stdio;

use clap::Args;
use tokio::process::Command;
use tracing::{info, warn};

use itr_common::empty_dir;

use crate::instance::DEFAULT_INSTANCE_URL;
use crate::video::{process_videos, Ffmpeg, VideoCutter};
use crate::{Error, Result};

/// Run the provisioned test suite against a given instance
#[derive(Args, Debug)]
pub struct RunArgs {
    /// URL of the scm-manager instance
    #[arg(short = 'a', long, env = "SCM_URL", default_value = DEFAULT_INSTANCE_URL)]
    pub url: String,

    /// scm-manager account username, exposed to tests as `USERNAME`
    #[arg(short, long, env = "SCM_USERNAME")]
    pub username: Option<String>,

    /// scm-manager account password, exposed to tests as `PASSWORD`
    #[arg(short, long, env = "SCM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Open the interactive runner instead of running headless
    #[arg(short, long)]
    pub open: bool,

    /// Cypress project directory
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Directory receiving reports, screenshots and videos
    #[arg(short = 'O', long, default_value = "./build/target")]
    pub output: PathBuf,
}

/// Output locations below the target directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub screenshots: PathBuf,
    pub videos: PathBuf,
    pub reports: PathBuf,
}

impl RunLayout {
    pub fn new(target: &Path) -> Self {
        let cypress = target.join("cypress");
        Self {
            screenshots: cypress.join("screenshots"),
            videos: cypress.join("videos"),
            reports: cypress.join("reports"),
        }
    }

    /// Report file pattern; the runner replaces `[hash]` per spec
    pub fn mocha_file(&self) -> PathBuf {
        self.reports.join("TEST-[hash].xml")
    }

    /// Empty the report and video folders so only this run is post-processed
    pub async fn reset(&self) -> Result<()> {
        empty_dir(&self.reports).await?;
        empty_dir(&self.videos).await?;
        Ok(())
    }
}

/// Environment passed to the runner: configuration overrides and test env
pub fn cypress_env(args: &RunArgs, layout: &RunLayout) -> Vec<(String, String)> {
    let mut env = vec![
        ("CYPRESS_baseUrl".to_string(), args.url.clone()),
        ("CYPRESS_videoUploadOnPasses".to_string(), "false".to_string()),
        ("CYPRESS_videoCompression".to_string(), "false".to_string()),
        (
            "CYPRESS_screenshotsFolder".to_string(),
            layout.screenshots.display().to_string(),
        ),
        (
            "CYPRESS_videosFolder".to_string(),
            layout.videos.display().to_string(),
        ),
        (
            "CYPRESS_testFiles".to_string(),
            "**/*.{feature,features}".to_string(),
        ),
    ];
    if let Some(username) = &args.username {
        env.push(("CYPRESS_USERNAME".to_string(), username.clone()));
    }
    if let Some(password) = &args.password {
        env.push(("CYPRESS_PASSWORD".to_string(), password.clone()));
    }
    env
}

/// Runner arguments after `npx`
pub fn cypress_args(open: bool, layout: &RunLayout) -> Vec<String> {
    let mut args = vec![
        "cypress".to_string(),
        if open { "open" } else { "run" }.to_string(),
        "--project".to_string(),
        ".".to_string(),
    ];
    if !open {
        args.extend([
            "--reporter".to_string(),
            "junit".to_string(),
            "--reporter-options".to_string(),
            format!("mochaFile={}", layout.mocha_file().display()),
        ]);
    }
    args
}

pub async fn run(args: RunArgs) -> Result<()> {
    run_with(args, &Ffmpeg).await
}

/// Run the suite, post-processing videos with `cutter`
pub async fn run_with(args: RunArgs, cutter: &dyn VideoCutter) -> Result<()> {
    let target = std::path::absolute(&args.output)?;
    let layout = RunLayout::new(&target);
    if !args.open {
        layout.reset().await?;
    }

    info!(directory = %args.directory.display(), open = args.open, "Running cypress");
    let status = Command::new("npx")
        .args(cypress_args(args.open, &layout))
        .envs(cypress_env(&args, &layout))
        .current_dir(&args.directory)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| Error::command_failed(format!("failed to start cypress: {}", e)))?;

    if !args.open {
        process_videos(&layout.reports, &layout.videos, cutter).await?;
    }

    if !status.success() {
        warn!(code = ?status.code(), "Test run failed");
        return Err(Error::TestsFailed {
            code: status.code(),
        });
    }
    info!("Test run passed");
    Ok(())
}

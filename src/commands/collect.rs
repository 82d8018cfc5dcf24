//! Collect command - harvest tests and package them as a zip archive

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use clap::Args;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use itr_common::empty_dir;

use crate::commands::CommandErrorExt;
use crate::config::HarnessSettings;
use crate::harvest::Harvester;
use crate::Result;

/// Collect available tests from all repositories
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Directory harvested tests are written to
    #[arg(long, default_value = "./e2e-tests")]
    pub tests_dir: PathBuf,

    /// Empty the tests directory beforehand
    #[arg(short, long)]
    pub clean: bool,

    /// Path and file name of the generated archive
    #[arg(short, long, default_value = "./scm-manager-e2e-tests.zip")]
    pub out_path: PathBuf,

    /// Don't create the archive
    #[arg(short, long)]
    pub skip_archive: bool,
}

pub async fn run(args: CollectArgs, settings: &HarnessSettings) -> Result<()> {
    info!(tests_dir = %args.tests_dir.display(), "Starting collection");

    if args.clean {
        info!("Cleaning tests directory");
        empty_dir(&args.tests_dir).await?;
    } else {
        tokio::fs::create_dir_all(&args.tests_dir).await?;
    }

    Harvester::from_settings(settings)?
        .harvest_all(&args.tests_dir)
        .await?;

    if args.skip_archive {
        info!("Skipping archive");
    } else {
        info!(archive = %args.out_path.display(), "Writing archive");
        let entries = archive_directory(args.tests_dir.clone(), args.out_path.clone()).await?;
        info!(entries, "Archive written");
    }

    info!("Done");
    Ok(())
}

/// Zip the contents of `source` into `archive`, entries relative to `source`.
///
/// Returns the number of files written.
pub async fn archive_directory(source: PathBuf, archive: PathBuf) -> Result<usize> {
    tokio::task::spawn_blocking(move || write_archive(&source, &archive))
        .await
        .cmd_err()?
}

fn write_archive(source: &Path, archive: &Path) -> Result<usize> {
    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let archive_abs = std::path::absolute(archive)?;

    let mut zip = ZipWriter::new(BufWriter::new(File::create(archive)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files = 0usize;

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(source) else {
            continue;
        };
        if relative.as_os_str().is_empty() || std::path::absolute(path)? == archive_abs {
            continue;
        }

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            debug!(entry = %name, "Adding to archive");
            zip.start_file(name, options)?;
            io::copy(&mut File::open(path)?, &mut zip)?;
            files += 1;
        }
    }

    zip.finish()?;
    Ok(files)
}

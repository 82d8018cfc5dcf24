//! Recursive directory synchronization
//!
//! Mirrors the files of one directory tree into another, keeping relative
//! paths. Used by the extractor to move artifacts out of a checkout and by
//! provisioning to copy harvested artifacts into a runnable project.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, trace};

use crate::error::IoResultExt;
use crate::Result;

/// How files reach the destination tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Leave the source file in place
    Copy,
    /// Remove the source file once it has been transferred
    Move,
}

/// Filter accepting every file
pub fn accept_all(_name: &str) -> bool {
    true
}

/// Filter accepting files whose extension is one of `extensions`
pub fn has_extension<'a>(extensions: &'a [&'a str]) -> impl Fn(&str) -> bool + 'a {
    move |name| {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e))
            .unwrap_or(false)
    }
}

/// Filter rejecting files called exactly `excluded`
pub fn not_named(excluded: &str) -> impl Fn(&str) -> bool + '_ {
    move |name| name != excluded
}

/// Transfer every file below `source_root` accepted by `filter` to the same
/// relative path below `dest_root`.
///
/// A missing `source_root` is not an error: nothing is transferred and the
/// destination is left untouched. Destination directories are only created
/// for files that are actually transferred. Existing destination files are
/// overwritten. The first failing transfer aborts the walk.
pub async fn sync_tree<F>(
    source_root: &Path,
    dest_root: &Path,
    mode: TransferMode,
    filter: F,
) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    if !fs::try_exists(source_root).await.at_path(source_root)? {
        debug!(path = %source_root.display(), "Source does not exist, skipping");
        return Ok(());
    }

    let mut pending = vec![PathBuf::new()];
    let mut transferred = 0usize;

    while let Some(relative) = pending.pop() {
        let current = source_root.join(&relative);
        let mut entries = fs::read_dir(&current).await.at_path(&current)?;

        while let Some(entry) = entries.next_entry().await.at_path(&current)? {
            let path = entry.path();
            let metadata = fs::metadata(&path).await.at_path(&path)?;
            let child = relative.join(entry.file_name());

            if metadata.is_dir() {
                pending.push(child);
            } else if metadata.is_file() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if !filter(&name) {
                    trace!(file = %path.display(), "Filtered out");
                    continue;
                }
                transfer(&path, &dest_root.join(&child), mode).await?;
                transferred += 1;
            }
        }
    }

    trace!(
        from = %source_root.display(),
        to = %dest_root.display(),
        ?mode,
        files = transferred,
        "Directory synchronized"
    );
    Ok(())
}

/// Make `dir` an existing, empty directory, removing whatever it held
pub async fn empty_dir(dir: &Path) -> Result<()> {
    if fs::try_exists(dir).await.at_path(dir)? {
        fs::remove_dir_all(dir).await.at_path(dir)?;
    }
    fs::create_dir_all(dir).await.at_path(dir)
}

async fn transfer(from: &Path, to: &Path, mode: TransferMode) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await.at_path(parent)?;
    }

    trace!(from = %from.display(), to = %to.display(), ?mode, "Transferring file");
    match mode {
        TransferMode::Copy => {
            fs::copy(from, to).await.at_path(from)?;
        }
        TransferMode::Move => {
            // rename fails across filesystems; fall back to copy + remove
            if fs::rename(from, to).await.is_err() {
                fs::copy(from, to).await.at_path(from)?;
                fs::remove_file(from).await.at_path(from)?;
            }
        }
    }
    Ok(())
}

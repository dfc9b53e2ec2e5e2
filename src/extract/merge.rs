//! Moving staged extracts into their destination

use super::coordinator::ExtractPhase;
use super::{ExtractError, Result};
use crate::progress::{EventKind, ProgressChannel};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// One archive's extracted output waiting to be merged
#[derive(Debug)]
pub struct StagedExtract {
    pub source: PathBuf,
    pub staging: TempDir,
    pub destination: PathBuf,
}

impl StagedExtract {
    pub fn name(&self) -> String {
        archive_name(&self.source)
    }
}

/// File name of an archive, for progress messages
pub(crate) fn archive_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Move everything inside `source` into `dest`, overwriting what is already there
///
/// Existing destination content that is not overwritten is kept. Emptied
/// source subdirectories are removed; `source` itself is left in place.
/// Returns the number of files moved.
pub fn move_tree(source: &Path, dest: &Path) -> Result<usize> {
    if !source.is_dir() {
        return Err(ExtractError::NotADirectory(source.to_path_buf()));
    }
    fs::create_dir_all(dest)?;

    let entries = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut moved = 0;
    let mut source_dirs = Vec::new();
    for entry in &entries {
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            if target.exists() && !target.is_dir() {
                fs::remove_file(&target)?;
            }
            fs::create_dir_all(&target)?;
            source_dirs.push(entry.path().to_path_buf());
            continue;
        }

        if target.is_dir() {
            fs::remove_dir_all(&target)?;
        }
        move_file(entry.path(), &target)?;
        moved += 1;
    }

    for dir in source_dirs.iter().rev() {
        fs::remove_dir(dir)?;
    }

    tracing::debug!(
        "Moved {} files from {} to {}",
        moved,
        source.display(),
        dest.display()
    );
    Ok(moved)
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // staging may live on another filesystem
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Remove every entry inside `dir`, keeping `dir` itself
///
/// `on_removed` is called after each top-level entry with
/// `(removed_so_far, total, path)`. Returns the number of entries removed.
pub async fn delete_contents<F>(dir: &Path, mut on_removed: F) -> Result<usize>
where
    F: FnMut(usize, usize, &Path),
{
    let metadata = tokio::fs::metadata(dir).await?;
    if !metadata.is_dir() {
        return Err(ExtractError::NotADirectory(dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();

    let total = entries.len();
    for (index, path) in entries.iter().enumerate() {
        if tokio::fs::symlink_metadata(path).await?.is_dir() {
            tokio::fs::remove_dir_all(path).await?;
        } else {
            tokio::fs::remove_file(path).await?;
        }
        on_removed(index + 1, total, path);
    }
    Ok(total)
}

/// Merge staged extracts in the order given, one progress event per archive
///
/// Each staging directory is removed once its content has been moved.
pub async fn merge_extracts(staged: Vec<StagedExtract>, channel: &ProgressChannel) -> Result<usize> {
    let total = staged.len();
    let mut files = 0;

    for (index, extract) in staged.into_iter().enumerate() {
        let name = extract.name();
        tracing::info!(
            "Merging database extract {} into {}",
            name,
            extract.destination.display()
        );

        files += tokio::task::spawn_blocking(move || -> Result<usize> {
            let moved = move_tree(extract.staging.path(), &extract.destination)?;
            extract.staging.close().map_err(ExtractError::Staging)?;
            Ok(moved)
        })
        .await??;

        channel.emit(ExtractPhase::Merging.event(
            EventKind::Progress,
            index + 1,
            total,
            format!("Merging database extract {}...", name),
        ));
    }

    tracing::debug!("Merging extracts complete, {} files moved", files);
    Ok(files)
}

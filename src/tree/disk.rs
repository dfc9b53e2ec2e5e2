//! Loading mod trees from disk and writing normalized trees back

use super::{to_fs_path, FileTree};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A filesystem change needed to make a directory match its (edited) tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskChange {
    /// Delete the file at this relative path
    Remove(String),
    /// Rename a file from one relative path to another
    Move { from: String, to: String },
}

/// A `FileTree` loaded from a real directory
///
/// Every file node remembers the relative path it was loaded from, so edits
/// made through the tree primitives can be replayed onto the directory.
#[derive(Debug, Clone)]
pub struct DiskTree {
    root: PathBuf,
    tree: FileTree,
    originals: Vec<String>,
}

impl DiskTree {
    /// Load a directory, naming the tree root after the directory itself
    pub fn load(root: &Path) -> Result<Self> {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::load_named(root, &name)
    }

    /// Load a directory with an explicit root name
    pub fn load_named(root: &Path, name: &str) -> Result<Self> {
        if !root.is_dir() {
            bail!("Mod directory not found: {}", root.display());
        }

        let mut tree = FileTree::new(name);
        let mut originals = Vec::new();

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
            let relative = tree_path(
                entry
                    .path()
                    .strip_prefix(root)
                    .context("Walked outside of the mod directory")?,
            );

            let (parent_path, entry_name) = match relative.rsplit_once('/') {
                Some((parent, name)) => (parent, name),
                None => ("", relative.as_str()),
            };
            let parent = tree.add_directory_path(parent_path)?;
            if let Some(existing) = tree.find_child(parent, entry_name) {
                bail!(
                    "'{}' collides with '{}', which differs only by case",
                    relative,
                    tree.path(existing, '/')
                );
            }

            if entry.file_type().is_dir() {
                tree.add_directory(parent, entry_name)?;
            } else {
                tree.add_file(parent, entry_name, Some(relative.clone()))?;
                originals.push(relative);
            }
        }

        tracing::debug!(
            "Loaded {} files from {} as tree '{}'",
            originals.len(),
            root.display(),
            name
        );

        Ok(Self {
            root: root.to_path_buf(),
            tree,
            originals,
        })
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut FileTree {
        &mut self.tree
    }

    /// Diff the current tree against what was loaded
    ///
    /// Removals come first, then moves, mirroring the order in which the
    /// tree itself was edited.
    pub fn plan(&self) -> Vec<DiskChange> {
        let mut surviving = HashSet::new();
        let mut moves = Vec::new();

        for id in self.tree.files(self.tree.root()) {
            let Some(origin) = self.tree.origin(id) else {
                continue;
            };
            surviving.insert(origin);
            let current = self.tree.path(id, '/');
            if current != origin {
                moves.push(DiskChange::Move {
                    from: origin.to_string(),
                    to: current,
                });
            }
        }

        let mut changes: Vec<DiskChange> = self
            .originals
            .iter()
            .filter(|original| !surviving.contains(original.as_str()))
            .map(|original| DiskChange::Remove(original.clone()))
            .collect();
        changes.extend(moves);
        changes
    }

    /// Apply planned changes to the directory, then remove empty directories
    pub fn apply(&self, changes: &[DiskChange]) -> Result<ApplyStats> {
        let mut stats = ApplyStats::default();

        for change in changes {
            match change {
                DiskChange::Remove(relative) => {
                    let path = self.root.join(to_fs_path(relative));
                    std::fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove {}", path.display()))?;
                    stats.removed += 1;
                }
                DiskChange::Move { from, to } => {
                    let source = self.root.join(to_fs_path(from));
                    let dest = self.root.join(to_fs_path(to));
                    // a case-only rename points at the same file on case-insensitive filesystems
                    if !from.eq_ignore_ascii_case(to) && dest.exists() {
                        bail!("Refusing to overwrite {}", dest.display());
                    }
                    if let Some(parent) = dest.parent() {
                        std::fs::create_dir_all(parent).with_context(|| {
                            format!("Failed to create directory {}", parent.display())
                        })?;
                    }
                    std::fs::rename(&source, &dest).with_context(|| {
                        format!("Failed to move {} to {}", source.display(), dest.display())
                    })?;
                    stats.moved += 1;
                }
            }
        }

        stats.pruned = prune_empty_dirs(&self.root)?;

        tracing::info!(
            "Applied mod fix in {}: {} removed, {} moved, {} empty directories pruned",
            self.root.display(),
            stats.removed,
            stats.moved,
            stats.pruned
        );
        Ok(stats)
    }
}

/// Counts of what `DiskTree::apply` did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub removed: usize,
    pub moved: usize,
    pub pruned: usize,
}

/// Remove every empty directory below `root` (never `root` itself)
pub fn prune_empty_dirs(root: &Path) -> Result<usize> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let is_empty = std::fs::read_dir(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .next()
            .is_none();
        if is_empty {
            std::fs::remove_dir(path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Render a relative filesystem path with `/` separators
fn tree_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

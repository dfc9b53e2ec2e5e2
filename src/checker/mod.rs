//! Mod tree validation and normalization
//!
//! `ModDataChecker::check` folds per-file verdicts into a tree-level
//! `CheckReturn`; `ModDataChecker::fix` rewrites a tree into the canonical
//! layout by deleting disposable files, relocating misplaced ones and pruning
//! the directories that end up empty.

pub mod classify;
pub mod walk;

pub use classify::{PathClassifier, Verdict, PATH_SEPARATOR};
pub use walk::{WalkEntry, Walker};

use crate::tree::{FileTree, NodeId, TreeError};

/// Directory paths that are always checked in full
pub const ALWAYS_VALIDATE: &[&str] = &["", "overwrite"];

/// Tree-level verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckReturn {
    Invalid,
    Fixable,
    Valid,
}

impl std::fmt::Display for CheckReturn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckReturn::Invalid => write!(f, "invalid"),
            CheckReturn::Fixable => write!(f, "fixable"),
            CheckReturn::Valid => write!(f, "valid"),
        }
    }
}

/// What `fix` did to a tree
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FixReport {
    pub deleted: usize,
    pub moved: usize,
    pub pruned: usize,
    /// Paths matching no rule; left where they were
    pub unknown: Vec<String>,
    /// Fixable paths whose destination was already taken; left where they were
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModDataChecker {
    classifier: PathClassifier,
}

impl ModDataChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    /// Name substituted for `{{mod_folder}}`
    ///
    /// An unnamed root stands in for the single real top-level entry, so its
    /// first child's name is used instead.
    pub fn mod_root_name(tree: &FileTree) -> String {
        let root = tree.root();
        let name = tree.name(root);
        if name.is_empty() {
            if let Some(&first) = tree.children(root).first() {
                return tree.name(first).to_string();
            }
        }
        name.to_string()
    }

    /// Walk every leaf under `start`
    pub fn walk<'a>(
        &'a self,
        tree: &'a FileTree,
        start: NodeId,
        mod_root_name: &'a str,
        include_empty_dirs: bool,
    ) -> Walker<'a> {
        Walker::new(
            tree,
            start,
            &self.classifier,
            mod_root_name,
            include_empty_dirs,
        )
    }

    /// Decide whether the tree below `node` is valid, fixable or invalid
    ///
    /// A directory outside `ALWAYS_VALIDATE` is reported fixable without
    /// looking inside; `fix` sorts it out.
    pub fn check(&self, tree: &FileTree, node: NodeId) -> CheckReturn {
        let path = tree.path(node, PATH_SEPARATOR);
        if tree.is_dir(node) && !ALWAYS_VALIDATE.contains(&path.as_str()) {
            tracing::debug!("Deferring validation of '{}' to fix", path);
            return CheckReturn::Fixable;
        }

        let mod_root_name = Self::mod_root_name(tree);
        tracing::debug!("Scanning tree '{}' for mod '{}'", path, mod_root_name);

        let mut status = CheckReturn::Invalid;
        for entry in self.walk(tree, node, &mod_root_name, false) {
            match entry.verdict {
                Verdict::Unknown => {
                    tracing::debug!(
                        "Unknown file '{}' found, tree is invalid",
                        tree.path(entry.node, PATH_SEPARATOR)
                    );
                    return CheckReturn::Invalid;
                }
                Verdict::Fixable(_) => status = CheckReturn::Fixable,
                Verdict::Valid if status == CheckReturn::Invalid => status = CheckReturn::Valid,
                _ => {}
            }
        }

        tracing::debug!("Tree '{}' checked as {}", path, status);
        status
    }

    /// Rewrite the tree in place into the canonical layout
    pub fn fix<'t>(&self, tree: &'t mut FileTree) -> Result<&'t mut FileTree, TreeError> {
        self.fix_with_report(tree)?;
        Ok(tree)
    }

    /// `fix`, also reporting what was changed
    pub fn fix_with_report(&self, tree: &mut FileTree) -> Result<FixReport, TreeError> {
        let mod_root_name = Self::mod_root_name(tree);
        tracing::info!("Fixing file tree for mod folder '{}'", mod_root_name);

        let mut deletes = Vec::new();
        let mut moves = Vec::new();
        let mut report = FixReport::default();

        for entry in self.walk(tree, tree.root(), &mod_root_name, false) {
            match entry.verdict {
                Verdict::Delete => deletes.push(entry.node),
                Verdict::Fixable(dest) => moves.push((entry.node, dest)),
                Verdict::Unknown => {
                    let path = tree.path(entry.node, PATH_SEPARATOR);
                    tracing::debug!("Leaving unknown file '{}' in place", path);
                    report.unknown.push(path);
                }
                Verdict::Valid | Verdict::EmptyDirectory => {}
            }
        }

        for node in deletes {
            tracing::debug!("Detaching '{}'", tree.path(node, PATH_SEPARATOR));
            tree.detach(node)?;
            report.deleted += 1;
        }

        for (node, dest) in moves {
            if !tree.is_attached(node) {
                continue;
            }
            let path = tree.path(node, PATH_SEPARATOR);
            match tree.move_entry(node, &dest) {
                Ok(_) => {
                    tracing::debug!("Moved '{}' to '{}'", path, dest);
                    report.moved += 1;
                }
                Err(TreeError::Occupied(existing)) => {
                    tracing::warn!(
                        "Not moving '{}': '{}' is already in place",
                        path,
                        existing
                    );
                    report.conflicts.push(path);
                }
                Err(e) => return Err(e),
            }
        }

        report.pruned = self.prune_empty_dirs(tree)?;
        Ok(report)
    }

    /// Detach empty directories until a pass removes nothing
    ///
    /// The root is never removed. Returns the number of directories detached.
    pub fn prune_empty_dirs(&self, tree: &mut FileTree) -> Result<usize, TreeError> {
        let mut total = 0;
        loop {
            let empty: Vec<NodeId> = self
                .walk(tree, tree.root(), "", true)
                .filter(|entry| entry.verdict == Verdict::EmptyDirectory)
                .map(|entry| entry.node)
                .collect();

            if empty.is_empty() {
                return Ok(total);
            }

            tracing::debug!("Pruning {} empty directories", empty.len());
            for node in &empty {
                tree.detach(*node)?;
            }
            total += empty.len();
        }
    }
}

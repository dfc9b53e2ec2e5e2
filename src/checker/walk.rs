//! Depth-first classification walk over a `FileTree`

use super::classify::{PathClassifier, Verdict, PATH_SEPARATOR};
use crate::tree::{FileTree, NodeId};
use std::slice;

/// One classified leaf produced by `Walker`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub node: NodeId,
    pub verdict: Verdict,
}

/// Lazy walk yielding every file (and optionally every empty directory)
/// below a starting node
///
/// Directories with children are traversal points only and are never
/// yielded. The walker borrows the tree, so edits have to wait until the
/// results are collected.
pub struct Walker<'a> {
    tree: &'a FileTree,
    classifier: &'a PathClassifier,
    mod_root_name: &'a str,
    include_empty_dirs: bool,
    stack: Vec<slice::Iter<'a, NodeId>>,
}

impl<'a> Walker<'a> {
    pub fn new(
        tree: &'a FileTree,
        start: NodeId,
        classifier: &'a PathClassifier,
        mod_root_name: &'a str,
        include_empty_dirs: bool,
    ) -> Self {
        Self {
            tree,
            classifier,
            mod_root_name,
            include_empty_dirs,
            stack: vec![tree.children(start).iter()],
        }
    }
}

impl Iterator for Walker<'_> {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        loop {
            let level = self.stack.last_mut()?;
            let Some(&node) = level.next() else {
                self.stack.pop();
                continue;
            };

            if self.tree.is_dir(node) {
                if !self.tree.is_empty(node) {
                    self.stack.push(self.tree.children(node).iter());
                } else if self.include_empty_dirs {
                    return Some(WalkEntry {
                        node,
                        verdict: Verdict::EmptyDirectory,
                    });
                }
                continue;
            }

            let path = self.tree.path(node, PATH_SEPARATOR);
            let verdict = self.classifier.classify(&path, self.mod_root_name);
            return Some(WalkEntry { node, verdict });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> FileTree {
        let mut tree = FileTree::new("Foo");
        tree.add_file_path("mods/Foo/database/Foo.arz").unwrap();
        tree.add_directory_path("empty/inner").unwrap();
        tree.add_file_path("loose.arc").unwrap();
        tree.add_file_path("script.lua").unwrap();
        tree
    }

    fn collect(tree: &FileTree, include_empty_dirs: bool) -> Vec<(String, Verdict)> {
        let classifier = PathClassifier::new();
        Walker::new(tree, tree.root(), &classifier, "Foo", include_empty_dirs)
            .map(|entry| (tree.path(entry.node, '/'), entry.verdict))
            .collect()
    }

    #[test]
    fn test_walk_yields_files_in_order() {
        let tree = tree();
        assert_eq!(
            collect(&tree, false),
            vec![
                ("mods/Foo/database/Foo.arz".to_string(), Verdict::Valid),
                (
                    "loose.arc".to_string(),
                    Verdict::Fixable("mods/Foo/resources/loose.arc".to_string())
                ),
                ("script.lua".to_string(), Verdict::Unknown),
            ]
        );
    }

    #[test]
    fn test_walk_surfaces_only_leaf_empty_dirs() {
        let tree = tree();
        let entries = collect(&tree, true);
        assert_eq!(entries.len(), 4);
        // "empty" has a child, so only "empty/inner" is yielded
        assert_eq!(
            entries[1],
            ("empty/inner".to_string(), Verdict::EmptyDirectory)
        );
    }

    #[test]
    fn test_walk_is_restartable() {
        let mut tree = tree();
        assert_eq!(collect(&tree, false).len(), 3);
        let lua = tree.find("script.lua").unwrap();
        tree.detach(lua).unwrap();
        assert_eq!(collect(&tree, false).len(), 2);
    }

    #[test]
    fn test_walk_from_subdirectory() {
        let tree = tree();
        let classifier = PathClassifier::new();
        let mods = tree.find("mods").unwrap();
        let entries: Vec<_> = Walker::new(&tree, mods, &classifier, "Foo", false).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].verdict, Verdict::Valid);
    }
}

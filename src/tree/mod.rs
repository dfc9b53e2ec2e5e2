//! In-memory mod file trees
//!
//! A `FileTree` is an arena of named nodes. The root is always a directory;
//! every other node is either a file or a directory owned by exactly one
//! parent directory. Parent links are plain `NodeId`s and never own anything.
//!
//! Lookups are ASCII case-insensitive because the game itself runs on a
//! case-insensitive filesystem.

pub mod disk;

pub use disk::{DiskChange, DiskTree};

use std::path::PathBuf;
use thiserror::Error;

/// Handle to a node inside a `FileTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Errors raised by tree primitives
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("'{0}' is not a directory")]
    NotADirectory(String),

    #[error("the tree root cannot be detached or moved")]
    DetachRoot,

    #[error("cannot move '{0}' into its own subtree")]
    MoveIntoSelf(String),

    #[error("destination path is empty")]
    EmptyPath,

    #[error("'{0}' is no longer attached to the tree")]
    Detached(String),

    #[error("'{0}' already exists")]
    Occupied(String),
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File {
        /// Relative path the file had when the tree was loaded, if it came from disk
        origin: Option<String>,
    },
    Directory {
        children: Vec<NodeId>,
    },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    kind: NodeKind,
}

/// Arena-backed file tree
#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl FileTree {
    /// Create a tree with an empty root directory
    ///
    /// The root may be unnamed; its own path is always the empty string.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node {
                name: name.into(),
                parent: None,
                kind: NodeKind::Directory {
                    children: Vec::new(),
                },
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn is_dir(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Directory { .. })
    }

    pub fn is_file(&self, id: NodeId) -> bool {
        !self.is_dir(id)
    }

    /// Original relative path of a file loaded from disk
    pub fn origin(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::File { origin } => origin.as_deref(),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Children of a directory in insertion order (empty for files)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Number of direct children
    pub fn len(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn is_empty(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    /// True when the node can still be reached from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Path of a node relative to the root, joined with `separator`
    pub fn path(&self, id: NodeId, separator: char) -> String {
        let mut parts = Vec::new();
        let mut current = id;
        while current != self.root {
            parts.push(self.nodes[current.0].name.as_str());
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        parts.reverse();
        let mut path = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                path.push(separator);
            }
            path.push_str(part);
        }
        path
    }

    /// Find a direct child by name (case-insensitive)
    pub fn find_child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.children(dir)
            .iter()
            .copied()
            .find(|&child| self.nodes[child.0].name.eq_ignore_ascii_case(name))
    }

    /// Resolve a path relative to the root. Both `/` and `\` separate components.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root;
        for part in split_path(path) {
            current = self.find_child(current, part)?;
        }
        Some(current)
    }

    /// Add (or reuse) a directory named `name` under `parent`
    pub fn add_directory(&mut self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
        self.require_dir(parent)?;
        if let Some(existing) = self.find_child(parent, name) {
            if self.is_dir(existing) {
                return Ok(existing);
            }
            return Err(TreeError::NotADirectory(self.path(existing, '/')));
        }
        Ok(self.push_node(
            parent,
            name,
            NodeKind::Directory {
                children: Vec::new(),
            },
        ))
    }

    /// Add a file under `parent`, replacing any entry with the same name
    pub fn add_file(
        &mut self,
        parent: NodeId,
        name: &str,
        origin: Option<String>,
    ) -> Result<NodeId, TreeError> {
        self.require_dir(parent)?;
        if let Some(existing) = self.find_child(parent, name) {
            self.unlink(existing);
        }
        Ok(self.push_node(parent, name, NodeKind::File { origin }))
    }

    /// Create every directory along `path` and return the last one
    pub fn add_directory_path(&mut self, path: &str) -> Result<NodeId, TreeError> {
        let mut current = self.root;
        for part in split_path(path) {
            current = self.add_directory(current, part)?;
        }
        Ok(current)
    }

    /// Add a file at `path`, creating intermediate directories
    pub fn add_file_path(&mut self, path: &str) -> Result<NodeId, TreeError> {
        let parts = split_path(path);
        let Some((name, dirs)) = parts.split_last() else {
            return Err(TreeError::EmptyPath);
        };
        let mut current = self.root;
        for part in dirs {
            current = self.add_directory(current, part)?;
        }
        self.add_file(current, name, None)
    }

    /// Remove a node (and its subtree) from its parent
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::DetachRoot);
        }
        if !self.is_attached(id) {
            return Err(TreeError::Detached(self.nodes[id.0].name.clone()));
        }
        self.unlink(id);
        Ok(())
    }

    /// Move a node to `path` (relative to the root)
    ///
    /// The last component of `path` becomes the node's name and missing
    /// intermediate directories are created. Moving a directory onto an
    /// existing directory merges their contents. Any other existing entry at
    /// the destination is left alone and the move fails with `Occupied`,
    /// leaving the tree unchanged.
    pub fn move_entry(&mut self, id: NodeId, path: &str) -> Result<NodeId, TreeError> {
        if id == self.root {
            return Err(TreeError::DetachRoot);
        }
        if !self.is_attached(id) {
            return Err(TreeError::Detached(self.nodes[id.0].name.clone()));
        }

        let parts: Vec<String> = split_path(path).into_iter().map(str::to_string).collect();
        let Some((name, dirs)) = parts.split_last() else {
            return Err(TreeError::EmptyPath);
        };

        // Validate against the existing tree before creating anything.
        let mut cursor = Some(self.root);
        for part in dirs {
            let Some(dir) = cursor else {
                break;
            };
            cursor = match self.find_child(dir, part) {
                Some(found) if found == id => {
                    return Err(TreeError::MoveIntoSelf(self.path(id, '/')));
                }
                Some(found) => Some(found),
                None => None,
            };
        }
        if let Some(existing) = cursor.and_then(|dir| self.find_child(dir, name)) {
            if existing != id && !(self.is_dir(existing) && self.is_dir(id)) {
                return Err(TreeError::Occupied(self.path(existing, '/')));
            }
        }

        let mut dir = self.root;
        for part in dirs {
            dir = self.add_directory(dir, part)?;
        }

        if let Some(existing) = self.find_child(dir, name) {
            if existing == id {
                self.nodes[id.0].name = name.clone();
                return Ok(id);
            }
            return self.merge_directory(id, existing);
        }

        self.unlink(id);
        self.nodes[id.0].name = name.clone();
        self.link(dir, id);
        Ok(id)
    }

    /// Move every child of `from` into `into`, then drop `from` if it emptied
    ///
    /// Children whose names are taken in `into` stay behind and the first
    /// such clash is reported as `Occupied`.
    fn merge_directory(&mut self, from: NodeId, into: NodeId) -> Result<NodeId, TreeError> {
        let mut occupied = None;
        for child in self.children(from).to_vec() {
            let child_path = format!("{}/{}", self.path(into, '/'), self.nodes[child.0].name);
            match self.move_entry(child, &child_path) {
                Ok(_) => {}
                Err(TreeError::Occupied(path)) => {
                    occupied.get_or_insert(path);
                }
                Err(e) => return Err(e),
            }
        }
        match occupied {
            Some(path) => Err(TreeError::Occupied(path)),
            None => {
                self.unlink(from);
                Ok(into)
            }
        }
    }

    /// All attached file nodes below `from`, depth-first in insertion order
    pub fn files(&self, from: NodeId) -> Vec<NodeId> {
        let mut files = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            match &self.nodes[id.0].kind {
                NodeKind::File { .. } => files.push(id),
                NodeKind::Directory { children } => stack.extend(children.iter().rev()),
            }
        }
        files
    }

    fn require_dir(&self, id: NodeId) -> Result<(), TreeError> {
        if self.is_dir(id) {
            Ok(())
        } else {
            Err(TreeError::NotADirectory(self.path(id, '/')))
        }
    }

    fn push_node(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            parent: None,
            kind,
        });
        self.link(parent, id);
        id
    }

    fn link(&mut self, parent: NodeId, id: NodeId) {
        if let NodeKind::Directory { children } = &mut self.nodes[parent.0].kind {
            children.push(id);
        }
        self.nodes[id.0].parent = Some(parent);
    }

    fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            if let NodeKind::Directory { children } = &mut self.nodes[parent.0].kind {
                children.retain(|&child| child != id);
            }
        }
    }
}

/// Split a tree path on `/` and `\`, dropping empty components
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .collect()
}

/// Convert a tree path into a relative filesystem path
pub fn to_fs_path(path: &str) -> PathBuf {
    split_path(path).into_iter().collect()
}

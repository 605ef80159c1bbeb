//! Bidirectional inode ↔ path mapping for the FUSE adapter
//!
//! Paths are relative to the mount root; the root itself is the empty path.
//! Keys are `PathBuf` so names that are not valid UTF-8 survive unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Bidirectional mapping between inodes and mount-relative paths
#[derive(Debug)]
pub struct InodeTable {
    path_to_inode: HashMap<PathBuf, u64>,
    inode_to_path: HashMap<u64, PathBuf>,
    /// Next available inode number (1 is the root)
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
            next_inode: Self::ROOT_INODE + 1,
        };
        table.path_to_inode.insert(PathBuf::new(), Self::ROOT_INODE);
        table.inode_to_path.insert(Self::ROOT_INODE, PathBuf::new());
        table
    }

    /// Get or create an inode for a path
    pub fn get_or_create(&mut self, path: &Path) -> u64 {
        if let Some(&inode) = self.path_to_inode.get(path) {
            return inode;
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(path.to_path_buf(), inode);
        self.inode_to_path.insert(inode, path.to_path_buf());
        inode
    }

    #[cfg(test)]
    pub fn get_inode(&self, path: &Path) -> Option<u64> {
        self.path_to_inode.get(path).copied()
    }

    pub fn get_path(&self, inode: u64) -> Option<&Path> {
        self.inode_to_path.get(&inode).map(PathBuf::as_path)
    }

    /// Drop the mapping for a path. The root is never removed.
    pub fn remove_by_path(&mut self, path: &Path) -> Option<u64> {
        if path.as_os_str().is_empty() {
            return None;
        }
        let inode = self.path_to_inode.remove(path)?;
        self.inode_to_path.remove(&inode);
        Some(inode)
    }

    /// Move `from` and everything below it to `to`, keeping inode numbers.
    ///
    /// A mapping previously held by `to` is dropped, matching the replace
    /// semantics of `rename(2)`.
    pub fn rename(&mut self, from: &Path, to: &Path) {
        self.remove_by_path(to);

        let moved: Vec<(PathBuf, u64)> = self
            .path_to_inode
            .iter()
            .filter(|(path, _)| path.starts_with(from) && !from.as_os_str().is_empty())
            .map(|(path, inode)| (path.clone(), *inode))
            .collect();

        for (old, inode) in moved {
            self.path_to_inode.remove(&old);
            let new = match old.strip_prefix(from) {
                Ok(rest) if rest.as_os_str().is_empty() => to.to_path_buf(),
                Ok(rest) => to.join(rest),
                Err(_) => continue,
            };
            self.inode_to_path.insert(inode, new.clone());
            self.path_to_inode.insert(new, inode);
        }
    }

    /// Parent of a mount-relative path; the root is its own parent.
    pub fn parent_path(path: &Path) -> PathBuf {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

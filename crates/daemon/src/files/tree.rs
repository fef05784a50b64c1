//! Recursive tree walking.
//!
//! [`TreeWalker`] yields the qualifying descendants of a directory as a lazy
//! iterator. Directory sizes and zip archives are both folds over it, so the
//! skip rules live in one place.

use std::path::{Path, PathBuf};

use protocol::EntryKind;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::policy::FilePolicy;

/// A qualifying descendant found by [`TreeWalker::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the walked directory, `/`-separated.
    pub relative: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Byte length for files, 0 for directories.
    pub size: u64,
}

/// Walks directory trees without following symlinks.
#[derive(Debug, Clone, Copy)]
pub struct TreeWalker<'a> {
    policy: &'a FilePolicy,
    include_hidden: bool,
}

impl<'a> TreeWalker<'a> {
    pub fn new(policy: &'a FilePolicy, include_hidden: bool) -> Self {
        Self {
            policy,
            include_hidden,
        }
    }

    /// Lazily walk the descendants of `dir` in file-name order.
    ///
    /// Symlinks, reserved names, blocked files and (unless hidden files are
    /// included) dot-entries are skipped; a skipped directory is not
    /// descended into. Unreadable entries are logged and skipped.
    pub fn walk(self, dir: &Path) -> impl Iterator<Item = TreeEntry> + 'a {
        let base = dir.to_path_buf();
        let walker = self;

        WalkDir::new(dir)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| walker.qualifies(entry))
            .filter_map(move |result| match result {
                Ok(entry) => to_tree_entry(&base, entry),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry during walk");
                    None
                }
            })
    }

    /// Recursive sum of qualifying file sizes under `dir`.
    pub fn directory_size(self, dir: &Path) -> u64 {
        self.walk(dir)
            .filter(|entry| entry.kind == EntryKind::File)
            .map(|entry| entry.size)
            .sum()
    }

    fn qualifies(&self, entry: &DirEntry) -> bool {
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            debug!(path = ?entry.path(), "Skipping symlink during walk");
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        self.policy
            .admits(&name, file_type.is_dir(), self.include_hidden)
    }
}

fn to_tree_entry(base: &Path, entry: DirEntry) -> Option<TreeEntry> {
    let file_type = entry.file_type();
    let kind = if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        return None;
    };

    let size = match kind {
        EntryKind::File => entry.metadata().map(|m| m.len()).unwrap_or(0),
        EntryKind::Dir => 0,
    };

    let relative = entry
        .path()
        .strip_prefix(base)
        .ok()?
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    Some(TreeEntry {
        path: entry.into_path(),
        relative,
        kind,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn policy() -> FilePolicy {
        FilePolicy::new(["php"], ["index.php"], false)
    }

    fn create_tree(root: &Path) {
        fs::create_dir_all(root.join("docs/sub")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("docs/a.txt"), vec![b'a'; 10]).unwrap();
        fs::write(root.join("docs/sub/b.txt"), vec![b'b'; 20]).unwrap();
        fs::write(root.join("docs/shell.php"), vec![b'p'; 100]).unwrap();
        fs::write(root.join("docs/.env"), vec![b'e'; 7]).unwrap();
        fs::write(root.join(".git/config"), vec![b'g'; 50]).unwrap();
        fs::write(root.join("index.php"), vec![b'i'; 5]).unwrap();
    }

    #[test]
    fn test_walk_skip_rules() {
        let temp_dir = TempDir::new().unwrap();
        create_tree(temp_dir.path());
        let policy = policy();

        let entries: Vec<String> = TreeWalker::new(&policy, false)
            .walk(temp_dir.path())
            .map(|e| e.relative)
            .collect();

        assert_eq!(entries, vec!["docs", "docs/a.txt", "docs/sub", "docs/sub/b.txt"]);
    }

    #[test]
    fn test_walk_with_hidden() {
        let temp_dir = TempDir::new().unwrap();
        create_tree(temp_dir.path());
        let policy = policy();

        let entries: Vec<String> = TreeWalker::new(&policy, true)
            .walk(temp_dir.path())
            .map(|e| e.relative)
            .collect();

        assert!(entries.contains(&".git/config".to_string()));
        assert!(entries.contains(&"docs/.env".to_string()));
        assert!(!entries.contains(&"docs/shell.php".to_string()));
        assert!(!entries.contains(&"index.php".to_string()));
    }

    #[test]
    fn test_directory_size() {
        let temp_dir = TempDir::new().unwrap();
        create_tree(temp_dir.path());
        let policy = policy();

        let walker = TreeWalker::new(&policy, false);
        assert_eq!(walker.directory_size(&temp_dir.path().join("docs")), 30);
        assert_eq!(walker.directory_size(temp_dir.path()), 30);
    }

    #[test]
    fn test_symlinks_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("big.bin"), vec![0u8; 1000]).unwrap();
        fs::write(temp_dir.path().join("small.txt"), "x").unwrap();
        symlink(outside.path(), temp_dir.path().join("linked_dir")).unwrap();
        symlink(outside.path().join("big.bin"), temp_dir.path().join("linked.bin")).unwrap();

        let policy = policy();
        let walker = TreeWalker::new(&policy, false);

        let entries: Vec<String> = walker.walk(temp_dir.path()).map(|e| e.relative).collect();
        assert_eq!(entries, vec!["small.txt"]);
        assert_eq!(walker.directory_size(temp_dir.path()), 1);
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let policy = policy();
        assert_eq!(
            TreeWalker::new(&policy, false)
                .walk(temp_dir.path())
                .count(),
            0
        );
    }
}

//! Name-based filtering rules.
//!
//! A single [`FilePolicy`] decides which names are blocked, reserved or
//! hidden. Listing, transfer, archive and mutation code all consult the
//! same instance so the rules cannot drift apart.

use std::collections::HashSet;

use crate::config::StorageConfig;

/// Name prefix of in-flight upload spool files, which share the target
/// directory until they are persisted.
pub const UPLOAD_SPOOL_PREFIX: &str = ".pathgate-upload-";

/// Blocked extensions, reserved names and hidden-file handling.
#[derive(Debug, Clone, Default)]
pub struct FilePolicy {
    /// Lowercased extensions without the leading dot.
    blocked_extensions: HashSet<String>,
    /// Lowercased reserved file names.
    reserved_names: HashSet<String>,
    /// Whether dot-files are visible.
    show_hidden: bool,
}

impl FilePolicy {
    /// Create a policy from raw lists. Extensions may carry a leading dot.
    pub fn new<E, R>(blocked_extensions: E, reserved_names: R, show_hidden: bool) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self {
            blocked_extensions: blocked_extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            reserved_names: reserved_names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
            show_hidden,
        }
    }

    /// Build the policy from the `[storage]` section.
    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(
            &storage.blocked_extensions,
            &storage.reserved_names,
            storage.show_hidden,
        )
    }

    /// Whether dot-files are visible.
    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    /// Whether the final extension of `name` is on the denylist.
    ///
    /// Trailing dots and spaces are ignored (`shell.php.` is still PHP) and
    /// the comparison is case-insensitive.
    pub fn is_blocked(&self, name: &str) -> bool {
        extension(name)
            .map(|ext| self.blocked_extensions.contains(&ext))
            .unwrap_or(false)
    }

    /// Whether `name` is a reserved file name or an upload spool file.
    pub fn is_reserved(&self, name: &str) -> bool {
        name.starts_with(UPLOAD_SPOOL_PREFIX) || self.reserved_names.contains(&name.to_lowercase())
    }

    /// Whether `name` is a dot-file.
    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }

    /// Whether an entry called `name` may appear in listings and archives.
    ///
    /// Directories are never filtered by extension.
    pub fn admits(&self, name: &str, is_dir: bool, include_hidden: bool) -> bool {
        if name == "." || name == ".." || self.is_reserved(name) {
            return false;
        }
        if !include_hidden && Self::is_hidden(name) {
            return false;
        }
        is_dir || !self.is_blocked(name)
    }
}

/// Lowercased final extension, ignoring trailing dots and spaces.
fn extension(name: &str) -> Option<String> {
    let trimmed = name.trim_end_matches(['.', ' ']);
    let (_, ext) = trimmed.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FilePolicy {
        FilePolicy::new(
            ["php", ".exe", "htaccess"],
            ["index.php", "config.json"],
            false,
        )
    }

    #[test]
    fn test_blocked_final_extension_only() {
        let policy = policy();
        assert!(policy.is_blocked("shell.php"));
        assert!(policy.is_blocked("SHELL.PHP"));
        assert!(policy.is_blocked("archive.tar.php"));
        assert!(!policy.is_blocked("shell.php.txt"));
        assert!(!policy.is_blocked("php"));
        assert!(!policy.is_blocked("notes.txt"));
    }

    #[test]
    fn test_blocked_ignores_trailing_dots_and_spaces() {
        let policy = policy();
        assert!(policy.is_blocked("shell.php."));
        assert!(policy.is_blocked("shell.php .."));
        assert!(policy.is_blocked("setup.exe"));
    }

    #[test]
    fn test_blocked_dotfile_extension() {
        assert!(policy().is_blocked(".htaccess"));
    }

    #[test]
    fn test_reserved_case_insensitive() {
        let policy = policy();
        assert!(policy.is_reserved("index.php"));
        assert!(policy.is_reserved("Config.JSON"));
        assert!(!policy.is_reserved("index.html"));
    }

    #[test]
    fn test_upload_spool_files_are_reserved() {
        let policy = FilePolicy::new(Vec::<String>::new(), Vec::<String>::new(), true);
        let spool = format!("{}a1B2c3", UPLOAD_SPOOL_PREFIX);
        assert!(policy.is_reserved(&spool));
        assert!(!policy.admits(&spool, false, true));
        assert!(policy.admits(".pathgate", false, true));
    }

    #[test]
    fn test_admits() {
        let policy = policy();
        assert!(policy.admits("notes.txt", false, false));
        assert!(!policy.admits("shell.php", false, false));
        // Directories are not filtered by extension
        assert!(policy.admits("legacy.php", true, false));
        assert!(!policy.admits(".git", true, false));
        assert!(policy.admits(".git", true, true));
        assert!(!policy.admits("config.json", false, true));
        assert!(!policy.admits("..", true, true));
    }

    #[test]
    fn test_from_config() {
        let storage = StorageConfig::default();
        let policy = FilePolicy::from_config(&storage);
        assert!(policy.is_blocked("a.phtml"));
        assert!(policy.is_reserved("users.json"));
        assert!(!policy.show_hidden());
    }
}

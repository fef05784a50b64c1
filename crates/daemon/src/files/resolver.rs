//! Containment-checked path resolution.
//!
//! Every request path is untrusted. [`PathResolver`] joins it to the root,
//! refuses to walk through symlinks, canonicalizes the result and proves the
//! canonical path still lives under the canonical root. Nothing else in the
//! crate touches a user-supplied path directly.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use protocol::EntryKind;
use tracing::{debug, warn};

use super::error::FileError;
use super::policy::FilePolicy;

/// An absolute path proven to lie inside the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path (canonical for existing entries).
    path: PathBuf,
    /// Root-relative form, `/`-separated, empty for the root.
    relative: String,
    /// Entry kind once stat'd; `None` for a creation target.
    kind: Option<EntryKind>,
}

impl ResolvedPath {
    /// Absolute path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root-relative, `/`-separated form.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Entry kind, if the path exists.
    pub fn kind(&self) -> Option<EntryKind> {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == Some(EntryKind::Dir)
    }

    pub fn is_file(&self) -> bool {
        self.kind == Some(EntryKind::File)
    }

    /// Whether this is the root itself.
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or_default()
    }

    /// Root-relative path of a child called `name`.
    pub fn child_relative(&self, name: &str) -> String {
        join_relative(&self.relative, name)
    }
}

/// Resolves untrusted relative paths against a fixed root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Canonical root directory.
    root: PathBuf,
    /// Shared naming rules.
    policy: Arc<FilePolicy>,
}

impl PathResolver {
    /// Create a resolver for `root`, which must be an existing directory.
    pub fn new(root: &Path, policy: FilePolicy) -> io::Result<Self> {
        let root = fs::canonicalize(root)?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("root is not a directory: {}", root.display()),
            ));
        }
        Ok(Self {
            root,
            policy: Arc::new(policy),
        })
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Naming rules applied alongside resolution.
    pub fn policy(&self) -> &FilePolicy {
        &self.policy
    }

    /// Resolve an existing entry.
    ///
    /// `""`, `"."` and `"/"` all name the root. Leading and trailing
    /// separators are ignored so an absolute-looking input stays under the
    /// root.
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, FileError> {
        if relative.contains('\0') {
            warn!(path = %relative.escape_debug(), "Rejected path containing NUL byte");
            return Err(FileError::Traversal(relative.escape_debug().to_string()));
        }

        let trimmed = relative.trim_matches('/');
        let joined = self.walk(trimmed, relative)?;

        let canonical = fs::canonicalize(&joined).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FileError::NotFound(relative.to_string())
            } else {
                debug!(path = %relative, error = %e, "Canonicalization failed");
                FileError::Traversal(relative.to_string())
            }
        })?;

        if !self.contains(&canonical) {
            warn!(path = %relative, "Path resolved outside the root");
            return Err(FileError::Traversal(relative.to_string()));
        }

        let relative_form = self.relative_form(&canonical)?;
        if relative_form
            .split('/')
            .any(|segment| self.policy.is_reserved(segment))
        {
            debug!(path = %relative, "Reserved name requested");
            return Err(FileError::NotFound(relative.to_string()));
        }
        if !self.policy.show_hidden() && relative_form.split('/').any(FilePolicy::is_hidden) {
            debug!(path = %relative, "Hidden path requested");
            return Err(FileError::NotFound(relative.to_string()));
        }

        let metadata = fs::metadata(&canonical).map_err(|e| FileError::from_io(e, relative))?;
        let kind = if metadata.is_dir() {
            EntryKind::Dir
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            // Sockets, FIFOs and devices are never served.
            return Err(FileError::NotFound(relative.to_string()));
        };

        Ok(ResolvedPath {
            path: canonical,
            relative: relative_form,
            kind: Some(kind),
        })
    }

    /// Resolve a path that must be an existing directory.
    pub fn resolve_dir(&self, relative: &str) -> Result<ResolvedPath, FileError> {
        let resolved = self.resolve(relative)?;
        if !resolved.is_dir() {
            return Err(FileError::NotFound(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Resolve a creation target: `name` inside the existing directory
    /// `parent`.
    ///
    /// The leaf must be a single plain component and must not exist yet.
    pub fn resolve_new(&self, parent: &str, name: &str) -> Result<ResolvedPath, FileError> {
        let parent = self.resolve_dir(parent)?;
        self.check_name(name)?;

        let path = parent.path().join(name);
        let relative = parent.child_relative(name);
        match fs::symlink_metadata(&path) {
            Ok(_) => return Err(FileError::Conflict(relative)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FileError::Io(e)),
        }

        Ok(ResolvedPath {
            path,
            relative,
            kind: None,
        })
    }

    /// Validate a single new path component.
    pub fn check_name(&self, name: &str) -> Result<(), FileError> {
        if name.trim().is_empty() {
            return Err(FileError::Invalid("Name cannot be empty".to_string()));
        }
        if name.contains('/') || name.contains('\\') || name.contains('\0') {
            return Err(FileError::Invalid(
                "Name cannot contain path separators".to_string(),
            ));
        }
        if name == "." || name == ".." {
            return Err(FileError::Invalid("Invalid name".to_string()));
        }
        if self.policy.is_reserved(name) {
            return Err(FileError::Invalid("Name is reserved".to_string()));
        }
        if !self.policy.show_hidden() && FilePolicy::is_hidden(name) {
            return Err(FileError::Invalid("Name cannot start with a dot".to_string()));
        }
        Ok(())
    }

    /// Containment check on the encoded bytes: `path/` must start with
    /// `root/`.
    pub fn contains(&self, path: &Path) -> bool {
        let sep = std::path::MAIN_SEPARATOR as u8;

        let mut root = self.root.as_os_str().as_encoded_bytes().to_vec();
        if root.last() != Some(&sep) {
            root.push(sep);
        }
        let mut candidate = path.as_os_str().as_encoded_bytes().to_vec();
        candidate.push(sep);

        candidate.starts_with(&root)
    }

    /// Join `trimmed` to the root one component at a time, refusing
    /// symlinks and climbs above the root.
    fn walk(&self, trimmed: &str, original: &str) -> Result<PathBuf, FileError> {
        let mut current = self.root.clone();
        let mut depth = 0usize;

        for component in Path::new(trimmed).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        warn!(path = %original, "Path climbs above the root");
                        return Err(FileError::Traversal(original.to_string()));
                    }
                    current.pop();
                    depth -= 1;
                }
                Component::Normal(segment) => {
                    current.push(segment);
                    depth += 1;
                    match fs::symlink_metadata(&current) {
                        Ok(meta) if meta.file_type().is_symlink() => {
                            warn!(path = %original, "Path walks through a symlink");
                            return Err(FileError::Traversal(original.to_string()));
                        }
                        Ok(_) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            return Err(FileError::NotFound(original.to_string()));
                        }
                        Err(e) => {
                            debug!(path = %original, error = %e, "Failed to stat path component");
                            return Err(FileError::Traversal(original.to_string()));
                        }
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(FileError::Traversal(original.to_string()));
                }
            }
        }

        Ok(current)
    }

    /// Root-relative, `/`-separated form of a contained canonical path.
    fn relative_form(&self, canonical: &Path) -> Result<String, FileError> {
        let stripped = canonical
            .strip_prefix(&self.root)
            .map_err(|_| FileError::Traversal(canonical.display().to_string()))?;

        let mut segments = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
                _ => return Err(FileError::Traversal(canonical.display().to_string())),
            }
        }
        Ok(segments.join("/"))
    }
}

/// Join a relative directory and a child name with `/`.
pub fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

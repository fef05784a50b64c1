//! Mutating operations: rename, delete, create-directory and upload.
//!
//! Each operation resolves its own targets; nothing is trusted from an
//! earlier request. Filesystem races ("already gone", "already exists")
//! surface as ordinary NotFound / Conflict errors.

use std::fs;
use std::io::{self, Read};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::error::FileError;
use super::policy::UPLOAD_SPOOL_PREFIX;
use super::resolver::{PathResolver, ResolvedPath};

/// Upload limits and overwrite behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Maximum size of one file in bytes.
    pub max_file_size: u64,
    /// Replace existing files instead of reporting a conflict.
    pub overwrite: bool,
}

/// One file of a multipart upload.
pub struct UploadedFile {
    /// Client-supplied name, unsanitized.
    pub name: String,
    /// Size as observed while receiving the part.
    pub size: u64,
    /// File contents.
    pub source: Box<dyn Read + Send>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Outcome of an operation over several items.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Items that succeeded (root-relative paths or stored file names).
    pub succeeded: Vec<String>,
    /// Items that failed, with the reason.
    pub failed: Vec<(String, FileError)>,
}

impl BatchOutcome {
    /// Failures rendered as `item: reason`.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(item, err)| format!("{}: {}", item, err.reason()))
            .collect()
    }
}

/// Rename, delete, create and upload within the root.
#[derive(Debug, Clone)]
pub struct MutationOps {
    resolver: PathResolver,
    limits: UploadLimits,
}

impl MutationOps {
    pub fn new(resolver: PathResolver, limits: UploadLimits) -> Self {
        Self { resolver, limits }
    }

    /// Rename `old` to `new_name` within the same directory.
    ///
    /// Returns the new root-relative path. Renaming to the current name is a
    /// no-op success.
    pub fn rename(&self, old: &str, new_name: &str) -> Result<String, FileError> {
        let source = self.resolver.resolve(old)?;
        if source.is_root() {
            return Err(FileError::Invalid("Cannot rename the root".to_string()));
        }
        self.resolver.check_name(new_name)?;
        if source.is_file() && self.resolver.policy().is_blocked(new_name) {
            warn!(path = %source.relative(), new_name = %new_name, "Refused rename to blocked file type");
            return Err(FileError::UnsupportedType(new_name.to_string()));
        }
        if new_name == source.name() {
            debug!(path = %source.relative(), "Rename to same name, nothing to do");
            return Ok(source.relative().to_string());
        }

        let parent = parent_relative(source.relative());
        let target = self.resolver.resolve_new(parent, new_name)?;

        fs::rename(source.path(), target.path())
            .map_err(|e| FileError::from_io(e, source.relative()))?;

        info!(from = %source.relative(), to = %target.relative(), "Renamed entry");
        Ok(target.relative().to_string())
    }

    /// Delete a file, or a directory with everything in it.
    pub fn delete(&self, target: &str) -> Result<(), FileError> {
        let resolved = self.resolver.resolve(target)?;
        self.delete_resolved(&resolved)
    }

    /// Delete several items independently.
    ///
    /// One item failing never stops the others; the outcome itemizes both.
    pub fn delete_batch(&self, items: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for item in items {
            match self.delete(item) {
                Ok(()) => outcome.succeeded.push(item.clone()),
                Err(e) => {
                    debug!(item = %item, reason = e.reason(), "Batch delete item failed");
                    outcome.failed.push((item.clone(), e));
                }
            }
        }
        outcome
    }

    /// Create the directory `name` inside `parent` (not recursive).
    pub fn create_directory(&self, parent: &str, name: &str) -> Result<String, FileError> {
        let target = self.resolver.resolve_new(parent, name)?;
        fs::create_dir(target.path()).map_err(|e| FileError::from_io(e, target.relative()))?;

        info!(path = %target.relative(), "Created directory");
        Ok(target.relative().to_string())
    }

    /// Store uploaded files in `target_dir`.
    ///
    /// Each file is checked and written independently. Succeeded items are
    /// the stored (sanitized) names.
    pub fn upload(
        &self,
        target_dir: &str,
        files: Vec<UploadedFile>,
    ) -> Result<BatchOutcome, FileError> {
        let dir = self.resolver.resolve_dir(target_dir)?;

        let mut outcome = BatchOutcome::default();
        for file in files {
            let raw_name = file.name.clone();
            match self.store(&dir, file) {
                Ok(stored) => outcome.succeeded.push(stored),
                Err(e) => {
                    warn!(name = %raw_name, reason = e.reason(), "Rejected uploaded file");
                    outcome.failed.push((raw_name, e));
                }
            }
        }
        Ok(outcome)
    }

    fn delete_resolved(&self, target: &ResolvedPath) -> Result<(), FileError> {
        if target.is_root() {
            return Err(FileError::Invalid("Cannot delete the root".to_string()));
        }

        let result = if target.is_dir() {
            fs::remove_dir_all(target.path())
        } else {
            fs::remove_file(target.path())
        };
        result.map_err(|e| FileError::from_io(e, target.relative()))?;

        info!(path = %target.relative(), "Deleted entry");
        Ok(())
    }

    /// Check and persist one uploaded file. Returns the stored name.
    fn store(&self, dir: &ResolvedPath, file: UploadedFile) -> Result<String, FileError> {
        let name = sanitize_filename(&file.name)
            .ok_or_else(|| FileError::Invalid(format!("Invalid file name: {}", file.name)))?;

        let policy = self.resolver.policy();
        if policy.is_blocked(&name) {
            return Err(FileError::UnsupportedType(name));
        }
        if policy.is_reserved(&name) {
            return Err(FileError::Invalid("Name is reserved".to_string()));
        }

        let limit = self.limits.max_file_size;
        if file.size > limit {
            return Err(FileError::SizeLimitExceeded { name, limit });
        }

        let target_path = dir.path().join(&name);
        let relative = dir.child_relative(&name);
        match fs::symlink_metadata(&target_path) {
            Ok(meta) if meta.is_dir() || meta.file_type().is_symlink() => {
                return Err(FileError::Conflict(relative));
            }
            Ok(_) if !self.limits.overwrite => return Err(FileError::Conflict(relative)),
            _ => {}
        }

        // Spool next to the target so the final rename stays on one filesystem.
        let mut temp = tempfile::Builder::new()
            .prefix(UPLOAD_SPOOL_PREFIX)
            .tempfile_in(dir.path())?;
        let written = io::copy(&mut file.source.take(limit.saturating_add(1)), temp.as_file_mut())?;
        if written > limit {
            return Err(FileError::SizeLimitExceeded { name, limit });
        }

        persist(temp, &target_path, self.limits.overwrite)
            .map_err(|e| FileError::from_io(e, &relative))?;

        info!(path = %relative, size = written, "Stored uploaded file");
        Ok(name)
    }
}

fn persist(temp: NamedTempFile, target: &std::path::Path, overwrite: bool) -> io::Result<()> {
    let result = if overwrite {
        temp.persist(target)
    } else {
        temp.persist_noclobber(target)
    };
    result.map(|_| ()).map_err(|e| e.error)
}

/// Root-relative parent of a relative path.
fn parent_relative(relative: &str) -> &str {
    relative.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Reduce a client-supplied file name to a single safe component.
///
/// Directory components are dropped, control characters removed, and
/// leading dots and surrounding whitespace trimmed. Returns `None` when
/// nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.replace("..", "");
    let cleaned = cleaned
        .trim()
        .trim_start_matches('.')
        .trim_end_matches(['.', ' '])
        .trim();

    if cleaned.is_empty() {
        return None;
    }

    // Keep the name within common filesystem limits without splitting a char.
    let mut end = cleaned.len().min(255);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    Some(cleaned[..end].to_string())
}

//! Directory enumeration and natural ordering.

use std::cmp::Ordering;
use std::fs;
use std::iter::Peekable;
use std::str::Chars;

use protocol::{EntryKind, FileEntry};
use tracing::debug;

use super::error::FileError;
use super::policy::FilePolicy;
use super::resolver::{PathResolver, ResolvedPath};
use super::tree::TreeWalker;

/// A listed directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Entry kind.
    pub kind: EntryKind,
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the root.
    pub relative: String,
    /// Byte length for files; recursive qualifying size for directories.
    pub size: u64,
    /// Whether the name starts with a dot.
    pub hidden: bool,
}

impl Entry {
    /// Convert to protocol FileEntry.
    pub fn to_protocol(&self) -> FileEntry {
        FileEntry {
            name: self.name.clone(),
            path: self.relative.clone(),
            kind: self.kind,
            size: self.size,
            hidden: self.hidden,
        }
    }
}

/// Directory contents split by kind, each naturally sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub dirs: Vec<Entry>,
    pub files: Vec<Entry>,
}

impl Listing {
    /// Directories first, then files.
    pub fn into_entries(self) -> Vec<Entry> {
        let mut entries = self.dirs;
        entries.extend(self.files);
        entries
    }

    pub(crate) fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }
}

/// Lists and classifies the entries of a resolved directory.
#[derive(Debug, Clone)]
pub struct DirectoryEnumerator {
    resolver: PathResolver,
}

impl DirectoryEnumerator {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// List `dir`, skipping symlinks, reserved names, blocked files and
    /// (unless `include_hidden`) dot-entries.
    pub fn list(&self, dir: &ResolvedPath, include_hidden: bool) -> Result<Listing, FileError> {
        if !dir.is_dir() {
            return Err(FileError::NotFound(dir.relative().to_string()));
        }

        let policy = self.resolver.policy();
        let walker = TreeWalker::new(policy, include_hidden);
        let read_dir =
            fs::read_dir(dir.path()).map_err(|e| FileError::from_io(e, dir.relative()))?;

        let mut listing = Listing::default();
        for entry_result in read_dir {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };
            if file_type.is_symlink() {
                debug!(name = %name, "Skipping symlink");
                continue;
            }
            if !policy.admits(&name, file_type.is_dir(), include_hidden) {
                continue;
            }

            let path = entry.path();
            match fs::canonicalize(&path) {
                Ok(canonical) if self.resolver.contains(&canonical) => {}
                _ => {
                    debug!(name = %name, "Skipping entry that does not resolve inside the root");
                    continue;
                }
            }

            let relative = dir.child_relative(&name);
            let hidden = FilePolicy::is_hidden(&name);
            if file_type.is_dir() {
                listing.dirs.push(Entry {
                    kind: EntryKind::Dir,
                    size: walker.directory_size(&path),
                    name,
                    relative,
                    hidden,
                });
            } else if file_type.is_file() {
                // A file whose size cannot be read is still listed.
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                listing.files.push(Entry {
                    kind: EntryKind::File,
                    size,
                    name,
                    relative,
                    hidden,
                });
            }
        }

        listing.dirs.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        listing.files.sort_by(|a, b| natural_cmp(&a.name, &b.name));

        Ok(listing)
    }
}

/// Natural, case-insensitive ordering: `file2` sorts before `file10`.
///
/// Names that compare equal this way fall back to byte order, so the
/// ordering is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_order(a, b).then_with(|| a.cmp(b))
}

fn natural_order(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let left = left.trim_start_matches('0');
                let right = right.trim_start_matches('0');
                let ord = left.len().cmp(&right.len()).then_with(|| left.cmp(right));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}

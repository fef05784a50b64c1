//! Zip archive construction into self-deleting temp files.
//!
//! [`ArchiveBuilder::build`] writes a zip into a randomly named temp file and
//! hands back an [`ArchiveJob`] that owns it. Dropping the job (or the
//! [`TempPath`] taken from it) deletes the file, so the archive disappears
//! when the response stream ends, when the client disconnects, and on every
//! error path. [`sweep_stale_archives`] removes leftovers from a killed
//! process.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use protocol::EntryKind;
use tempfile::TempPath;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::error::FileError;
use super::resolver::{PathResolver, ResolvedPath};
use super::tree::TreeWalker;

/// File name prefix of every temp archive.
pub const ARCHIVE_PREFIX: &str = "pathgate-zip-";

/// Archives older than this are considered abandoned by the sweep.
pub const STALE_ARCHIVE_AGE: Duration = Duration::from_secs(60 * 60);

/// What to put in the archive.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    /// Every qualifying descendant of a directory.
    WholeSubtree(ResolvedPath),
    /// Independently resolved items, each added under its own name.
    ExplicitPaths(Vec<String>),
}

/// A finished archive on disk.
#[derive(Debug)]
pub struct ArchiveJob {
    temp: TempPath,
    entry_count: usize,
    size: u64,
    download_name: String,
}

impl ArchiveJob {
    /// Location of the temp file.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Number of file and directory entries written.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Archive size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Suggested download file name.
    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    /// Open the archive for streaming and release the deletion guard.
    ///
    /// The returned [`TempPath`] must outlive the stream; dropping it
    /// removes the file.
    pub fn open(self) -> Result<(File, TempPath), FileError> {
        let file = File::open(&self.temp)?;
        Ok((file, self.temp))
    }
}

/// Builds zip archives from resolved sources.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    resolver: PathResolver,
    temp_dir: PathBuf,
    include_hidden: bool,
}

impl ArchiveBuilder {
    pub fn new(resolver: PathResolver, temp_dir: PathBuf, include_hidden: bool) -> Self {
        Self {
            resolver,
            temp_dir,
            include_hidden,
        }
    }

    /// Directory that receives temp archives.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Build an archive. An archive with no entries is [`FileError::Empty`]
    /// and leaves nothing behind.
    pub fn build(&self, spec: SourceSpec) -> Result<ArchiveJob, FileError> {
        let download_name = match &spec {
            SourceSpec::WholeSubtree(dir) if dir.is_root() => "root.zip".to_string(),
            SourceSpec::WholeSubtree(dir) => format!("{}.zip", dir.name()),
            SourceSpec::ExplicitPaths(_) => "selection.zip".to_string(),
        };

        if let SourceSpec::WholeSubtree(dir) = &spec {
            if !dir.is_dir() {
                return Err(FileError::NotFound(dir.relative().to_string()));
            }
        }

        let token = hex::encode(rand::random::<[u8; 8]>());
        let named = tempfile::Builder::new()
            .prefix(&format!("{}{}-", ARCHIVE_PREFIX, token))
            .suffix(".zip")
            .tempfile_in(&self.temp_dir)?;
        let (file, temp) = named.into_parts();

        let mut writer = ArchiveWriter::new(file);
        match &spec {
            SourceSpec::WholeSubtree(dir) => self.add_tree(&mut writer, dir.path(), "")?,
            SourceSpec::ExplicitPaths(items) => {
                for item in items {
                    self.add_item(&mut writer, item)?;
                }
            }
        }

        let entry_count = writer.entry_count;
        writer.finish()?;

        if entry_count == 0 {
            debug!(name = %download_name, "Archive is empty, discarding");
            return Err(FileError::Empty);
        }

        let size = fs::metadata(&temp)?.len();
        info!(
            name = %download_name,
            entries = entry_count,
            size,
            "Built archive"
        );

        Ok(ArchiveJob {
            temp,
            entry_count,
            size,
            download_name,
        })
    }

    /// Add one explicitly selected item, skipping anything that does not
    /// resolve or is filtered out.
    fn add_item(&self, writer: &mut ArchiveWriter, item: &str) -> Result<(), FileError> {
        let resolved = match self.resolver.resolve(item) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(item = %item, reason = e.reason(), "Skipping archive item");
                return Ok(());
            }
        };

        let name = if resolved.is_root() {
            "root"
        } else {
            resolved.name()
        };
        if !self
            .resolver
            .policy()
            .admits(name, resolved.is_dir(), self.include_hidden)
        {
            warn!(item = %item, "Skipping filtered archive item");
            return Ok(());
        }

        match resolved.kind() {
            Some(EntryKind::Dir) => {
                if writer.add_directory(name)? {
                    self.add_tree(writer, resolved.path(), name)?;
                } else {
                    debug!(item = %item, "Skipping duplicate archive entry");
                }
            }
            Some(EntryKind::File) => {
                if !writer.add_file(name, resolved.path())? {
                    debug!(item = %item, "Skipping duplicate archive entry");
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Add every qualifying descendant of `dir` under `prefix`.
    fn add_tree(
        &self,
        writer: &mut ArchiveWriter,
        dir: &Path,
        prefix: &str,
    ) -> Result<(), FileError> {
        let walker = TreeWalker::new(self.resolver.policy(), self.include_hidden);
        for entry in walker.walk(dir) {
            let name = if prefix.is_empty() {
                entry.relative
            } else {
                format!("{}/{}", prefix, entry.relative)
            };
            match entry.kind {
                EntryKind::Dir => {
                    writer.add_directory(&name)?;
                }
                EntryKind::File => {
                    writer.add_file(&name, &entry.path)?;
                }
            }
        }
        Ok(())
    }
}

/// Zip writer that tracks entry names and counts.
struct ArchiveWriter {
    zip: ZipWriter<File>,
    options: SimpleFileOptions,
    names: HashSet<String>,
    entry_count: usize,
}

impl ArchiveWriter {
    fn new(file: File) -> Self {
        Self {
            zip: ZipWriter::new(file),
            options: SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(0o644),
            names: HashSet::new(),
            entry_count: 0,
        }
    }

    /// Add a directory entry. Returns false for a duplicate name.
    fn add_directory(&mut self, name: &str) -> Result<bool, FileError> {
        let entry_name = format!("{}/", name.trim_end_matches('/'));
        if !self.names.insert(entry_name.clone()) {
            return Ok(false);
        }
        self.zip
            .add_directory(entry_name, self.options)
            .map_err(zip_error)?;
        self.entry_count += 1;
        Ok(true)
    }

    /// Stream a file into the archive. Returns false for a duplicate name or
    /// a file that can no longer be opened.
    fn add_file(&mut self, name: &str, path: &Path) -> Result<bool, FileError> {
        if self.names.contains(name) {
            return Ok(false);
        }
        let mut source = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!(entry = %name, error = %e, "Skipping unreadable file in archive");
                return Ok(false);
            }
        };

        self.names.insert(name.to_string());
        self.zip
            .start_file(name.to_string(), self.options)
            .map_err(zip_error)?;
        io::copy(&mut source, &mut self.zip)?;
        self.entry_count += 1;
        Ok(true)
    }

    fn finish(self) -> Result<(), FileError> {
        self.zip.finish().map_err(zip_error)?;
        Ok(())
    }
}

fn zip_error(err: zip::result::ZipError) -> FileError {
    FileError::Io(io::Error::other(err))
}

/// Remove temp archives in `dir` older than `max_age`.
///
/// Returns the number of files removed. Failures to remove a single file
/// are logged and skipped.
pub fn sweep_stale_archives(dir: &Path, max_age: Duration) -> Result<usize, FileError> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(ARCHIVE_PREFIX) || !name.ends_with(".zip") {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok());
        if !matches!(age, Some(age) if age >= max_age) {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = ?entry.path(), error = %e, "Failed to remove stale archive")
            }
        }
    }

    if removed > 0 {
        info!(removed, dir = ?dir, "Removed stale archives");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::policy::FilePolicy;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    struct Fixture {
        _root: TempDir,
        temp: TempDir,
        resolver: PathResolver,
        builder: ArchiveBuilder,
    }

    fn setup() -> Fixture {
        let root = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("docs/sub")).unwrap();
        fs::create_dir_all(root.path().join("empty")).unwrap();
        fs::write(root.path().join("docs/a.txt"), vec![b'a'; 10]).unwrap();
        fs::write(root.path().join("docs/sub/b.txt"), vec![b'b'; 20]).unwrap();
        fs::write(root.path().join("docs/shell.php"), "<?php").unwrap();
        fs::write(root.path().join("notes.txt"), "notes").unwrap();

        let policy = FilePolicy::new(["php"], ["index.php"], false);
        let resolver = PathResolver::new(root.path(), policy).unwrap();
        let builder = ArchiveBuilder::new(resolver.clone(), temp.path().to_path_buf(), false);
        Fixture {
            _root: root,
            temp,
            resolver,
            builder,
        }
    }

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            entries.push((file.name().to_string(), data));
        }
        entries
    }

    fn temp_files(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_whole_subtree() {
        let fx = setup();
        let docs = fx.resolver.resolve("docs").unwrap();
        let job = fx.builder.build(SourceSpec::WholeSubtree(docs)).unwrap();

        assert_eq!(job.download_name(), "docs.zip");
        let entries = read_entries(job.path());
        assert_eq!(
            entries,
            vec![
                ("a.txt".to_string(), vec![b'a'; 10]),
                ("sub/".to_string(), Vec::new()),
                ("sub/b.txt".to_string(), vec![b'b'; 20]),
            ]
        );
        assert_eq!(job.entry_count(), 3);
    }

    #[test]
    fn test_root_download_name() {
        let fx = setup();
        let root = fx.resolver.resolve("").unwrap();
        let job = fx.builder.build(SourceSpec::WholeSubtree(root)).unwrap();
        assert_eq!(job.download_name(), "root.zip");

        let names: Vec<String> = read_entries(job.path()).into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"docs/sub/b.txt".to_string()));
        assert!(!names.iter().any(|n| n.ends_with(".php")));
    }

    #[test]
    fn test_explicit_paths() {
        let fx = setup();
        let job = fx
            .builder
            .build(SourceSpec::ExplicitPaths(vec![
                "notes.txt".to_string(),
                "docs/sub".to_string(),
                "docs/shell.php".to_string(),
                "../outside".to_string(),
                "missing.txt".to_string(),
                "notes.txt".to_string(),
            ]))
            .unwrap();

        assert_eq!(job.download_name(), "selection.zip");
        let names: Vec<String> = read_entries(job.path()).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["notes.txt", "sub/", "sub/b.txt"]);
    }

    #[test]
    fn test_empty_archive_cleans_up() {
        let fx = setup();
        let empty = fx.resolver.resolve("empty").unwrap();
        let err = fx.builder.build(SourceSpec::WholeSubtree(empty)).unwrap_err();
        assert!(matches!(err, FileError::Empty));
        assert_eq!(temp_files(fx.temp.path()), 0);

        let err = fx
            .builder
            .build(SourceSpec::ExplicitPaths(vec!["docs/shell.php".to_string()]))
            .unwrap_err();
        assert!(matches!(err, FileError::Empty));
        assert_eq!(temp_files(fx.temp.path()), 0);
    }

    #[test]
    fn test_drop_removes_temp_file() {
        let fx = setup();
        let docs = fx.resolver.resolve("docs").unwrap();
        let job = fx.builder.build(SourceSpec::WholeSubtree(docs)).unwrap();
        let path = job.path().to_path_buf();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(ARCHIVE_PREFIX));
        assert!(name.ends_with(".zip"));

        let (_file, guard) = job.open().unwrap();
        assert!(path.exists());
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_sweep_stale_archives() {
        let fx = setup();
        fs::write(fx.temp.path().join("pathgate-zip-deadbeef-x.zip"), "stale").unwrap();
        fs::write(fx.temp.path().join("unrelated.zip"), "keep").unwrap();

        // Nothing is old enough yet
        assert_eq!(sweep_stale_archives(fx.temp.path(), STALE_ARCHIVE_AGE).unwrap(), 0);

        assert_eq!(sweep_stale_archives(fx.temp.path(), Duration::ZERO).unwrap(), 1);
        assert!(fx.temp.path().join("unrelated.zip").exists());
        assert!(!fx.temp.path().join("pathgate-zip-deadbeef-x.zip").exists());
    }

    #[test]
    fn test_sweep_missing_dir() {
        assert_eq!(
            sweep_stale_archives(Path::new("/nonexistent/pathgate"), Duration::ZERO).unwrap(),
            0
        );
    }
}

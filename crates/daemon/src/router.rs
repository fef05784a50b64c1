//! Request router for dispatching parsed requests to the file engine.
//!
//! This module provides the `RequestRouter` struct that receives protocol
//! requests and runs them through the same pipeline: validate, resolve,
//! authorize, execute. Handlers are synchronous and expected to run on the
//! blocking thread pool.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use protocol::{
    breadcrumbs, ErrorCode, ListRequest, ListingResponse, OperationResult, PageSize,
    ProtocolError, Request,
};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::files::{
    paginate, ArchiveBuilder, ArchiveJob, DirectoryEnumerator, Disposition, FileError,
    FilePolicy, FileTransfer, MutationOps, OpenedFile, PathResolver, PermissionGate,
    SourceSpec, UploadLimits, UploadedFile,
};

/// Result type for router operations.
pub type RouterResult = Result<Outcome, RouterError>;

/// Errors that can occur while routing a request.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The request parameters were malformed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The file operation failed.
    #[error("file error: {0}")]
    File(#[from] FileError),
}

impl RouterError {
    /// Client-visible error classification.
    pub fn code(&self) -> ErrorCode {
        match self {
            RouterError::Protocol(e) => ErrorCode::from(e),
            RouterError::File(e) => e.code(),
        }
    }

    /// Convert the error to a protocol failure body.
    pub fn to_operation_result(&self) -> OperationResult {
        let message = match self {
            RouterError::Protocol(e) => e.to_string(),
            RouterError::File(e) => e.client_message(),
        };
        OperationResult::failure(message)
    }
}

/// What a routed request produced.
#[derive(Debug)]
pub enum Outcome {
    /// A page of a directory listing.
    Listing(ListingResponse),
    /// A file to stream.
    File(OpenedFile),
    /// A temp archive to stream; deleted once dropped.
    Archive(ArchiveJob),
    /// Result of a mutating operation.
    Operation(OperationResult),
}

/// Operation classes checked against the permission gate.
#[derive(Debug, Clone, Copy)]
pub enum FileOperation {
    /// List a directory.
    View,
    /// Preview, download or archive.
    Download,
    /// Upload files.
    Upload,
    /// Delete entries.
    Delete,
    /// Rename an entry.
    Rename,
    /// Create a directory.
    CreateDirectory,
}

impl FileOperation {
    fn as_str(&self) -> &'static str {
        match self {
            FileOperation::View => "view",
            FileOperation::Download => "download",
            FileOperation::Upload => "upload",
            FileOperation::Delete => "delete",
            FileOperation::Rename => "rename",
            FileOperation::CreateDirectory => "create directory",
        }
    }
}

/// Request router that dispatches requests to the file engine.
///
/// The router owns one instance of each engine component, all sharing the
/// same resolver and policy.
pub struct RequestRouter {
    /// Permission gate consulted before executing.
    gate: Arc<dyn PermissionGate>,
    /// Resolver shared by every component.
    resolver: PathResolver,
    /// Directory listing.
    enumerator: DirectoryEnumerator,
    /// Single-file streaming.
    transfer: FileTransfer,
    /// Zip archives.
    archives: ArchiveBuilder,
    /// Rename, delete, create, upload.
    mutations: MutationOps,
    /// Page size when the request does not choose one.
    default_page_size: usize,
    /// Page sizes advertised in listing responses.
    page_size_options: Vec<usize>,
    /// Whether dot-files are listed and archived.
    include_hidden: bool,
}

impl RequestRouter {
    /// Create a router with the given dependencies.
    pub fn new(
        resolver: PathResolver,
        gate: Arc<dyn PermissionGate>,
        temp_dir: PathBuf,
        limits: UploadLimits,
        default_page_size: usize,
    ) -> Self {
        let include_hidden = resolver.policy().show_hidden();
        Self {
            gate,
            enumerator: DirectoryEnumerator::new(resolver.clone()),
            transfer: FileTransfer::new(resolver.clone()),
            archives: ArchiveBuilder::new(resolver.clone(), temp_dir, include_hidden),
            mutations: MutationOps::new(resolver.clone(), limits),
            resolver,
            default_page_size,
            page_size_options: Vec::new(),
            include_hidden,
        }
    }

    /// Build a router from configuration, using the configured permission
    /// level as the gate.
    pub fn from_config(config: &Config) -> Result<Self> {
        let policy = FilePolicy::from_config(&config.storage);
        let resolver = PathResolver::new(&config.storage.root, policy).with_context(|| {
            format!(
                "Failed to open root directory: {}",
                config.storage.root.display()
            )
        })?;

        Ok(Self::new(
            resolver,
            Arc::new(config.permissions.level),
            temp_dir(config),
            UploadLimits {
                max_file_size: config.upload.max_file_size,
                overwrite: config.upload.overwrite,
            },
            config.listing.default_page_size,
        )
        .with_page_size_options(config.listing.page_size_options.clone()))
    }

    /// Replace the permission gate.
    pub fn with_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Set the page sizes advertised in listing responses.
    pub fn with_page_size_options(mut self, options: Vec<usize>) -> Self {
        self.page_size_options = options;
        self
    }

    /// Resolver shared by every component.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Directory that receives temp archives.
    pub fn temp_dir(&self) -> &std::path::Path {
        self.archives.temp_dir()
    }

    /// Route a request to the appropriate handler.
    ///
    /// `files` carries the parts of a multipart upload and is ignored by
    /// every other request.
    pub fn route(&self, request: Request, files: Vec<UploadedFile>) -> RouterResult {
        debug!(
            ?request,
            mutation = request.is_mutation(),
            files = files.len(),
            "Routing request"
        );

        match request {
            // Read requests
            Request::List(req) => self.handle_list(req),
            Request::Preview { path } => self.handle_transfer(&path, Disposition::Inline),
            Request::Download { path } => self.handle_transfer(&path, Disposition::Attachment),
            Request::DownloadAllZip { path } => self.handle_download_all_zip(&path),
            Request::DownloadBatchZip { items } => self.handle_download_batch_zip(items),

            // Write requests
            Request::Rename { old_path, new_name } => self.handle_rename(&old_path, &new_name),
            Request::Delete { file_path } => self.handle_delete(&file_path),
            Request::DeleteBatch { items } => self.handle_delete_batch(&items),
            Request::CreateDirectory {
                target_path,
                directory_name,
            } => self.handle_create_directory(&target_path, &directory_name),
            Request::Upload { target_path } => self.handle_upload(&target_path, files),
        }
    }

    /// Checks the permission gate for an operation.
    ///
    /// Returns `Err(FileError::PermissionDenied)` when the gate refuses.
    fn check_permission(&self, operation: FileOperation) -> Result<(), FileError> {
        let allowed = match operation {
            FileOperation::View => self.gate.can_view(),
            FileOperation::Download => self.gate.can_download(),
            FileOperation::Upload => self.gate.can_upload(),
            FileOperation::Delete => self.gate.can_delete(),
            FileOperation::Rename => self.gate.can_rename(),
            FileOperation::CreateDirectory => self.gate.can_create_directory(),
        };

        if allowed {
            Ok(())
        } else {
            warn!(operation = ?operation, "Permission denied for file operation");
            Err(FileError::PermissionDenied(operation.as_str()))
        }
    }

    // =========================================================================
    // Read Handlers
    // =========================================================================

    fn handle_list(&self, req: ListRequest) -> RouterResult {
        let dir = self.resolver.resolve_dir(&req.path)?;
        self.check_permission(FileOperation::View)?;

        let listing = self.enumerator.list(&dir, self.include_hidden)?;
        debug!(path = %dir.relative(), entries = listing.len(), "Enumerated directory");
        let page_size = req
            .page_size
            .unwrap_or(PageSize::Count(self.default_page_size));
        let page = paginate(listing.into_entries(), req.page, page_size);

        debug!(
            path = %dir.relative(),
            page = page.page,
            total_pages = page.total_pages,
            total_items = page.total_items,
            "Listed directory"
        );

        Ok(Outcome::Listing(ListingResponse {
            path: dir.relative().to_string(),
            breadcrumbs: breadcrumbs(dir.relative()),
            items: page.items.iter().map(|e| e.to_protocol()).collect(),
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
            total_items: page.total_items,
            page_size_options: self.page_size_options.clone(),
            navigation: page.navigation,
        }))
    }

    fn handle_transfer(&self, path: &str, disposition: Disposition) -> RouterResult {
        let target = self.resolver.resolve(path)?;
        self.check_permission(FileOperation::Download)?;

        let opened = self.transfer.open(&target, disposition)?;
        Ok(Outcome::File(opened))
    }

    fn handle_download_all_zip(&self, path: &str) -> RouterResult {
        let dir = self.resolver.resolve_dir(path)?;
        self.check_permission(FileOperation::Download)?;

        let job = self.archives.build(SourceSpec::WholeSubtree(dir))?;
        Ok(Outcome::Archive(job))
    }

    fn handle_download_batch_zip(&self, items: Vec<String>) -> RouterResult {
        self.check_permission(FileOperation::Download)?;

        let job = self.archives.build(SourceSpec::ExplicitPaths(items))?;
        Ok(Outcome::Archive(job))
    }

    // =========================================================================
    // Write Handlers
    // =========================================================================

    fn handle_rename(&self, old_path: &str, new_name: &str) -> RouterResult {
        self.resolver.resolve(old_path)?;
        self.check_permission(FileOperation::Rename)?;

        self.mutations.rename(old_path, new_name)?;
        Ok(Outcome::Operation(OperationResult::ok()))
    }

    fn handle_delete(&self, file_path: &str) -> RouterResult {
        self.resolver.resolve(file_path)?;
        self.check_permission(FileOperation::Delete)?;

        self.mutations.delete(file_path)?;
        Ok(Outcome::Operation(OperationResult::ok()))
    }

    fn handle_delete_batch(&self, items: &[String]) -> RouterResult {
        self.check_permission(FileOperation::Delete)?;

        let outcome = self.mutations.delete_batch(items);
        info!(
            deleted = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Batch delete finished"
        );
        let failed = outcome.failure_messages();
        Ok(Outcome::Operation(OperationResult::batch(
            outcome.succeeded,
            failed,
        )))
    }

    fn handle_create_directory(&self, target_path: &str, directory_name: &str) -> RouterResult {
        self.resolver.resolve_dir(target_path)?;
        self.check_permission(FileOperation::CreateDirectory)?;

        self.mutations.create_directory(target_path, directory_name)?;
        Ok(Outcome::Operation(OperationResult::ok()))
    }

    fn handle_upload(&self, target_path: &str, files: Vec<UploadedFile>) -> RouterResult {
        self.resolver.resolve_dir(target_path)?;
        self.check_permission(FileOperation::Upload)?;

        if files.is_empty() {
            return Err(FileError::Invalid("No files uploaded".to_string()).into());
        }

        let outcome = self.mutations.upload(target_path, files)?;
        if !outcome.failed.is_empty() {
            warn!(
                stored = outcome.succeeded.len(),
                rejected = outcome.failed.len(),
                "Upload finished with rejected files"
            );
        }

        let failed = outcome.failure_messages();
        Ok(Outcome::Operation(OperationResult {
            success: true,
            uploaded: Some(outcome.succeeded.len()),
            failed: (!failed.is_empty()).then_some(failed),
            files: Some(outcome.succeeded),
            ..Default::default()
        }))
    }
}

/// Temp directory for archives from configuration.
pub fn temp_dir(config: &Config) -> PathBuf {
    config
        .storage
        .temp_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir)
}

/// Log a routing failure at the level its class deserves.
pub fn log_failure(err: &RouterError) {
    match err {
        RouterError::File(FileError::Io(e)) => error!(error = %e, "File operation failed"),
        RouterError::File(e) => debug!(error = %e, "Request rejected"),
        RouterError::Protocol(e) => debug!(error = %e, "Malformed request"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::PermissionLevel;
    use protocol::{EntryKind, PageLink};
    use std::fs;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        _temp: TempDir,
        router: RequestRouter,
    }

    fn create_test_router(level: PermissionLevel) -> Fixture {
        let root = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("docs/sub")).unwrap();
        fs::write(root.path().join("docs/a.txt"), vec![b'a'; 10]).unwrap();
        fs::write(root.path().join("docs/sub/b.txt"), vec![b'b'; 20]).unwrap();
        fs::write(root.path().join("cat.png"), b"\x89PNG").unwrap();
        fs::write(root.path().join("shell.php"), b"<?php").unwrap();
        for i in 1..=12 {
            fs::write(root.path().join(format!("file{}.txt", i)), "x").unwrap();
        }

        let policy = FilePolicy::new(["php"], ["index.php"], false);
        let resolver = PathResolver::new(root.path(), policy).unwrap();
        let router = RequestRouter::new(
            resolver,
            Arc::new(level),
            temp.path().to_path_buf(),
            UploadLimits {
                max_file_size: 1024,
                overwrite: false,
            },
            5,
        );
        Fixture {
            root,
            _temp: temp,
            router,
        }
    }

    fn list(path: &str, page: usize, page_size: Option<PageSize>) -> Request {
        Request::List(ListRequest {
            path: path.to_string(),
            page,
            page_size,
        })
    }

    fn operation(outcome: Outcome) -> OperationResult {
        match outcome {
            Outcome::Operation(result) => result,
            other => panic!("Expected operation result, got {:?}", other),
        }
    }

    #[test]
    fn test_route_list_paginates() {
        let fx = create_test_router(PermissionLevel::Read);
        let outcome = fx.router.route(list("", 1, None), Vec::new()).unwrap();

        let listing = match outcome {
            Outcome::Listing(listing) => listing,
            other => panic!("Expected listing, got {:?}", other),
        };
        // docs + cat.png + 12 text files; shell.php is never listed
        assert_eq!(listing.total_items, 14);
        assert_eq!(listing.total_pages, 3);
        assert_eq!(listing.page_size, PageSize::Count(5));
        assert_eq!(listing.items.len(), 5);
        assert_eq!(listing.items[0].name, "docs");
        assert_eq!(listing.items[0].kind, EntryKind::Dir);
        assert_eq!(listing.items[0].size, 30);
        assert_eq!(listing.items[1].name, "cat.png");
        assert_eq!(listing.items[2].name, "file1.txt");
        assert_eq!(listing.items[3].name, "file2.txt");
        assert_eq!(listing.navigation.next, Some(2));
        assert!(listing.breadcrumbs.is_empty());
        assert!(listing.page_size_options.is_empty());
    }

    #[test]
    fn test_route_list_advertises_page_size_options() {
        let fx = create_test_router(PermissionLevel::Read);
        let router = fx.router.with_page_size_options(vec![5, 10, 20]);

        let Outcome::Listing(listing) = router.route(list("docs", 1, None), Vec::new()).unwrap()
        else {
            panic!("Expected listing");
        };
        assert_eq!(listing.page_size_options, vec![5, 10, 20]);
    }

    #[test]
    fn test_route_list_all_and_clamped_page() {
        let fx = create_test_router(PermissionLevel::Read);

        let outcome = fx
            .router
            .route(list("", 4, Some(PageSize::All)), Vec::new())
            .unwrap();
        let Outcome::Listing(all) = outcome else {
            panic!("Expected listing");
        };
        assert_eq!(all.items.len(), 14);
        assert_eq!(all.page, 1);
        assert_eq!(
            all.navigation.pages,
            vec![PageLink::Page {
                number: 1,
                current: true
            }]
        );

        let outcome = fx.router.route(list("", 99, None), Vec::new()).unwrap();
        let Outcome::Listing(last) = outcome else {
            panic!("Expected listing");
        };
        assert_eq!(last.page, 3);
        assert_eq!(last.items.len(), 4);
    }

    #[test]
    fn test_route_list_subdirectory_breadcrumbs() {
        let fx = create_test_router(PermissionLevel::Read);
        let outcome = fx.router.route(list("docs/sub", 1, None), Vec::new()).unwrap();
        let Outcome::Listing(listing) = outcome else {
            panic!("Expected listing");
        };
        assert_eq!(listing.path, "docs/sub");
        assert_eq!(listing.breadcrumbs.len(), 2);
        assert_eq!(listing.items[0].path, "docs/sub/b.txt");
    }

    #[test]
    fn test_route_traversal_is_not_found() {
        let fx = create_test_router(PermissionLevel::Full);
        for request in [
            Request::Preview {
                path: "../../etc/passwd".to_string(),
            },
            Request::Download {
                path: "../../etc/passwd".to_string(),
            },
            list("../..", 1, None),
        ] {
            let err = fx.router.route(request, Vec::new()).unwrap_err();
            assert_eq!(err.code(), ErrorCode::NotFound);
            assert_eq!(err.to_operation_result().error.as_deref(), Some("Not found"));
        }
    }

    #[test]
    fn test_route_download() {
        let fx = create_test_router(PermissionLevel::Read);
        let outcome = fx
            .router
            .route(
                Request::Download {
                    path: "docs/a.txt".to_string(),
                },
                Vec::new(),
            )
            .unwrap();

        let Outcome::File(mut opened) = outcome else {
            panic!("Expected file");
        };
        assert_eq!(opened.headers.content_length, 10);
        let mut body = Vec::new();
        opened.file.read_to_end(&mut body).unwrap();
        assert_eq!(body, vec![b'a'; 10]);
    }

    #[test]
    fn test_route_blocked_download_is_forbidden() {
        let fx = create_test_router(PermissionLevel::Full);
        let err = fx
            .router
            .route(
                Request::Download {
                    path: "shell.php".to_string(),
                },
                Vec::new(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedType);
        assert_eq!(err.code().status(), 403);
    }

    #[test]
    fn test_route_download_all_zip() {
        let fx = create_test_router(PermissionLevel::Read);
        let outcome = fx
            .router
            .route(
                Request::DownloadAllZip {
                    path: "docs".to_string(),
                },
                Vec::new(),
            )
            .unwrap();
        let Outcome::Archive(job) = outcome else {
            panic!("Expected archive");
        };
        assert_eq!(job.download_name(), "docs.zip");
        assert_eq!(job.entry_count(), 3);
    }

    #[test]
    fn test_route_permission_denied() {
        let fx = create_test_router(PermissionLevel::Read);
        let err = fx
            .router
            .route(
                Request::Delete {
                    file_path: "docs/a.txt".to_string(),
                },
                Vec::new(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
        assert!(fx.root.path().join("docs/a.txt").exists());

        let none = create_test_router(PermissionLevel::None);
        let err = none.router.route(list("", 1, None), Vec::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
    }

    struct UploadOnly;

    impl PermissionGate for UploadOnly {
        fn can_view(&self) -> bool {
            false
        }
        fn can_download(&self) -> bool {
            false
        }
        fn can_upload(&self) -> bool {
            true
        }
        fn can_delete(&self) -> bool {
            false
        }
        fn can_rename(&self) -> bool {
            false
        }
        fn can_create_directory(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_route_with_custom_gate() {
        let fx = create_test_router(PermissionLevel::Full);
        let router = fx.router.with_gate(Arc::new(UploadOnly));

        let err = router.route(list("", 1, None), Vec::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);

        let files = vec![UploadedFile {
            name: "drop.txt".to_string(),
            size: 4,
            source: Box::new(Cursor::new(b"drop".to_vec())),
        }];
        let result = operation(
            router
                .route(
                    Request::Upload {
                        target_path: String::new(),
                    },
                    files,
                )
                .unwrap(),
        );
        assert_eq!(result.uploaded, Some(1));
        assert!(fx.root.path().join("drop.txt").exists());
    }

    #[test]
    fn test_route_traversal_beats_permission() {
        // Resolution runs before authorization
        let fx = create_test_router(PermissionLevel::None);
        let err = fx
            .router
            .route(
                Request::Delete {
                    file_path: "../x".to_string(),
                },
                Vec::new(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_route_hidden_files_are_out_of_reach() {
        let fx = create_test_router(PermissionLevel::Full);
        fs::write(fx.root.path().join(".env"), "TOKEN=x").unwrap();

        let requests = vec![
            Request::Preview {
                path: ".env".to_string(),
            },
            Request::Download {
                path: ".env".to_string(),
            },
            Request::Rename {
                old_path: ".env".to_string(),
                new_name: "env.txt".to_string(),
            },
            Request::Delete {
                file_path: ".env".to_string(),
            },
        ];
        for request in requests {
            let err = fx.router.route(request, Vec::new()).unwrap_err();
            assert_eq!(err.code(), ErrorCode::NotFound);
        }

        let err = fx
            .router
            .route(
                Request::Rename {
                    old_path: "file1.txt".to_string(),
                    new_name: ".file1.txt".to_string(),
                },
                Vec::new(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert!(fx.root.path().join(".env").exists());
        assert!(fx.root.path().join("file1.txt").exists());
    }

    #[test]
    fn test_route_rename_and_conflict() {
        let fx = create_test_router(PermissionLevel::ReadWrite);
        let err = fx
            .router
            .route(
                Request::Rename {
                    old_path: "file1.txt".to_string(),
                    new_name: "file2.txt".to_string(),
                },
                Vec::new(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert_eq!(err.code().status(), 409);

        let result = operation(
            fx.router
                .route(
                    Request::Rename {
                        old_path: "file1.txt".to_string(),
                        new_name: "renamed.txt".to_string(),
                    },
                    Vec::new(),
                )
                .unwrap(),
        );
        assert!(result.success);
        assert!(fx.root.path().join("renamed.txt").exists());
    }

    #[test]
    fn test_route_delete_batch() {
        let fx = create_test_router(PermissionLevel::Full);
        let result = operation(
            fx.router
                .route(
                    Request::DeleteBatch {
                        items: vec![
                            "file1.txt".to_string(),
                            "../outside".to_string(),
                            "missing.txt".to_string(),
                        ],
                    },
                    Vec::new(),
                )
                .unwrap(),
        );
        assert!(result.success);
        assert_eq!(result.files, Some(vec!["file1.txt".to_string()]));
        assert_eq!(result.failed.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_route_create_directory() {
        let fx = create_test_router(PermissionLevel::ReadWrite);
        let result = operation(
            fx.router
                .route(
                    Request::CreateDirectory {
                        target_path: "docs".to_string(),
                        directory_name: "reports".to_string(),
                    },
                    Vec::new(),
                )
                .unwrap(),
        );
        assert!(result.success);
        assert!(fx.root.path().join("docs/reports").is_dir());
    }

    #[test]
    fn test_route_upload() {
        let fx = create_test_router(PermissionLevel::ReadWrite);
        let files = vec![
            UploadedFile {
                name: "shell.php".to_string(),
                size: 5,
                source: Box::new(Cursor::new(b"<?php".to_vec())),
            },
            UploadedFile {
                name: "notes.txt".to_string(),
                size: 5,
                source: Box::new(Cursor::new(b"notes".to_vec())),
            },
        ];
        let result = operation(
            fx.router
                .route(
                    Request::Upload {
                        target_path: "docs".to_string(),
                    },
                    files,
                )
                .unwrap(),
        );

        assert!(result.success);
        assert_eq!(result.uploaded, Some(1));
        assert_eq!(result.files, Some(vec!["notes.txt".to_string()]));
        let failed = result.failed.unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].starts_with("shell.php"));
    }

    #[test]
    fn test_route_upload_without_files() {
        let fx = create_test_router(PermissionLevel::ReadWrite);
        let err = fx
            .router
            .route(
                Request::Upload {
                    target_path: String::new(),
                },
                Vec::new(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_protocol_error_maps_to_bad_request() {
        let err = RouterError::from(ProtocolError::UnknownAction);
        assert_eq!(err.code().status(), 400);
        assert_eq!(
            err.to_operation_result().error.as_deref(),
            Some("unknown action")
        );
    }
}

//! Contained file operations.
//!
//! This module provides the file engine behind the HTTP front end:
//! - Path resolution with containment proofs ([`PathResolver`])
//! - Directory enumeration and natural ordering ([`DirectoryEnumerator`])
//! - Pagination ([`paginate`])
//! - Single-file streaming ([`FileTransfer`])
//! - Zip archives in self-deleting temp files ([`ArchiveBuilder`])
//! - Rename, delete, create-directory and upload ([`MutationOps`])
//!
//! # Security
//!
//! Every user-supplied path goes through [`PathResolver`], which refuses
//! symlinks, canonicalizes, and checks the canonical path against the
//! canonical root. One [`FilePolicy`] holds the blocked-extension,
//! reserved-name and hidden-file rules for every operation.

pub mod archive;
pub mod error;
pub mod listing;
pub mod mutations;
pub mod pagination;
pub mod permissions;
pub mod policy;
pub mod resolver;
pub mod transfer;
pub mod tree;

pub use archive::{
    sweep_stale_archives, ArchiveBuilder, ArchiveJob, SourceSpec, ARCHIVE_PREFIX, STALE_ARCHIVE_AGE,
};
pub use error::FileError;
pub use listing::{natural_cmp, DirectoryEnumerator, Entry, Listing};
pub use mutations::{BatchOutcome, MutationOps, UploadLimits, UploadedFile};
pub use pagination::{paginate, Page};
pub use permissions::{PermissionGate, PermissionLevel};
pub use policy::{FilePolicy, UPLOAD_SPOOL_PREFIX};
pub use resolver::{PathResolver, ResolvedPath};
pub use transfer::{
    attachment_disposition, inline_mime, Disposition, FileTransfer, OpenedFile, TransferHeaders,
    OCTET_STREAM,
};
pub use tree::{TreeEntry, TreeWalker};

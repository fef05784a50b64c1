//! Request and response definitions for PathGate.
//!
//! Requests arrive as flat string maps (URL query or form body) and are
//! parsed into a [`Request`]. Responses are JSON documents built from the
//! types in this module.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ProtocolError, Result};

/// Raw request parameters, keyed by name.
pub type Params = HashMap<String, String>;

// ============================================================================
// Requests
// ============================================================================

/// A parsed request, one variant per action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// List a directory page.
    List(ListRequest),
    /// Stream a file inline.
    Preview { path: String },
    /// Stream a file as an attachment.
    Download { path: String },
    /// Zip a whole directory subtree.
    DownloadAllZip { path: String },
    /// Zip an explicit selection of paths.
    DownloadBatchZip { items: Vec<String> },
    /// Rename an entry in place.
    Rename { old_path: String, new_name: String },
    /// Delete a single entry.
    Delete { file_path: String },
    /// Delete several entries with partial-failure semantics.
    DeleteBatch { items: Vec<String> },
    /// Create a directory under `target_path`.
    CreateDirectory {
        target_path: String,
        directory_name: String,
    },
    /// Upload multipart files into `target_path`.
    Upload { target_path: String },
}

/// Parameters of a listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Directory relative to the root ("" for the root itself).
    pub path: String,
    /// Requested page, 1-based. Clamped by the paginator.
    pub page: usize,
    /// Requested page size; `None` uses the configured default.
    pub page_size: Option<PageSize>,
}

impl Request {
    /// Parse a read request from URL query parameters.
    ///
    /// Anything that is not a preview, download or archive request is a
    /// directory listing.
    pub fn from_query(params: &Params) -> Result<Self> {
        if let Some(path) = params.get("preview") {
            return Ok(Request::Preview { path: path.clone() });
        }
        if let Some(path) = params.get("download") {
            return Ok(Request::Download { path: path.clone() });
        }
        if params.contains_key("download_all_zip") {
            return Ok(Request::DownloadAllZip {
                path: optional(params, "path"),
            });
        }
        if params.contains_key("download_batch_zip") {
            return Ok(Request::DownloadBatchZip {
                items: parse_items(params)?,
            });
        }

        let page = params
            .get("page")
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(1);
        let page_size = params
            .get("page_size")
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<PageSize>())
            .transpose()?;

        Ok(Request::List(ListRequest {
            path: optional(params, "path"),
            page,
            page_size,
        }))
    }

    /// Parse a write request from form parameters.
    pub fn from_form(params: &Params) -> Result<Self> {
        if params.contains_key("rename") {
            return Ok(Request::Rename {
                old_path: required(params, "old_path")?,
                new_name: required(params, "new_name")?,
            });
        }
        if params.contains_key("delete_batch") {
            return Ok(Request::DeleteBatch {
                items: parse_items(params)?,
            });
        }
        if params.contains_key("delete") {
            return Ok(Request::Delete {
                file_path: required(params, "file_path")?,
            });
        }
        if params.contains_key("create_directory") {
            return Ok(Request::CreateDirectory {
                target_path: optional(params, "target_path"),
                directory_name: required(params, "directory_name")?,
            });
        }
        if params.contains_key("upload") {
            return Ok(Request::Upload {
                target_path: optional(params, "target_path"),
            });
        }
        Err(ProtocolError::UnknownAction)
    }

    /// Whether the request changes the filesystem.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Request::Rename { .. }
                | Request::Delete { .. }
                | Request::DeleteBatch { .. }
                | Request::CreateDirectory { .. }
                | Request::Upload { .. }
        )
    }
}

fn optional(params: &Params, name: &str) -> String {
    params.get(name).cloned().unwrap_or_default()
}

fn required(params: &Params, name: &'static str) -> Result<String> {
    params
        .get(name)
        .cloned()
        .ok_or(ProtocolError::MissingParameter(name))
}

/// Decode the `items` parameter, a JSON array of relative paths.
fn parse_items(params: &Params) -> Result<Vec<String>> {
    let raw = params
        .get("items")
        .ok_or(ProtocolError::MissingParameter("items"))?;
    let items: Vec<String> = serde_json::from_str(raw)?;
    if items.is_empty() {
        return Err(ProtocolError::InvalidParameter {
            name: "items",
            reason: "no items selected".to_string(),
        });
    }
    Ok(items)
}

/// Requested page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// At most this many items per page. Never zero.
    Count(usize),
    /// Everything on a single page.
    All,
}

impl FromStr for PageSize {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageSize::All);
        }
        match s.parse::<usize>() {
            Ok(0) => Err(ProtocolError::InvalidParameter {
                name: "page_size",
                reason: "must be greater than zero".to_string(),
            }),
            Ok(n) => Ok(PageSize::Count(n)),
            Err(e) => Err(ProtocolError::InvalidParameter {
                name: "page_size",
                reason: e.to_string(),
            }),
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSize::Count(n) => write!(f, "{}", n),
            PageSize::All => f.write_str("all"),
        }
    }
}

impl Serialize for PageSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PageSize::Count(n) => serializer.serialize_u64(*n as u64),
            PageSize::All => serializer.serialize_str("all"),
        }
    }
}

// ============================================================================
// Listing Responses
// ============================================================================

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Directory.
    Dir,
    /// Regular file.
    File,
}

/// A single listed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the root, `/`-separated.
    pub path: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes; recursive for directories.
    pub size: u64,
    /// Whether the name starts with a dot.
    pub hidden: bool,
}

/// One link in the page navigation bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageLink {
    /// A numbered page.
    Page { number: usize, current: bool },
    /// A gap between numbered pages.
    Ellipsis,
}

/// Navigation metadata for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    /// Previous page number, absent on the first page.
    pub previous: Option<usize>,
    /// Next page number, absent on the last page.
    pub next: Option<usize>,
    /// Numbered window with first/last pages and ellipses.
    pub pages: Vec<PageLink>,
}

/// A path segment for breadcrumb rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Display name of the segment.
    pub name: String,
    /// Relative path up to and including this segment.
    pub path: String,
}

/// Response body for a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingResponse {
    /// Listed directory relative to the root.
    pub path: String,
    /// Path segments from the root to `path`.
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Entries on this page, directories first.
    pub items: Vec<FileEntry>,
    /// Current page, 1-based.
    pub page: usize,
    /// Effective page size.
    pub page_size: PageSize,
    /// Total number of pages (at least 1).
    pub total_pages: usize,
    /// Total number of entries across all pages.
    pub total_items: usize,
    /// Page sizes a client may offer for this listing.
    pub page_size_options: Vec<usize>,
    /// Navigation metadata.
    pub navigation: Navigation,
}

/// Build breadcrumbs for a `/`-separated relative path.
pub fn breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let mut crumbs = Vec::new();
    let mut acc = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !acc.is_empty() {
            acc.push('/');
        }
        acc.push_str(segment);
        crumbs.push(Breadcrumb {
            name: segment.to_string(),
            path: acc.clone(),
        });
    }
    crumbs
}

// ============================================================================
// Operation Results
// ============================================================================

/// Structured result of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation ran.
    pub success: bool,
    /// Error message when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Itemized failures of a batch operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<Vec<String>>,
    /// Number of files written by an upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<usize>,
    /// Names of the files written by an upload, or the entries a batch
    /// delete removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl OperationResult {
    /// A plain success.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// A failure with a client-safe message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// A batch outcome; `failed` is omitted when nothing failed.
    pub fn batch(succeeded: Vec<String>, failed: Vec<String>) -> Self {
        Self {
            success: true,
            failed: (!failed.is_empty()).then_some(failed),
            files: Some(succeeded),
            ..Default::default()
        }
    }
}

/// Error codes for common error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing target, escape attempt or empty archive.
    NotFound,
    /// The permission gate refused the action.
    PermissionDenied,
    /// Blocked or unsupported file type.
    UnsupportedType,
    /// Malformed request or invalid name.
    InvalidRequest,
    /// Target already exists.
    Conflict,
    /// Upload exceeds the configured limit.
    PayloadTooLarge,
    /// Unexpected server-side failure.
    InternalError,
}

impl ErrorCode {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::PermissionDenied | ErrorCode::UnsupportedType => 403,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::Conflict => 409,
            ErrorCode::PayloadTooLarge => 413,
            ErrorCode::InternalError => 500,
        }
    }
}

impl From<&ProtocolError> for ErrorCode {
    fn from(_: &ProtocolError) -> Self {
        ErrorCode::InvalidRequest
    }
}

//! Single-file streaming as inline preview or attachment download.
//!
//! [`FileTransfer::open`] validates the file against the policy and returns
//! an open handle together with the exact headers the response needs. The
//! HTTP layer streams the handle; the file is never read into memory.

use std::fs::File;

use tracing::{debug, warn};

use super::error::FileError;
use super::resolver::{PathResolver, ResolvedPath};

/// Content type for attachment downloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions that may be displayed inline.
const INLINE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "ico", // images
    "mp4", "webm", "ogv", "mov", // video
    "mp3", "wav", "ogg", "oga", "m4a", "flac", // audio
    "pdf",
];

/// How the client should present the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Displayed in the browser (allowlisted media and PDF only).
    Inline,
    /// Saved to disk.
    Attachment,
}

/// Response headers for a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHeaders {
    /// Explicit `Content-Type`.
    pub content_type: String,
    /// Exact `Content-Length`.
    pub content_length: u64,
    /// `Content-Disposition` for attachments.
    pub content_disposition: Option<String>,
}

/// An opened file ready to stream.
#[derive(Debug)]
pub struct OpenedFile {
    pub file: File,
    pub headers: TransferHeaders,
}

/// Opens resolved files for streaming.
#[derive(Debug, Clone)]
pub struct FileTransfer {
    resolver: PathResolver,
}

impl FileTransfer {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Open `target` for the given disposition.
    ///
    /// Directories are NotFound. Blocked files are refused for both
    /// dispositions; inline additionally requires an allowlisted type.
    pub fn open(
        &self,
        target: &ResolvedPath,
        disposition: Disposition,
    ) -> Result<OpenedFile, FileError> {
        if !target.is_file() {
            return Err(FileError::NotFound(target.relative().to_string()));
        }

        let name = target.name();
        if self.resolver.policy().is_blocked(name) {
            warn!(path = %target.relative(), "Refused transfer of blocked file type");
            return Err(FileError::UnsupportedType(target.relative().to_string()));
        }

        let (content_type, content_disposition) = match disposition {
            Disposition::Inline => {
                let mime = inline_mime(name)
                    .ok_or_else(|| FileError::UnsupportedType(target.relative().to_string()))?;
                (mime, None)
            }
            Disposition::Attachment => {
                (OCTET_STREAM.to_string(), Some(attachment_disposition(name)))
            }
        };

        let file = File::open(target.path()).map_err(|e| FileError::from_io(e, target.relative()))?;
        let content_length = file
            .metadata()
            .map_err(|e| FileError::from_io(e, target.relative()))?
            .len();

        debug!(
            path = %target.relative(),
            size = content_length,
            ?disposition,
            "Opened file for transfer"
        );

        Ok(OpenedFile {
            file,
            headers: TransferHeaders {
                content_type,
                content_length,
                content_disposition,
            },
        })
    }
}

/// MIME type for an inline-displayable file name; `None` when the
/// extension is not on the inline allowlist.
pub fn inline_mime(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    if !INLINE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(mime_guess::from_path(name).first_or_octet_stream().to_string())
}

/// `Content-Disposition` value for downloading a file called `name`.
///
/// Carries an ASCII-only `filename` for old clients and the exact name as
/// an RFC 5987 `filename*`.
pub fn attachment_disposition(name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback(name),
        urlencoding::encode(name)
    )
}

/// ASCII-only rendition of `name` safe inside a quoted header parameter.
fn ascii_fallback(name: &str) -> String {
    let fallback: String = name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let fallback = fallback.trim();
    if fallback.is_empty() {
        "download".to_string()
    } else {
        fallback.to_string()
    }
}

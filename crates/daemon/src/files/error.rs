//! Error taxonomy shared by every file operation.

use std::io;

use protocol::ErrorCode;
use thiserror::Error;

/// Errors that can occur while resolving paths or operating on files.
#[derive(Debug, Error)]
pub enum FileError {
    /// The path escapes the root, walks through a symlink, or is malformed.
    #[error("path escapes the root: {0}")]
    Traversal(String),

    /// The path does not exist or names a reserved entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// The file type is blocked or cannot be served this way.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// The permission gate refused the action.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// The request is malformed (bad name, root as a target, ...).
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The target already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// An uploaded file is larger than the configured limit.
    #[error("{name} exceeds the {limit} byte limit")]
    SizeLimitExceeded { name: String, limit: u64 },

    /// An archive request matched nothing.
    #[error("nothing to download")]
    Empty,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FileError {
    /// Classify an IO error raised while touching `path`.
    ///
    /// Races with other requests surface as "already gone" or "already
    /// exists"; those become ordinary NotFound / Conflict errors.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileError::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => FileError::Conflict(path.to_string()),
            _ => FileError::Io(err),
        }
    }

    /// Client-visible error classification.
    pub fn code(&self) -> ErrorCode {
        match self {
            FileError::Traversal(_) | FileError::NotFound(_) | FileError::Empty => {
                ErrorCode::NotFound
            }
            FileError::UnsupportedType(_) => ErrorCode::UnsupportedType,
            FileError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            FileError::Invalid(_) => ErrorCode::InvalidRequest,
            FileError::Conflict(_) => ErrorCode::Conflict,
            FileError::SizeLimitExceeded { .. } => ErrorCode::PayloadTooLarge,
            FileError::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Message safe to return to the client.
    ///
    /// Traversal and NotFound read the same, and IO failures never leak a
    /// server path.
    pub fn client_message(&self) -> String {
        match self {
            FileError::Traversal(_) | FileError::NotFound(_) => "Not found".to_string(),
            FileError::UnsupportedType(_) => "File type not allowed".to_string(),
            FileError::PermissionDenied(action) => format!("Permission denied: {}", action),
            FileError::Invalid(reason) => reason.clone(),
            FileError::Conflict(_) => "Name already exists".to_string(),
            FileError::SizeLimitExceeded { limit, .. } => {
                format!("File exceeds the {} byte limit", limit)
            }
            FileError::Empty => "Nothing to download".to_string(),
            FileError::Io(_) => "Internal error".to_string(),
        }
    }

    /// Short reason used when itemizing batch failures.
    pub fn reason(&self) -> &'static str {
        match self {
            FileError::Traversal(_) => "outside root",
            FileError::NotFound(_) => "not found",
            FileError::UnsupportedType(_) => "file type not allowed",
            FileError::PermissionDenied(_) => "permission denied",
            FileError::Invalid(_) => "invalid",
            FileError::Conflict(_) => "already exists",
            FileError::SizeLimitExceeded { .. } => "too large",
            FileError::Empty => "empty",
            FileError::Io(_) => "io error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_and_not_found_look_alike() {
        let traversal = FileError::Traversal("../../etc/passwd".to_string());
        let missing = FileError::NotFound("missing.txt".to_string());

        assert_eq!(traversal.code(), ErrorCode::NotFound);
        assert_eq!(missing.code(), ErrorCode::NotFound);
        assert_eq!(traversal.client_message(), missing.client_message());
        assert_ne!(traversal.reason(), missing.reason());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(FileError::Empty.code().status(), 404);
        assert_eq!(FileError::UnsupportedType("a.php".into()).code().status(), 403);
        assert_eq!(FileError::PermissionDenied("delete").code().status(), 403);
        assert_eq!(FileError::Invalid("bad".into()).code().status(), 400);
        assert_eq!(FileError::Conflict("a".into()).code().status(), 409);
        assert_eq!(
            FileError::SizeLimitExceeded {
                name: "big.bin".into(),
                limit: 10
            }
            .code()
            .status(),
            413
        );
    }

    #[test]
    fn test_io_message_is_path_free() {
        let err = FileError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "/srv/secret/file: permission denied",
        ));
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(!err.client_message().contains("/srv"));
    }

    #[test]
    fn test_from_io_classifies_races() {
        let gone = FileError::from_io(io::Error::from(io::ErrorKind::NotFound), "a.txt");
        assert!(matches!(gone, FileError::NotFound(p) if p == "a.txt"));

        let exists = FileError::from_io(io::Error::from(io::ErrorKind::AlreadyExists), "b");
        assert!(matches!(exists, FileError::Conflict(_)));

        let other = FileError::from_io(io::Error::from(io::ErrorKind::PermissionDenied), "c");
        assert!(matches!(other, FileError::Io(_)));
    }
}

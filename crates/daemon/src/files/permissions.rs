//! Permission gate consulted before every operation.
//!
//! Authentication and user management live outside the engine. The engine
//! only asks a [`PermissionGate`] yes/no questions; [`PermissionLevel`] is
//! the gate used when a single configured level applies to every request.

use serde::{Deserialize, Serialize};

/// Boolean permission checks supplied by the surrounding application.
pub trait PermissionGate: Send + Sync {
    /// List directories.
    fn can_view(&self) -> bool;
    /// Preview, download and archive files.
    fn can_download(&self) -> bool;
    /// Upload files.
    fn can_upload(&self) -> bool;
    /// Delete files and directories.
    fn can_delete(&self) -> bool;
    /// Rename entries.
    fn can_rename(&self) -> bool;
    /// Create directories.
    fn can_create_directory(&self) -> bool;
}

/// Coarse permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// No access.
    #[default]
    None,
    /// Read-only access (list directories, preview and download files).
    Read,
    /// Read and write access (also upload, rename, create directories).
    ReadWrite,
    /// Full access (also delete).
    Full,
}

impl PermissionLevel {
    /// Check if this level allows reading.
    pub fn can_read(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite | Self::Full)
    }

    /// Check if this level allows writing.
    pub fn can_write(&self) -> bool {
        matches!(self, Self::ReadWrite | Self::Full)
    }
}

impl PermissionGate for PermissionLevel {
    fn can_view(&self) -> bool {
        self.can_read()
    }

    fn can_download(&self) -> bool {
        self.can_read()
    }

    fn can_upload(&self) -> bool {
        self.can_write()
    }

    fn can_delete(&self) -> bool {
        matches!(self, Self::Full)
    }

    fn can_rename(&self) -> bool {
        self.can_write()
    }

    fn can_create_directory(&self) -> bool {
        self.can_write()
    }
}

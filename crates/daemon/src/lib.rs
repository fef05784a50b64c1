//! # PathGate Daemon Library
//!
//! This crate provides the PathGate service: browsing, previewing,
//! downloading, archiving and managing files inside one configured root
//! directory over HTTP.
//!
//! ## Overview
//!
//! - **Path Resolution**: Every client path is resolved against a canonical
//!   root; symlinks, `..` escapes and reserved names never reach the disk
//! - **Listing**: Natural-order directory listings with pagination
//! - **Transfer**: Inline previews for an allowlist of media types, attachment
//!   downloads for everything else
//! - **Archives**: Zip downloads of a subtree or a selection, built in
//!   self-deleting temp files
//! - **Mutations**: Rename, delete, batch delete, create directory, upload
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    HTTP Server (axum)                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                   Request Router                           │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │  Directory   │  │    File      │  │      Archive         │  │
//! │  │  Enumerator  │  │   Transfer   │  │      Builder         │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────────┘  │
//! │  ┌──────────────┐  ┌────────────────────────────────────────┐  │
//! │  │  Mutations   │  │   Path Resolver  +  File Policy        │  │
//! │  └──────────────┘  └────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load_default()?;
//!     config.apply_env_overrides();
//!     config.validate()?;
//!
//!     daemon::serve(&config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Path resolution and file operations
//! - [`router`]: Request routing to the file engine
//! - [`server`]: HTTP front end

pub mod config;
pub mod files;
pub mod router;
pub mod server;

pub use config::{default_config_path, Config, ConfigError};
pub use files::{FileError, PathResolver, PermissionGate, PermissionLevel};
pub use router::{Outcome, RequestRouter, RouterError};
pub use server::{app, serve, AppState};

//! # PathGate Protocol Library
//!
//! Request and response definitions shared by the PathGate daemon and its
//! clients.
//!
//! ## Overview
//!
//! - **Requests**: read actions arrive as URL query parameters, write actions
//!   as form or multipart bodies. [`Request::from_query`] and
//!   [`Request::from_form`] turn the flat parameter maps into a typed request.
//! - **Responses**: directory listings ([`ListingResponse`]) and mutation
//!   outcomes ([`OperationResult`]) are JSON documents.
//! - **Errors**: [`ErrorCode`] is the client-visible error classification and
//!   carries the HTTP status it maps to.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Params, Request};
//!
//! let mut params = Params::new();
//! params.insert("download".to_string(), "docs/report.pdf".to_string());
//!
//! let request = Request::from_query(&params).unwrap();
//! assert!(!request.is_mutation());
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Request and response definitions
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    breadcrumbs, Breadcrumb, EntryKind, ErrorCode, FileEntry, ListRequest, ListingResponse,
    Navigation, OperationResult, PageLink, PageSize, Params, Request,
};

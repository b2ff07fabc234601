//! # Gallery Server
//!
//! A photo gallery web application where signed-in users create galleries,
//! upload images to them and share them publicly.
//!
//! ## Features
//!
//! - **Resource authorization**: Path ids are resolved and checked against
//!   ordered predicates before any handler logic runs
//! - **Validated uploads**: Filenames are sanitized and content is sniffed
//!   against an extension allowlist, rejecting a batch at the first bad file
//! - **Request-aware templates**: Pages are parsed once at startup and
//!   rendered with per-request helpers for the CSRF field, current user and
//!   error messages
//! - **CSRF protection**: HMAC-SHA256 tokens bound to the session, verified on
//!   every `POST`
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`model`] - Users, galleries, images and ownership
//! - [`access`] - Resource guard with ownership predicates
//! - [`upload`] - Filename sanitization and upload validation
//! - [`template`] - Template sets and per-request rendering
//! - [`storage`] - Gallery, image and session stores
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use gallery_server::{
//!     create_router, AppState, CsrfGuard, MemoryGalleryStore, MemoryImageStore,
//!     MemorySessionStore, RouterConfig, UploadPolicy, Views,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let state = AppState::new(
//!         Arc::new(MemoryGalleryStore::new()),
//!         Arc::new(MemoryImageStore::new()),
//!         Arc::new(MemorySessionStore::new()),
//!         Views::load().unwrap(),
//!         UploadPolicy::default(),
//!         CsrfGuard::new("a-secret-of-at-least-thirty-two-bytes", Duration::from_secs(3600)),
//!     );
//!
//!     let router = create_router(state, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod model;
pub mod server;
pub mod storage;
pub mod template;
pub mod upload;

// Re-export commonly used types
pub use access::{parse_id, Predicate, ResourceGuard, UserMustOwn};
pub use config::Config;
pub use error::{AccessError, GalleryError, StorageError, TemplateError, UploadError};
pub use model::{Gallery, GalleryId, Image, Owned, Principal, Resource, UserId};
pub use server::{create_router, AppState, CsrfGuard, RouterConfig, Views};
pub use storage::{
    DiskImageStore, EntityLookup, GalleryStore, ImageStore, MemoryGalleryStore, MemoryImageStore,
    MemorySessionStore, SessionStore,
};
pub use template::{RenderContext, TemplateSet, TemplateStore};
pub use upload::{sanitize_filename, SafeFilename, UploadPolicy, UploadValidator};

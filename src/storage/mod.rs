//! Storage collaborators.
//!
//! The rendering and authorization pipeline only talks to storage through the
//! traits in this module. Persistence details stay behind them:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │          ResourceGuard / UploadValidator / handlers       │
//! └───────────────┬──────────────────┬───────────────┬───────┘
//!                 │                  │               │
//!                 ▼                  ▼               ▼
//!        ┌─────────────────┐ ┌───────────────┐ ┌──────────────┐
//!        │  GalleryStore   │ │  ImageStore   │ │ SessionStore │
//!        │ (EntityLookup)  │ │ (bytes)       │ │ (principals) │
//!        └─────────────────┘ └───────────────┘ └──────────────┘
//! ```
//!
//! In-memory implementations live in [`memory`], a directory-backed image
//! store in [`disk`].

pub mod disk;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::StorageError;
use crate::model::{Gallery, GalleryId, Image, Principal, UserId};
use crate::upload::SafeFilename;

pub use disk::DiskImageStore;
pub use memory::{MemoryGalleryStore, MemoryImageStore, MemorySessionStore};

/// Resolve an entity by numeric identifier.
///
/// Absence must be reported as [`StorageError::NotFound`]; every other error
/// is treated as an internal failure by the caller.
#[async_trait]
pub trait EntityLookup<E>: Send + Sync {
    async fn by_id(&self, id: u64) -> Result<E, StorageError>;
}

/// Persistence of galleries.
#[async_trait]
pub trait GalleryStore: EntityLookup<Gallery> {
    /// Create a gallery owned by `owner`.
    async fn create(&self, title: &str, owner: UserId) -> Result<Gallery, StorageError>;

    /// Replace the title of an existing gallery. The owner cannot change.
    async fn update_title(&self, id: GalleryId, title: &str) -> Result<(), StorageError>;

    /// Delete a gallery.
    async fn delete(&self, id: GalleryId) -> Result<(), StorageError>;

    /// All galleries owned by `owner`, ordered by id.
    async fn by_owner(&self, owner: UserId) -> Result<Vec<Gallery>, StorageError>;
}

/// Persistence of image bytes, keyed by `(gallery, filename)`.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the contents of `reader`, overwriting any image with the same key.
    async fn put(
        &self,
        gallery: GalleryId,
        filename: &SafeFilename,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<Image, StorageError>;

    /// Fetch the bytes of one image.
    async fn get(&self, gallery: GalleryId, filename: &SafeFilename)
        -> Result<Bytes, StorageError>;

    /// All images of a gallery, ordered by filename.
    async fn list(&self, gallery: GalleryId) -> Result<Vec<Image>, StorageError>;

    /// Delete one image.
    async fn delete(&self, gallery: GalleryId, filename: &SafeFilename)
        -> Result<(), StorageError>;

    /// Delete every image of a gallery. Succeeds when there is nothing to delete.
    async fn delete_gallery(&self, gallery: GalleryId) -> Result<(), StorageError>;
}

/// Resolution of session tokens to principals.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The principal owning `token`, or `None` for unknown tokens.
    async fn principal(&self, token: &str) -> Result<Option<Principal>, StorageError>;
}

//! In-memory storage collaborators.
//!
//! Used by the binary when no external database is wired in, and by tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;

use super::{EntityLookup, GalleryStore, ImageStore, SessionStore};
use crate::error::StorageError;
use crate::model::{Gallery, GalleryId, Image, Owned, Principal, UserId};
use crate::upload::SafeFilename;

// =============================================================================
// Galleries
// =============================================================================

#[derive(Default)]
struct GalleryRows {
    next_id: u64,
    rows: BTreeMap<u64, Gallery>,
}

/// Gallery store backed by a `BTreeMap`.
#[derive(Default)]
pub struct MemoryGalleryStore {
    inner: RwLock<GalleryRows>,
}

impl MemoryGalleryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityLookup<Gallery> for MemoryGalleryStore {
    async fn by_id(&self, id: u64) -> Result<Gallery, StorageError> {
        let inner = self.inner.read().await;
        inner
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("gallery {}", id)))
    }
}

#[async_trait]
impl GalleryStore for MemoryGalleryStore {
    async fn create(&self, title: &str, owner: UserId) -> Result<Gallery, StorageError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        let gallery = Gallery::new(GalleryId(id), owner, title);
        inner.rows.insert(id, gallery.clone());
        Ok(gallery)
    }

    async fn update_title(&self, id: GalleryId, title: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let gallery = inner
            .rows
            .get_mut(&id.0)
            .ok_or_else(|| StorageError::NotFound(format!("gallery {}", id)))?;
        gallery.title = title.to_string();
        Ok(())
    }

    async fn delete(&self, id: GalleryId) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner
            .rows
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("gallery {}", id)))
    }

    async fn by_owner(&self, owner: UserId) -> Result<Vec<Gallery>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .values()
            .filter(|gallery| gallery.owner() == owner)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Images
// =============================================================================

/// Image store keeping every image in memory.
#[derive(Default)]
pub struct MemoryImageStore {
    images: RwLock<BTreeMap<(GalleryId, SafeFilename), Bytes>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored images across all galleries.
    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.images.read().await.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put(
        &self,
        gallery: GalleryId,
        filename: &SafeFilename,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<Image, StorageError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;

        self.images
            .write()
            .await
            .insert((gallery, filename.clone()), Bytes::from(data));
        Ok(Image::new(gallery, filename.clone()))
    }

    async fn get(
        &self,
        gallery: GalleryId,
        filename: &SafeFilename,
    ) -> Result<Bytes, StorageError> {
        self.images
            .read()
            .await
            .get(&(gallery, filename.clone()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("image {}/{}", gallery, filename)))
    }

    async fn list(&self, gallery: GalleryId) -> Result<Vec<Image>, StorageError> {
        Ok(self
            .images
            .read()
            .await
            .keys()
            .filter(|(id, _)| *id == gallery)
            .map(|(id, filename)| Image::new(*id, filename.clone()))
            .collect())
    }

    async fn delete(
        &self,
        gallery: GalleryId,
        filename: &SafeFilename,
    ) -> Result<(), StorageError> {
        self.images
            .write()
            .await
            .remove(&(gallery, filename.clone()))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("image {}/{}", gallery, filename)))
    }

    async fn delete_gallery(&self, gallery: GalleryId) -> Result<(), StorageError> {
        self.images
            .write()
            .await
            .retain(|(id, _), _| *id != gallery);
        Ok(())
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Session store mapping opaque tokens to principals.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Principal>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session while building the store.
    pub fn with_session(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.sessions.get_mut().insert(token.into(), principal);
        self
    }

    /// Add a session to a shared store.
    pub async fn insert(&self, token: impl Into<String>, principal: Principal) {
        self.sessions.write().await.insert(token.into(), principal);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn principal(&self, token: &str) -> Result<Option<Principal>, StorageError> {
        Ok(self.sessions.read().await.get(token).cloned())
    }
}

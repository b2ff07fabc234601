//! Directory-backed image store.
//!
//! Images live at `{root}/gallery-{id}/{filename}`. Filenames reaching this
//! module are [`SafeFilename`]s, so joined paths cannot leave the gallery
//! directory.
//!
//! Writes go to a `.{filename}.{n}.part` file in the same directory which is
//! renamed over the target once complete, so a failed upload leaves any
//! previous image in place.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

use super::ImageStore;
use crate::error::StorageError;
use crate::model::{GalleryId, Image};
use crate::upload::{sanitize_filename, SafeFilename};

const PARTIAL_SUFFIX: &str = ".part";

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

fn is_partial(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)
}

async fn write_file(
    path: &Path,
    reader: &mut (dyn AsyncRead + Send + Unpin),
) -> Result<u64, StorageError> {
    let mut file = fs::File::create(path).await.map_err(|e| {
        StorageError::Backend(format!("creating {}: {}", path.display(), e))
    })?;
    let written = tokio::io::copy(reader, &mut file).await.map_err(|e| {
        StorageError::Backend(format!("writing {}: {}", path.display(), e))
    })?;
    file.flush().await.map_err(|e| {
        StorageError::Backend(format!("writing {}: {}", path.display(), e))
    })?;
    Ok(written)
}

/// Image store writing each gallery into its own directory.
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    root: PathBuf,
}

impl DiskImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn gallery_dir(&self, gallery: GalleryId) -> PathBuf {
        self.root.join(format!("gallery-{}", gallery))
    }

    fn image_path(&self, gallery: GalleryId, filename: &SafeFilename) -> PathBuf {
        self.gallery_dir(gallery).join(filename.as_str())
    }

    fn partial_path(&self, gallery: GalleryId, filename: &SafeFilename) -> PathBuf {
        let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
        self.gallery_dir(gallery)
            .join(format!(".{}.{}{}", filename, seq, PARTIAL_SUFFIX))
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn put(
        &self,
        gallery: GalleryId,
        filename: &SafeFilename,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<Image, StorageError> {
        let dir = self.gallery_dir(gallery);
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::Backend(format!("creating {}: {}", dir.display(), e))
        })?;

        let path = self.image_path(gallery, filename);
        let partial = self.partial_path(gallery, filename);
        let written = match write_file(&partial, reader).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StorageError::Backend(format!(
                "renaming {}: {}",
                path.display(),
                e
            )));
        }

        debug!(gallery_id = %gallery, filename = %filename, bytes = written, "Stored image");
        Ok(Image::new(gallery, filename.clone()))
    }

    async fn get(
        &self,
        gallery: GalleryId,
        filename: &SafeFilename,
    ) -> Result<Bytes, StorageError> {
        let data = fs::read(self.image_path(gallery, filename)).await?;
        Ok(Bytes::from(data))
    }

    async fn list(&self, gallery: GalleryId) -> Result<Vec<Image>, StorageError> {
        let mut entries = match fs::read_dir(self.gallery_dir(gallery)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut images = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_partial(&name) {
                continue;
            }
            match sanitize_filename(&name) {
                Ok(filename) if filename.as_str() == name => {
                    images.push(Image::new(gallery, filename));
                }
                _ => debug!(gallery_id = %gallery, name = %name, "Skipping unexpected file"),
            }
        }

        images.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(images)
    }

    async fn delete(
        &self,
        gallery: GalleryId,
        filename: &SafeFilename,
    ) -> Result<(), StorageError> {
        fs::remove_file(self.image_path(gallery, filename)).await?;
        Ok(())
    }

    async fn delete_gallery(&self, gallery: GalleryId) -> Result<(), StorageError> {
        match fs::remove_dir_all(self.gallery_dir(gallery)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

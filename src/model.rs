//! Domain types shared by the access, upload, storage and server layers.

use std::fmt;

use serde::Serialize;

use crate::error::GalleryError;
use crate::upload::SafeFilename;

/// Identifier of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GalleryId(pub u64);

impl fmt::Display for GalleryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated party behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: UserId,
    pub email: String,
}

impl Principal {
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Entities that can be resolved by [`crate::access::ResourceGuard`].
pub trait Resource {
    /// Human-readable name used in error messages ("Gallery").
    const NAME: &'static str;
}

/// Entities with a single owning user.
pub trait Owned {
    fn owner(&self) -> UserId;
}

/// A photo gallery.
///
/// The owner is fixed at construction; only the title can change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gallery {
    id: GalleryId,
    owner: UserId,
    pub title: String,
}

impl Gallery {
    pub fn new(id: GalleryId, owner: UserId, title: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            title: title.into(),
        }
    }

    pub fn id(&self) -> GalleryId {
        self.id
    }
}

impl Resource for Gallery {
    const NAME: &'static str = "Gallery";
}

impl Owned for Gallery {
    fn owner(&self) -> UserId {
        self.owner
    }
}

/// Maximum accepted gallery title length, in characters.
pub const MAX_TITLE_CHARS: usize = 120;

/// Trim and validate a submitted gallery title.
pub fn normalize_title(raw: &str) -> Result<String, GalleryError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(GalleryError::InvalidInput(
            "Gallery title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(GalleryError::InvalidInput(format!(
            "Gallery title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

/// A stored image, keyed by gallery and sanitized filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub gallery_id: GalleryId,
    pub filename: SafeFilename,
}

impl Image {
    pub fn new(gallery_id: GalleryId, filename: SafeFilename) -> Self {
        Self {
            gallery_id,
            filename,
        }
    }

    /// MIME type derived from the filename extension.
    pub fn content_type(&self) -> &'static str {
        match self.filename.extension().as_deref() {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => "application/octet-stream",
        }
    }
}

//! Page templates and the data each page is rendered with.
//!
//! Templates are compiled into the binary and parsed once by [`Views::load`].

use std::sync::Arc;

use serde::Serialize;

use crate::error::TemplateError;
use crate::model::{Gallery, GalleryId, Image};
use crate::template::{TemplateSet, TemplateStore};

const LAYOUT: &str = include_str!("../../templates/layout.html");
const HOME: &str = include_str!("../../templates/home.html");
const GALLERIES_NEW: &str = include_str!("../../templates/galleries/new.html");
const GALLERIES_EDIT: &str = include_str!("../../templates/galleries/edit.html");
const GALLERIES_INDEX: &str = include_str!("../../templates/galleries/index.html");
const GALLERIES_SHOW: &str = include_str!("../../templates/galleries/show.html");

/// The parsed page templates.
#[derive(Debug, Clone)]
pub struct Views {
    pub home: Arc<TemplateSet>,
    pub new_gallery: Arc<TemplateSet>,
    pub edit_gallery: Arc<TemplateSet>,
    pub gallery_index: Arc<TemplateSet>,
    pub show_gallery: Arc<TemplateSet>,
}

impl Views {
    /// Parse every page template.
    pub fn load() -> Result<Self, TemplateError> {
        let mut store = TemplateStore::new();
        let mut page = |name: &str, file: &str, source: &str| {
            store.load(name, &[(file, source), ("layout.html", LAYOUT)])
        };

        Ok(Self {
            home: page("home", "home.html", HOME)?,
            new_gallery: page("galleries/new", "galleries/new.html", GALLERIES_NEW)?,
            edit_gallery: page("galleries/edit", "galleries/edit.html", GALLERIES_EDIT)?,
            gallery_index: page("galleries/index", "galleries/index.html", GALLERIES_INDEX)?,
            show_gallery: page("galleries/show", "galleries/show.html", GALLERIES_SHOW)?,
        })
    }
}

// =============================================================================
// Page Data
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HomePage {}

/// Data for the new gallery form.
#[derive(Debug, Serialize)]
pub struct NewGalleryPage {
    pub title: String,
}

/// An image as linked from gallery pages.
#[derive(Debug, Serialize)]
pub struct ImageView {
    pub gallery_id: GalleryId,
    pub filename: String,
    /// Filename escaped for use as a single path segment
    pub filename_escaped: String,
}

impl From<&Image> for ImageView {
    fn from(image: &Image) -> Self {
        Self {
            gallery_id: image.gallery_id,
            filename: image.filename.to_string(),
            filename_escaped: urlencoding::encode(image.filename.as_str()).into_owned(),
        }
    }
}

/// Data for the show and edit pages.
#[derive(Debug, Serialize)]
pub struct GalleryPage {
    pub id: GalleryId,
    pub title: String,
    pub images: Vec<ImageView>,
}

impl GalleryPage {
    pub fn new(gallery: &Gallery, images: &[Image]) -> Self {
        Self {
            id: gallery.id(),
            title: gallery.title.clone(),
            images: images.iter().map(ImageView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GallerySummary {
    pub id: GalleryId,
    pub title: String,
}

/// Data for the list of the user's galleries.
#[derive(Debug, Serialize)]
pub struct GalleryIndexPage {
    pub galleries: Vec<GallerySummary>,
}

impl GalleryIndexPage {
    pub fn new(galleries: &[Gallery]) -> Self {
        Self {
            galleries: galleries
                .iter()
                .map(|gallery| GallerySummary {
                    id: gallery.id(),
                    title: gallery.title.clone(),
                })
                .collect(),
        }
    }
}

//! HTTP request handlers for the gallery pages, images and uploads.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check endpoint
//! - `GET /` - Home page
//! - `GET /galleries` - The signed-in user's galleries
//! - `GET /galleries/new` - New gallery form
//! - `POST /galleries` - Create a gallery
//! - `GET /galleries/{id}` - Show a gallery
//! - `GET /galleries/{id}/edit` - Edit form (owner only)
//! - `POST /galleries/{id}` - Update the title (owner only)
//! - `POST /galleries/{id}/delete` - Delete a gallery (owner only)
//! - `GET /galleries/{id}/images/{filename}` - Serve an image
//! - `POST /galleries/{id}/images` - Upload images (owner only)
//! - `POST /galleries/{id}/images/{filename}/delete` - Delete an image (owner only)
//!
//! # Uploads
//!
//! Each multipart file part is read fully into memory before validation and
//! storage. The whole request body is capped by the upload route's
//! `DefaultBodyLimit` (`RouterConfig::max_upload_bytes`), which bounds the
//! memory one upload can hold.

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::access::{ResourceGuard, UserMustOwn};
use crate::error::{GalleryError, StorageError, GENERIC_ERROR_MESSAGE};
use crate::model::{normalize_title, Gallery, Image, Principal};
use crate::storage::{GalleryStore, ImageStore, SessionStore};
use crate::template::RenderContext;
use crate::upload::{sanitize_filename, IncomingFile, UploadPolicy, UploadValidator};

use super::auth::{CsrfError, CsrfGuard, CsrfSubject, RequireUser, CSRF_FIELD};
use super::views::{GalleryIndexPage, GalleryPage, HomePage, NewGalleryPage, Views};

/// Multipart field carrying uploaded images.
pub const IMAGES_FIELD: &str = "images";

/// Route pattern of the upload endpoint, the only one taking multipart bodies.
pub const UPLOAD_PATH: &str = "/galleries/{id}/images";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers and middleware via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Gallery rows
    pub galleries: Arc<dyn GalleryStore>,

    /// Image bytes
    pub images: Arc<dyn ImageStore>,

    /// Session token to principal resolution
    pub sessions: Arc<dyn SessionStore>,

    /// Parsed page templates
    pub views: Arc<Views>,

    /// Upload validation against the configured allowlist
    pub uploads: UploadValidator,

    /// CSRF token issuer
    pub csrf: CsrfGuard,
}

impl AppState {
    pub fn new(
        galleries: Arc<dyn GalleryStore>,
        images: Arc<dyn ImageStore>,
        sessions: Arc<dyn SessionStore>,
        views: Views,
        policy: UploadPolicy,
        csrf: CsrfGuard,
    ) -> Self {
        Self {
            uploads: UploadValidator::new(policy, Arc::clone(&images)),
            galleries,
            images,
            sessions,
            views: Arc::new(views),
            csrf,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for the new gallery form.
#[derive(Debug, Default, Deserialize)]
pub struct NewGalleryQuery {
    /// Prefilled title
    #[serde(default)]
    pub title: String,
}

/// Form body for creating or renaming a gallery.
#[derive(Debug, Deserialize)]
pub struct GalleryForm {
    #[serde(default)]
    pub title: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// `302 Found` redirect to `location`.
pub fn found(location: impl Into<String>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.into())]).into_response()
}

fn edit_path(gallery: &Gallery) -> String {
    format!("/galleries/{}/edit", gallery.id())
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert GalleryError to HTTP response.
///
/// Client errors answer with their message as plain text; internal errors
/// answer with the generic message and keep the detail in the log:
/// - 5xx errors are logged at ERROR level
/// - 404s are logged at DEBUG level
/// - other 4xx errors are logged at WARN level
impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            GalleryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            GalleryError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            GalleryError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            GalleryError::UnsupportedContent(_) => {
                (StatusCode::BAD_REQUEST, "unsupported_content")
            }
            GalleryError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let message = match &self {
            GalleryError::Internal(detail) => {
                error!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Server error: {}",
                    detail
                );
                GENERIC_ERROR_MESSAGE.to_string()
            }
            GalleryError::NotFound(message) => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Resource not found: {}",
                    message
                );
                message.clone()
            }
            GalleryError::Forbidden(message)
            | GalleryError::InvalidInput(message)
            | GalleryError::UnsupportedContent(message) => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Client error: {}",
                    message
                );
                message.clone()
            }
        };

        (status, message).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /`
pub async fn home_handler(State(state): State<AppState>, ctx: RenderContext) -> Response {
    state.views.home.execute(&ctx, &HomePage {}, &[])
}

/// `GET /galleries/new`
pub async fn new_gallery_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    Query(query): Query<NewGalleryQuery>,
) -> Response {
    let page = NewGalleryPage { title: query.title };
    state.views.new_gallery.execute(&ctx, &page, &[])
}

/// `POST /galleries`
///
/// Invalid titles re-render the form with the error; success redirects to
/// the edit page of the new gallery.
pub async fn create_gallery_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    RequireUser(user): RequireUser,
    Form(form): Form<GalleryForm>,
) -> Result<Response, GalleryError> {
    let title = match normalize_title(&form.title) {
        Ok(title) => title,
        Err(err) => {
            let page = NewGalleryPage { title: form.title };
            return Ok(state.views.new_gallery.execute(&ctx, &page, &[&err]));
        }
    };

    let gallery = state.galleries.create(&title, user.id).await?;
    info!(gallery_id = %gallery.id(), user_id = %user.id, "Created gallery");

    Ok(found(edit_path(&gallery)))
}

/// `GET /galleries`
pub async fn gallery_index_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    RequireUser(user): RequireUser,
) -> Result<Response, GalleryError> {
    let galleries = state.galleries.by_owner(user.id).await?;
    let page = GalleryIndexPage::new(&galleries);
    Ok(state.views.gallery_index.execute(&ctx, &page, &[]))
}

/// `GET /galleries/{id}`
pub async fn show_gallery_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let gallery = ResourceGuard::<Gallery>::new()
        .by_id(&*state.galleries, &id, ctx.principal())
        .await?;

    let images = state.images.list(gallery.id()).await?;
    let page = GalleryPage::new(&gallery, &images);
    Ok(state.views.show_gallery.execute(&ctx, &page, &[]))
}

/// `GET /galleries/{id}/edit`
pub async fn edit_gallery_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let gallery = owned_gallery(&state, &id, ctx.principal()).await?;

    let images = state.images.list(gallery.id()).await?;
    let page = GalleryPage::new(&gallery, &images);
    Ok(state.views.edit_gallery.execute(&ctx, &page, &[]))
}

/// `POST /galleries/{id}`
///
/// Invalid titles re-render the edit page with the submitted title and the
/// error; success redirects back to the edit page.
pub async fn update_gallery_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    Path(id): Path<String>,
    Form(form): Form<GalleryForm>,
) -> Result<Response, GalleryError> {
    let mut gallery = owned_gallery(&state, &id, ctx.principal()).await?;

    match normalize_title(&form.title) {
        Ok(title) => {
            state.galleries.update_title(gallery.id(), &title).await?;
            info!(gallery_id = %gallery.id(), "Renamed gallery");
            Ok(found(edit_path(&gallery)))
        }
        Err(err) => {
            let images = state.images.list(gallery.id()).await?;
            gallery.title = form.title;
            let page = GalleryPage::new(&gallery, &images);
            Ok(state.views.edit_gallery.execute(&ctx, &page, &[&err]))
        }
    }
}

/// `POST /galleries/{id}/delete`
pub async fn delete_gallery_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let gallery = owned_gallery(&state, &id, ctx.principal()).await?;

    state.images.delete_gallery(gallery.id()).await?;
    state.galleries.delete(gallery.id()).await?;
    info!(gallery_id = %gallery.id(), "Deleted gallery");

    Ok(found("/galleries"))
}

/// `GET /galleries/{id}/images/{filename}`
///
/// Public. The gallery must exist; the filename is reduced to its base name
/// before the lookup.
pub async fn image_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, GalleryError> {
    let gallery = ResourceGuard::<Gallery>::new()
        .by_id(&*state.galleries, &id, ctx.principal())
        .await?;

    let filename = sanitize_filename(&filename).map_err(|_| image_not_found())?;
    let image = Image::new(gallery.id(), filename);
    let data: Bytes = state
        .images
        .get(image.gallery_id, &image.filename)
        .await
        .map_err(not_found_as_image)?;

    Ok(([(header::CONTENT_TYPE, image.content_type())], data).into_response())
}

/// `POST /galleries/{id}/images`
///
/// The multipart body must carry a valid `csrf_token` field before any file.
/// Files are validated and stored in order; the first rejected file ends the
/// batch and earlier files stay stored. Parts are buffered in memory, bounded
/// by the route's body limit.
pub async fn upload_images_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    CsrfSubject(subject): CsrfSubject,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, GalleryError> {
    let gallery = owned_gallery(&state, &id, ctx.principal()).await?;

    let mut verified = false;
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(malformed_upload)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(CSRF_FIELD) => {
                let token = field.text().await.map_err(malformed_upload)?;
                state.csrf.verify(&subject, &token)?;
                verified = true;
            }
            Some(IMAGES_FIELD) => {
                if !verified {
                    return Err(CsrfError::MissingToken.into());
                }
                // Browsers send an unnamed empty part when no file is picked
                let raw_filename = match field.file_name() {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => continue,
                };
                let data = field.bytes().await.map_err(malformed_upload)?;
                files.push(IncomingFile::new(raw_filename, Cursor::new(data)));
            }
            _ => {}
        }
    }

    if !verified {
        return Err(CsrfError::MissingToken.into());
    }

    let report = state.uploads.accept_uploads(gallery.id(), files).await;
    let stored = report.into_result()?;
    info!(gallery_id = %gallery.id(), count = stored.len(), "Uploaded images");

    Ok(found(edit_path(&gallery)))
}

/// `POST /galleries/{id}/images/{filename}/delete`
pub async fn delete_image_handler(
    State(state): State<AppState>,
    ctx: RenderContext,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, GalleryError> {
    let gallery = owned_gallery(&state, &id, ctx.principal()).await?;

    let filename = sanitize_filename(&filename).map_err(|_| image_not_found())?;
    state
        .images
        .delete(gallery.id(), &filename)
        .await
        .map_err(not_found_as_image)?;
    info!(gallery_id = %gallery.id(), filename = %filename, "Deleted image");

    Ok(found(edit_path(&gallery)))
}

// =============================================================================
// Helpers
// =============================================================================

/// Resolve a gallery the principal must own.
async fn owned_gallery(
    state: &AppState,
    raw_id: &str,
    principal: Option<&Principal>,
) -> Result<Gallery, GalleryError> {
    let gallery = ResourceGuard::<Gallery>::new()
        .require(UserMustOwn)
        .by_id(&*state.galleries, raw_id, principal)
        .await?;
    Ok(gallery)
}

fn image_not_found() -> GalleryError {
    GalleryError::NotFound("Image not found".to_string())
}

fn not_found_as_image(err: StorageError) -> GalleryError {
    match err {
        StorageError::NotFound(_) => image_not_found(),
        other => other.into(),
    }
}

fn malformed_upload(err: axum::extract::multipart::MultipartError) -> GalleryError {
    warn!("Malformed multipart body: {}", err);
    GalleryError::InvalidInput(err.body_text())
}

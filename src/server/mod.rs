//! HTTP server layer for the gallery application.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          HTTP Layer                             │
//! │     session cookie ─► CSRF check ─► sign-in check ─► handler    │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌──────────┐  ┌──────────┐  │
//! │  │  handlers   │  │     auth     │  │  views   │  │  routes  │  │
//! │  │ (requests)  │  │(session/CSRF)│  │ (pages)  │  │ (router) │  │
//! │  └─────────────┘  └──────────────┘  └──────────┘  └──────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!          │ ResourceGuard       │ UploadValidator      │ TemplateSet
//!          ▼                     ▼                      ▼
//!       access                 upload                template
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod views;

pub use auth::{
    csrf_middleware, parse_cookie, require_user, session_middleware, CsrfError, CsrfGuard,
    CsrfSubject, CsrfToken, CurrentUser, RequireUser, CSRF_FIELD, CSRF_HEADER, SESSION_COOKIE,
    SIGNIN_PATH,
};
pub use handlers::{
    create_gallery_handler, delete_gallery_handler, delete_image_handler, edit_gallery_handler,
    found, gallery_index_handler, health_handler, home_handler, image_handler,
    new_gallery_handler, show_gallery_handler, update_gallery_handler, upload_images_handler,
    AppState, GalleryForm, HealthResponse, NewGalleryQuery, IMAGES_FIELD,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
pub use views::Views;

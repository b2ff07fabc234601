//! Router configuration for the gallery server.
//!
//! This module defines the HTTP routes and applies the session, CSRF and
//! sign-in middleware.
//!
//! # Route Structure
//!
//! ```text
//! /health                                        - Health check (public)
//! /                                              - Home page (public)
//! /galleries                           GET/POST  - List / create (signed in)
//! /galleries/new                                 - New gallery form (signed in)
//! /galleries/{id}                      GET       - Show gallery (public)
//! /galleries/{id}                      POST      - Update title (owner)
//! /galleries/{id}/edit                           - Edit page (owner)
//! /galleries/{id}/delete               POST      - Delete gallery (owner)
//! /galleries/{id}/images               POST      - Upload images (owner)
//! /galleries/{id}/images/{filename}    GET       - Serve image (public)
//! /galleries/{id}/images/{filename}/delete POST  - Delete image (owner)
//! ```
//!
//! Every request passes through the session middleware (resolves the
//! `session` cookie) and then the CSRF middleware (issues a token, verifies
//! it on `POST`). Signed-in and owner routes additionally redirect anonymous
//! requests to `/signin`.
//!
//! # Example
//!
//! ```ignore
//! use gallery_server::server::routes::{create_router, RouterConfig};
//!
//! let router = create_router(app_state, RouterConfig::new().with_max_upload_bytes(5 << 20));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::trace::TraceLayer;

use super::auth::{csrf_middleware, require_user, session_middleware};
use super::handlers::{
    create_gallery_handler, delete_gallery_handler, delete_image_handler, edit_gallery_handler,
    gallery_index_handler, health_handler, home_handler, image_handler, new_gallery_handler,
    show_gallery_handler, update_gallery_handler, upload_images_handler, AppState,
    UPLOAD_PATH,
};

/// Default request body limit for uploads (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 << 20;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Largest accepted upload request body, in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - Uploads are limited to 5 MiB
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }

    /// Set the upload body limit in bytes.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Public routes (health check, home, gallery and image views)
/// - Signed-in routes (gallery list, creation and every owner action)
/// - Session and CSRF middleware on all routes
/// - Request tracing (optional)
pub fn create_router(app_state: AppState, config: RouterConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/", get(home_handler))
        .route(
            "/galleries",
            signed_in(get(gallery_index_handler).post(create_gallery_handler)),
        )
        .route("/galleries/new", signed_in(get(new_gallery_handler)))
        .route(
            "/galleries/{id}",
            get(show_gallery_handler).merge(signed_in(post(update_gallery_handler))),
        )
        .route("/galleries/{id}/edit", signed_in(get(edit_gallery_handler)))
        .route(
            "/galleries/{id}/delete",
            signed_in(post(delete_gallery_handler)),
        )
        .route(
            UPLOAD_PATH,
            signed_in(
                post(upload_images_handler).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
            ),
        )
        .route("/galleries/{id}/images/{filename}", get(image_handler))
        .route(
            "/galleries/{id}/images/{filename}/delete",
            signed_in(post(delete_image_handler)),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            csrf_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            session_middleware,
        ))
        .with_state(app_state);

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Redirect anonymous requests for these methods to sign in.
fn signed_in(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn(require_user))
}

// =============================================================================
// Tests
// =============================================================================

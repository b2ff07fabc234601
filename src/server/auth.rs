//! Sessions and CSRF protection for the gallery server.
//!
//! # Sessions
//!
//! The `session` cookie is resolved through the
//! [`SessionStore`](crate::storage::SessionStore) collaborator
//! on every request. The resulting principal (or `None`) is stored as a
//! [`CurrentUser`] request extension; lookup failures are logged and treated as
//! anonymous.
//!
//! # CSRF Tokens
//!
//! Tokens are HMAC-SHA256 signatures binding the session subject (the session
//! cookie value, or `anonymous`) to an expiry:
//!
//! ```text
//! token     = "{expiry}.{hex signature}"
//! signature = HMAC-SHA256(secret_key, "{expiry}.{subject}")
//! ```
//!
//! A fresh token is issued for every request and exposed to templates through
//! `csrf_field()`. State-changing requests (`POST`) must echo a valid token,
//! either in the `x-csrf-token` header or in the `csrf_token` form field.
//! Multipart bodies are only accepted on the upload route, where the handler
//! checks their `csrf_token` field before reading any file. Any other route
//! receiving one without the header is rejected.
//!
//! # Example
//!
//! ```rust
//! use gallery_server::server::auth::CsrfGuard;
//! use std::time::Duration;
//!
//! let csrf = CsrfGuard::new("0123456789abcdef0123456789abcdef", Duration::from_secs(3600));
//! let token = csrf.issue("session-token");
//!
//! assert!(csrf.verify("session-token", &token).is_ok());
//! assert!(csrf.verify("someone-else", &token).is_err());
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::{self, Body},
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use url::form_urlencoded;

use super::handlers::{found, AppState, UPLOAD_PATH};
use crate::error::GalleryError;
use crate::model::Principal;
use crate::template::RenderContext;

// =============================================================================
// Constants
// =============================================================================

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Form field carrying the CSRF token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Header carrying the CSRF token for non-form clients.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Where anonymous requests to user-only pages are sent.
pub const SIGNIN_PATH: &str = "/signin";

/// CSRF subject shared by all requests without a session cookie.
const ANONYMOUS_SUBJECT: &str = "anonymous";

/// Largest urlencoded body buffered for token verification.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Types
// =============================================================================

/// CSRF verification errors.
#[derive(Debug, Clone)]
pub enum CsrfError {
    /// No token in the header or form body
    MissingToken,

    /// Token is not `{expiry}.{hex}`
    MalformedToken,

    /// Token has expired
    Expired {
        /// When the token expired
        expired_at: u64,
        /// Current time
        current_time: u64,
    },

    /// Token was not issued for this subject or secret
    InvalidSignature,

    /// The form body could not be buffered
    UnreadableBody,
}

impl std::fmt::Display for CsrfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsrfError::MissingToken => write!(f, "Missing CSRF token"),
            CsrfError::MalformedToken => write!(f, "Malformed CSRF token"),
            CsrfError::Expired {
                expired_at,
                current_time,
            } => write!(
                f,
                "CSRF token expired at {} (current time: {})",
                expired_at, current_time
            ),
            CsrfError::InvalidSignature => write!(f, "Invalid CSRF token"),
            CsrfError::UnreadableBody => write!(f, "Request body could not be read"),
        }
    }
}

impl std::error::Error for CsrfError {}

impl CsrfError {
    fn status(&self) -> StatusCode {
        match self {
            CsrfError::UnreadableBody => StatusCode::BAD_REQUEST,
            _ => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for CsrfError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = match &self {
            CsrfError::MissingToken => "missing_csrf_token",
            CsrfError::MalformedToken => "malformed_csrf_token",
            CsrfError::Expired { .. } => "csrf_token_expired",
            CsrfError::InvalidSignature => "invalid_csrf_token",
            CsrfError::UnreadableBody => "unreadable_body",
        };

        // Expired tokens are routine, anything else is logged at warn
        match &self {
            CsrfError::Expired { .. } => debug!(
                error_type = error_type,
                status = status.as_u16(),
                "CSRF check failed: {}",
                self
            ),
            _ => warn!(
                error_type = error_type,
                status = status.as_u16(),
                "CSRF check failed: {}",
                self
            ),
        }

        (status, self.to_string()).into_response()
    }
}

impl From<CsrfError> for GalleryError {
    fn from(err: CsrfError) -> Self {
        match &err {
            CsrfError::UnreadableBody => GalleryError::InvalidInput(err.to_string()),
            _ => GalleryError::Forbidden(err.to_string()),
        }
    }
}

// =============================================================================
// CSRF Guard
// =============================================================================

/// Issues and verifies CSRF tokens bound to a session subject.
#[derive(Clone)]
pub struct CsrfGuard {
    /// Secret key for HMAC computation
    secret_key: Vec<u8>,

    /// Lifetime of issued tokens
    ttl: Duration,
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CsrfGuard {
    /// Create a guard with the given secret and token lifetime.
    ///
    /// The secret should be at least 32 bytes; [`crate::Config::validate`]
    /// enforces this for the binary.
    pub fn new(secret_key: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject` valid for the configured lifetime.
    pub fn issue(&self, subject: &str) -> String {
        self.issue_with_expiry(subject, now_secs() + self.ttl.as_secs())
    }

    /// Issue a token for `subject` expiring at the given Unix timestamp.
    pub fn issue_with_expiry(&self, subject: &str, expiry: u64) -> String {
        format!("{}.{}", expiry, self.compute_signature(subject, expiry))
    }

    /// Verify that `token` was issued for `subject` and has not expired.
    pub fn verify(&self, subject: &str, token: &str) -> Result<(), CsrfError> {
        let (expiry, signature) = token.split_once('.').ok_or(CsrfError::MalformedToken)?;
        let expiry = expiry
            .parse::<u64>()
            .map_err(|_| CsrfError::MalformedToken)?;

        let current_time = now_secs();
        if current_time > expiry {
            return Err(CsrfError::Expired {
                expired_at: expiry,
                current_time,
            });
        }

        let provided_sig = hex::decode(signature).map_err(|_| CsrfError::MalformedToken)?;
        let expected_sig = self.compute_mac(subject, expiry);

        if provided_sig.ct_eq(&expected_sig).into() {
            Ok(())
        } else {
            Err(CsrfError::InvalidSignature)
        }
    }

    fn compute_mac(&self, subject: &str, expiry: u64) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(format!("{}.{}", expiry, subject).as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn compute_signature(&self, subject: &str, expiry: u64) -> String {
        hex::encode(self.compute_mac(subject, expiry))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Request Extensions
// =============================================================================

/// The principal resolved from the session cookie, if any.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<Principal>);

/// The CSRF token issued for this request.
#[derive(Debug, Clone, Default)]
pub struct CsrfToken(pub String);

/// CSRF subject of the request (session cookie value or `anonymous`).
#[derive(Debug, Clone)]
pub struct CsrfSubject(pub String);

/// Read a cookie value from the request headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Resolve the session cookie into a [`CurrentUser`] extension.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = parse_cookie(request.headers(), SESSION_COOKIE);

    let principal = match token.as_deref() {
        Some(token) => match state.sessions.principal(token).await {
            Ok(principal) => principal,
            Err(err) => {
                warn!("Session lookup failed, continuing anonymously: {}", err);
                None
            }
        },
        None => None,
    };

    if let Some(principal) = &principal {
        debug!(user_id = %principal.id, "Resolved session");
    }

    let subject = token.unwrap_or_else(|| ANONYMOUS_SUBJECT.to_string());
    request.extensions_mut().insert(CsrfSubject(subject));
    request.extensions_mut().insert(CurrentUser(principal));

    next.run(request).await
}

/// Issue a CSRF token for every request and verify it on `POST`.
///
/// Must run after [`session_middleware`].
pub async fn csrf_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, CsrfError> {
    let subject = request
        .extensions()
        .get::<CsrfSubject>()
        .map(|subject| subject.0.clone())
        .unwrap_or_else(|| ANONYMOUS_SUBJECT.to_string());

    if request.method() == Method::POST {
        request = verify_request(&state.csrf, &subject, request).await?;
    }

    let token = state.csrf.issue(&subject);
    request.extensions_mut().insert(CsrfToken(token));

    Ok(next.run(request).await)
}

async fn verify_request(
    csrf: &CsrfGuard,
    subject: &str,
    request: Request,
) -> Result<Request, CsrfError> {
    if let Some(token) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        csrf.verify(subject, token)?;
        return Ok(request);
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        return if is_upload_route(&request) {
            Ok(request)
        } else {
            debug!(path = %request.uri().path(), "Multipart body outside the upload route");
            Err(CsrfError::MissingToken)
        };
    }

    if !content_type.starts_with("application/x-www-form-urlencoded") {
        return Err(CsrfError::MissingToken);
    }

    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| CsrfError::UnreadableBody)?;

    let token = form_urlencoded::parse(&bytes)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
        .ok_or(CsrfError::MissingToken)?;
    csrf.verify(subject, &token)?;

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn is_upload_route(request: &Request) -> bool {
    request
        .extensions()
        .get::<MatchedPath>()
        .is_some_and(|path| path.as_str() == UPLOAD_PATH)
}

/// Redirect anonymous requests to the sign-in page.
pub async fn require_user(request: Request, next: Next) -> Response {
    let signed_in = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|user| user.0.is_some());

    if signed_in {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "Redirecting anonymous request to sign in");
        found(SIGNIN_PATH)
    }
}

// =============================================================================
// Extractors
// =============================================================================

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned().unwrap_or_default())
    }
}

impl<S> FromRequestParts<S> for CsrfSubject
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CsrfSubject>()
            .cloned()
            .unwrap_or_else(|| CsrfSubject(ANONYMOUS_SUBJECT.to_string())))
    }
}

/// The signed-in principal; anonymous requests are redirected to sign in.
#[derive(Debug, Clone)]
pub struct RequireUser(pub Principal);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(CurrentUser(Some(principal))) => Ok(RequireUser(principal.clone())),
            _ => Err(found(SIGNIN_PATH)),
        }
    }
}

impl<S> FromRequestParts<S> for RenderContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<CurrentUser>()
            .and_then(|user| user.0.clone());
        let token = parts
            .extensions
            .get::<CsrfToken>()
            .map(|token| token.0.clone())
            .unwrap_or_default();

        Ok(RenderContext::new(principal, token))
    }
}

// =============================================================================
// Tests
// =============================================================================

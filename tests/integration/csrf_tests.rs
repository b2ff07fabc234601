//! CSRF protection integration tests.
//!
//! Tests verify:
//! - Every rendered form carries a token bound to the session
//! - POSTs without a token, or with a foreign, forged or expired one, are rejected
//! - The header form of the token is accepted
//! - Multipart uploads must carry the token before any file
//! - Multipart bodies are refused on every route but the upload one

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use gallery_server::storage::{EntityLookup, GalleryStore};
use gallery_server::UserId;

use super::test_utils::{
    assert_redirect, body_string, png_bytes, MultipartBuilder, TestApp, ALICE, BOB,
};

/// Pull the first `csrf_token` value out of a rendered page.
fn token_from_html(html: &str) -> String {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker).expect("page has a csrf field") + marker.len();
    let end = html[start..].find('"').unwrap() + start;
    html[start..end].to_string()
}

#[tokio::test]
async fn test_rendered_token_is_accepted() {
    let app = TestApp::new();

    let html = body_string(app.get("/galleries/new", Some(ALICE)).await).await;
    let token = token_from_html(&html);

    let response = app
        .post_raw_form(
            "/galleries",
            Some(ALICE),
            &[("title", "Trip"), ("csrf_token", &token)],
        )
        .await;
    assert_redirect(&response, "/galleries/1/edit");
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let app = TestApp::new();

    let response = app
        .post_raw_form("/galleries", Some(ALICE), &[("title", "Trip")])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "Missing CSRF token");

    assert!(app.galleries.by_owner(UserId(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_anonymous_post_without_token_rejected_before_signin() {
    let app = TestApp::new();

    let response = app.post_raw_form("/galleries", None, &[("title", "Trip")]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_from_other_session_rejected() {
    let app = TestApp::new();
    let bob_token = app.token(Some(BOB));

    let response = app
        .post_raw_form(
            "/galleries",
            Some(ALICE),
            &[("title", "Trip"), ("csrf_token", &bob_token)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "Invalid CSRF token");
}

#[tokio::test]
async fn test_malformed_and_expired_tokens_rejected() {
    let app = TestApp::new();
    let expired = app.csrf.issue_with_expiry(ALICE, 1_000);

    for token in ["garbage", "123.nothex", expired.as_str()] {
        let response = app
            .post_raw_form(
                "/galleries",
                Some(ALICE),
                &[("title", "Trip"), ("csrf_token", token)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", token);
    }
}

#[tokio::test]
async fn test_header_token_accepted() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;

    let request = Request::post(format!("/galleries/{}/delete", gallery.id()))
        .header(header::COOKIE, format!("session={}", ALICE))
        .header("x-csrf-token", app.token(Some(ALICE)))
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_redirect(&response, "/galleries");
    assert!(app.galleries.by_id(gallery.id().0).await.is_err());
}

#[tokio::test]
async fn test_non_form_body_without_header_rejected() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;

    let request = Request::post(format!("/galleries/{}/delete", gallery.id()))
        .header(header::COOKIE, format!("session={}", ALICE))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"csrf_token":"x"}"#))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.galleries.by_id(gallery.id().0).await.is_ok());
}

#[tokio::test]
async fn test_get_requests_need_no_token() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;

    let response = app
        .get(&format!("/galleries/{}/edit", gallery.id()), Some(ALICE))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Multipart
// =============================================================================

#[tokio::test]
async fn test_upload_without_token_rejected() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let png = png_bytes();

    let body = MultipartBuilder::new().file("images", "a.png", &png).build();
    let response = app
        .post_multipart(&format!("/galleries/{}/images", gallery.id()), Some(ALICE), body)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.stored(gallery.id()).await.is_empty());
}

#[tokio::test]
async fn test_upload_with_token_after_files_rejected() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let png = png_bytes();
    let token = app.token(Some(ALICE));

    let body = MultipartBuilder::new()
        .file("images", "a.png", &png)
        .text("csrf_token", &token)
        .build();
    let response = app
        .post_multipart(&format!("/galleries/{}/images", gallery.id()), Some(ALICE), body)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.stored(gallery.id()).await.is_empty());
}

#[tokio::test]
async fn test_upload_with_foreign_token_rejected() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let png = png_bytes();
    let token = app.token(Some(BOB));

    let body = MultipartBuilder::new()
        .text("csrf_token", &token)
        .file("images", "a.png", &png)
        .build();
    let response = app
        .post_multipart(&format!("/galleries/{}/images", gallery.id()), Some(ALICE), body)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.stored(gallery.id()).await.is_empty());
}

#[tokio::test]
async fn test_multipart_delete_image_without_token_rejected() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    app.put_image(gallery.id(), "a.png", &png_bytes()).await;

    let body = MultipartBuilder::new().text("confirm", "yes").build();
    let response = app
        .post_multipart(
            &format!("/galleries/{}/images/a.png/delete", gallery.id()),
            Some(ALICE),
            body,
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "Missing CSRF token");
    assert_eq!(app.stored(gallery.id()).await, vec!["a.png"]);
}

#[tokio::test]
async fn test_multipart_delete_gallery_without_token_rejected() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;

    let response = app
        .post_multipart(
            &format!("/galleries/{}/delete", gallery.id()),
            Some(ALICE),
            MultipartBuilder::new().build(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.galleries.by_id(gallery.id().0).await.is_ok());
}

#[tokio::test]
async fn test_multipart_with_form_token_outside_upload_rejected() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let token = app.token(Some(ALICE));

    let body = MultipartBuilder::new().text("csrf_token", &token).build();
    let response = app
        .post_multipart(&format!("/galleries/{}/delete", gallery.id()), Some(ALICE), body)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.galleries.by_id(gallery.id().0).await.is_ok());
}

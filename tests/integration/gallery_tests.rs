//! Gallery page and ownership integration tests.
//!
//! Tests verify:
//! - Public pages render for anonymous visitors
//! - Signed-in pages redirect anonymous visitors to sign in
//! - Owner-only actions answer 403 for other users and 404 for bad ids
//! - Create, rename and delete flows redirect where expected

use axum::http::StatusCode;

use gallery_server::storage::{EntityLookup, GalleryStore};
use gallery_server::{GalleryId, Owned, UserId};

use super::test_utils::{assert_redirect, body_string, png_bytes, TestApp, ALICE, BOB};

// =============================================================================
// Public Pages
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_home_page_anonymous_and_signed_in() {
    let app = TestApp::new();

    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("Sign in"));
    assert!(!html.contains("alice@example.com"));

    let html = body_string(app.get("/", Some(ALICE)).await).await;
    assert!(html.contains("alice@example.com"));
    assert!(html.contains(r#"href="/galleries""#));
}

#[tokio::test]
async fn test_unknown_session_is_anonymous() {
    let app = TestApp::new();

    let html = body_string(app.get("/", Some("stale-token")).await).await;
    assert!(html.contains("Sign in"));
}

#[tokio::test]
async fn test_show_gallery_is_public() {
    let app = TestApp::new();
    let gallery = app.gallery("Summer <Trip>", 1).await;
    app.put_image(gallery.id(), "beach one.png", &png_bytes()).await;

    let response = app.get(&format!("/galleries/{}", gallery.id()), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains("Summer &lt;Trip&gt;"));
    assert!(!html.contains("<Trip>"));
    assert!(html.contains("beach%20one.png"));
}

#[tokio::test]
async fn test_show_gallery_bad_ids() {
    let app = TestApp::new();
    app.gallery("Trip", 1).await;

    for uri in ["/galleries/abc", "/galleries/0", "/galleries/-3", "/galleries/99"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    let body = body_string(app.get("/galleries/abc", None).await).await;
    assert_eq!(body, "Invalid ID");

    let body = body_string(app.get("/galleries/99", None).await).await;
    assert_eq!(body, "Gallery not found");
}

// =============================================================================
// Sign-in Requirement
// =============================================================================

#[tokio::test]
async fn test_signed_in_pages_redirect_anonymous() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;

    for uri in [
        "/galleries".to_string(),
        "/galleries/new".to_string(),
        format!("/galleries/{}/edit", gallery.id()),
    ] {
        let response = app.get(&uri, None).await;
        assert_redirect(&response, "/signin");
    }
}

#[tokio::test]
async fn test_anonymous_post_with_token_redirects_to_signin() {
    let app = TestApp::new();

    let response = app.post_form("/galleries", None, &[("title", "Trip")]).await;
    assert_redirect(&response, "/signin");
    assert!(app.galleries.by_owner(UserId(1)).await.unwrap().is_empty());
}

// =============================================================================
// Create and List
// =============================================================================

#[tokio::test]
async fn test_new_gallery_form_prefills_title() {
    let app = TestApp::new();

    let response = app.get("/galleries/new?title=Road%20Trip", Some(ALICE)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains(r#"value="Road Trip""#));
    assert!(html.contains(r#"name="csrf_token""#));
}

#[tokio::test]
async fn test_create_gallery_redirects_to_edit() {
    let app = TestApp::new();

    let response = app
        .post_form("/galleries", Some(ALICE), &[("title", "  Road Trip  ")])
        .await;
    assert_redirect(&response, "/galleries/1/edit");

    let gallery = app.galleries.by_id(1).await.unwrap();
    assert_eq!(gallery.title, "Road Trip");
    assert_eq!(gallery.owner(), UserId(1));
}

#[tokio::test]
async fn test_create_gallery_invalid_title_rerenders_form() {
    let app = TestApp::new();

    let response = app.post_form("/galleries", Some(ALICE), &[("title", "   ")]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains(r#"class="error""#));
    assert!(app.galleries.by_owner(UserId(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_index_lists_only_own_galleries() {
    let app = TestApp::new();
    app.gallery("Alice One", 1).await;
    app.gallery("Bob One", 2).await;
    app.gallery("Alice Two", 1).await;

    let html = body_string(app.get("/galleries", Some(ALICE)).await).await;
    assert!(html.contains("Alice One"));
    assert!(html.contains("Alice Two"));
    assert!(!html.contains("Bob One"));
}

// =============================================================================
// Owner Actions
// =============================================================================

#[tokio::test]
async fn test_edit_page_owner_only() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let uri = format!("/galleries/{}/edit", gallery.id());

    let response = app.get(&uri, Some(ALICE)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains(r#"enctype="multipart/form-data""#));

    let response = app.get(&uri, Some(BOB)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_string(response).await,
        "You are not authorized to edit this gallery"
    );

    let response = app.get("/galleries/42/edit", Some(BOB)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rename_gallery() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let uri = format!("/galleries/{}", gallery.id());

    let response = app.post_form(&uri, Some(BOB), &[("title", "Mine now")]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post_form(&uri, Some(ALICE), &[("title", "Trip 2")]).await;
    assert_redirect(&response, &format!("/galleries/{}/edit", gallery.id()));

    let renamed = app.galleries.by_id(gallery.id().0).await.unwrap();
    assert_eq!(renamed.title, "Trip 2");
    assert_eq!(renamed.owner(), UserId(1));
}

#[tokio::test]
async fn test_rename_gallery_invalid_title_keeps_old_title() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let long_title = "x".repeat(500);

    let response = app
        .post_form(
            &format!("/galleries/{}", gallery.id()),
            Some(ALICE),
            &[("title", &long_title)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains(r#"class="error""#));

    assert_eq!(app.galleries.by_id(gallery.id().0).await.unwrap().title, "Trip");
}

#[tokio::test]
async fn test_delete_gallery_removes_images() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let other = app.gallery("Other", 1).await;
    app.put_image(gallery.id(), "a.png", &png_bytes()).await;
    app.put_image(other.id(), "b.png", &png_bytes()).await;

    let uri = format!("/galleries/{}/delete", gallery.id());

    let response = app.post_form(&uri, Some(BOB), &[]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.stored(gallery.id()).await, vec!["a.png"]);

    let response = app.post_form(&uri, Some(ALICE), &[]).await;
    assert_redirect(&response, "/galleries");

    assert!(app.galleries.by_id(gallery.id().0).await.is_err());
    assert!(app.stored(gallery.id()).await.is_empty());
    assert_eq!(app.stored(other.id()).await, vec!["b.png"]);

    let response = app.get(&format!("/galleries/{}", gallery.id()), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_missing_gallery() {
    let app = TestApp::new();

    let response = app
        .post_form(&format!("/galleries/{}/delete", GalleryId(7)), Some(ALICE), &[])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

//! Upload and image serving integration tests.
//!
//! Tests verify:
//! - Valid batches are stored and redirect to the edit page
//! - The first rejected file ends the batch, earlier files stay stored
//! - Traversal filenames are reduced to their base name
//! - Images are served publicly with their content type
//! - Image deletion is owner-only

use axum::http::{header, StatusCode};
use http_body_util::BodyExt;

use gallery_server::RouterConfig;

use super::test_utils::{
    assert_redirect, body_string, exe_bytes, gif_bytes, jpeg_bytes, png_bytes, MultipartBuilder,
    TestApp, ALICE, BOB,
};

// =============================================================================
// Uploads
// =============================================================================

#[tokio::test]
async fn test_upload_batch_stored() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let (png, jpeg, gif) = (png_bytes(), jpeg_bytes(), gif_bytes());

    let response = app
        .upload(
            &format!("/galleries/{}/images", gallery.id()),
            Some(ALICE),
            &[("a.png", &png[..]), ("b.JPG", &jpeg[..]), ("c.gif", &gif[..])],
        )
        .await;

    assert_redirect(&response, &format!("/galleries/{}/edit", gallery.id()));
    assert_eq!(app.stored(gallery.id()).await, vec!["a.png", "b.JPG", "c.gif"]);
}

#[tokio::test]
async fn test_upload_stops_at_first_rejected_file() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let (png, exe, jpeg) = (png_bytes(), exe_bytes(), jpeg_bytes());

    let response = app
        .upload(
            &format!("/galleries/{}/images", gallery.id()),
            Some(ALICE),
            &[("a.png", &png[..]), ("b.exe", &exe[..]), ("c.jpg", &jpeg[..])],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("b.exe has an invalid content type or extension"));
    assert!(body.contains("png, gif, jpeg and jpg"));

    assert_eq!(app.stored(gallery.id()).await, vec!["a.png"]);
}

#[tokio::test]
async fn test_upload_rejects_disguised_content() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let exe = exe_bytes();

    let response = app
        .upload(
            &format!("/galleries/{}/images", gallery.id()),
            Some(ALICE),
            &[("holiday.png", &exe[..])],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.stored(gallery.id()).await.is_empty());
}

#[tokio::test]
async fn test_upload_strips_directories() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let png = png_bytes();

    let response = app
        .upload(
            &format!("/galleries/{}/images", gallery.id()),
            Some(ALICE),
            &[("../../etc/passwd.png", &png[..])],
        )
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(app.stored(gallery.id()).await, vec!["passwd.png"]);
}

#[tokio::test]
async fn test_upload_filename_reducing_to_nothing() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let png = png_bytes();

    let response = app
        .upload(
            &format!("/galleries/{}/images", gallery.id()),
            Some(ALICE),
            &[("../..", &png[..])],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.stored(gallery.id()).await.is_empty());
}

#[tokio::test]
async fn test_upload_skips_empty_file_part() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let token = app.token(Some(ALICE));

    let body = MultipartBuilder::new()
        .text("csrf_token", &token)
        .file("images", "", b"")
        .build();
    let response = app
        .post_multipart(&format!("/galleries/{}/images", gallery.id()), Some(ALICE), body)
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(app.stored(gallery.id()).await.is_empty());
}

#[tokio::test]
async fn test_upload_owner_only() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let png = png_bytes();
    let uri = format!("/galleries/{}/images", gallery.id());

    let response = app.upload(&uri, Some(BOB), &[("a.png", &png[..])]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.upload(&uri, None, &[("a.png", &png[..])]).await;
    assert_redirect(&response, "/signin");

    let response = app.upload("/galleries/99/images", Some(ALICE), &[("a.png", &png[..])]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(app.stored(gallery.id()).await.is_empty());
}

#[tokio::test]
async fn test_upload_body_limit() {
    let app = TestApp::with_config(
        RouterConfig::new()
            .with_tracing(false)
            .with_max_upload_bytes(1024),
    );
    let gallery = app.gallery("Trip", 1).await;
    let mut big = png_bytes();
    big.resize(8 * 1024, 0);

    let response = app
        .upload(
            &format!("/galleries/{}/images", gallery.id()),
            Some(ALICE),
            &[("big.png", &big[..])],
        )
        .await;

    assert!(response.status().is_client_error());
    assert!(app.stored(gallery.id()).await.is_empty());
}

// =============================================================================
// Serving
// =============================================================================

#[tokio::test]
async fn test_image_served_publicly() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let jpeg = jpeg_bytes();
    app.put_image(gallery.id(), "my photo.jpg", &jpeg).await;

    let response = app
        .get(&format!("/galleries/{}/images/my%20photo.jpg", gallery.id()), None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], &jpeg[..]);
}

#[tokio::test]
async fn test_image_not_found_cases() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    app.put_image(gallery.id(), "a.png", &png_bytes()).await;

    let response = app
        .get(&format!("/galleries/{}/images/missing.png", gallery.id()), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Image not found");

    let response = app.get("/galleries/99/images/a.png", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/galleries/x/images/a.png", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_image_path_traversal_stays_in_gallery() {
    let app = TestApp::new();
    let first = app.gallery("First", 1).await;
    let second = app.gallery("Second", 2).await;
    app.put_image(first.id(), "secret.png", &png_bytes()).await;

    let response = app
        .get(
            &format!(
                "/galleries/{}/images/..%2F..%2F{}%2Fsecret.png",
                second.id(),
                first.id()
            ),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_image() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    app.put_image(gallery.id(), "a b.png", &png_bytes()).await;
    app.put_image(gallery.id(), "c.png", &png_bytes()).await;
    let uri = format!("/galleries/{}/images/a%20b.png/delete", gallery.id());

    let response = app.post_form(&uri, Some(BOB), &[]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.stored(gallery.id()).await, vec!["a b.png", "c.png"]);

    let response = app.post_form(&uri, Some(ALICE), &[]).await;
    assert_redirect(&response, &format!("/galleries/{}/edit", gallery.id()));
    assert_eq!(app.stored(gallery.id()).await, vec!["c.png"]);

    let response = app.post_form(&uri, Some(ALICE), &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edit_page_links_uploaded_images() {
    let app = TestApp::new();
    let gallery = app.gallery("Trip", 1).await;
    let png = png_bytes();

    app.upload(
        &format!("/galleries/{}/images", gallery.id()),
        Some(ALICE),
        &[("my photo#1.png", &png[..])],
    )
    .await;

    let html = body_string(
        app.get(&format!("/galleries/{}/edit", gallery.id()), Some(ALICE))
            .await,
    )
    .await;
    assert!(html.contains("my%20photo%231.png/delete"));
}

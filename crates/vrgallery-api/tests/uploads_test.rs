//! Upload and asset lifecycle integration tests.
//!
//! Run with: `cargo test -p vrgallery-api --test uploads_test`

mod helpers;

use axum::http::StatusCode;
use axum_test::multipart::MultipartForm;
use helpers::fixtures::{jpeg_part, text_part};
use helpers::{api_path, setup_test_app, BASE_URL};
use serde_json::{json, Value};

const MB: usize = 1024 * 1024;

async fn upload_one(app: &helpers::TestApp, name: &str) -> String {
    let form = MultipartForm::new().add_part("file", jpeg_part(name, 1024));
    let response = app.client().post(&api_path("/uploads")).multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()["url"]
        .as_str()
        .expect("url in response")
        .to_string()
}

#[tokio::test]
async fn test_upload_then_delete_twice() {
    let app = setup_test_app().await;
    let client = app.client();

    let form = MultipartForm::new()
        .add_part("file", jpeg_part("portrait.jpg", 2048))
        .add_text("folder", "artists");
    let response = client.post(&api_path("/uploads")).multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let body: Value = response.json();
    let url = body["url"].as_str().unwrap().to_string();
    let key = body["key"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("{}/uploads/artists/", BASE_URL)));
    assert!(url.ends_with("-portrait.jpg"));
    assert_eq!(body["size_bytes"], 2048);
    assert_eq!(body["content_type"], "image/jpeg");

    let timestamp = key
        .trim_start_matches("artists/")
        .split('-')
        .next()
        .unwrap();
    assert!(timestamp.parse::<i64>().is_ok(), "key {} lacks a timestamp", key);
    assert_eq!(std::fs::metadata(app.stored_path(&key)).unwrap().len(), 2048);

    let response = client
        .delete(&api_path("/uploads"))
        .add_query_param("url", &url)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "deleted": true }));
    assert!(!app.stored_path(&key).exists());

    let response = client
        .delete(&api_path("/uploads"))
        .add_query_param("url", &url)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "deleted": false }));
}

#[tokio::test]
async fn test_stored_file_is_served() {
    let app = setup_test_app().await;
    let url = upload_one(&app, "served.jpg").await;

    let path = url.trim_start_matches(BASE_URL);
    let response = app.client().get(path).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.as_bytes().len(), 1024);
}

#[tokio::test]
async fn test_non_image_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("file", text_part("notes.txt"));
    let response = app.client().post(&api_path("/uploads")).multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert!(!app.temp_dir.path().join("artists").exists());
}

#[tokio::test]
async fn test_oversized_gallery_upload_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("workImages", jpeg_part("huge.jpg", 11 * MB));
    let response = app
        .client()
        .post(&api_path("/uploads/batch"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

    let form = MultipartForm::new()
        .add_part("profileImage", jpeg_part("me.jpg", 6 * MB))
        .add_part("workImages", jpeg_part("work.jpg", 5 * MB));
    let response = app
        .client()
        .post(&api_path("/uploads/gallery"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!app.temp_dir.path().join("artists").exists());
}

#[tokio::test]
async fn test_batch_keeps_request_order() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("workImages", jpeg_part("first.jpg", 300))
        .add_part("workImages", jpeg_part("second.jpg", 200))
        .add_part("workImages", jpeg_part("third.jpg", 100))
        .add_text("folder", "staff");
    let response = app
        .client()
        .post(&api_path("/uploads/batch"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let body: Value = response.json();
    let files = body["files"].as_array().unwrap();
    let names: Vec<&str> = files.iter().map(|f| f["url"].as_str().unwrap()).collect();
    assert!(names[0].ends_with("-first.jpg"));
    assert!(names[1].ends_with("-second.jpg"));
    assert!(names[2].ends_with("-third.jpg"));
    assert!(names.iter().all(|u| u.contains("/uploads/staff/")));
}

#[tokio::test]
async fn test_gallery_groups_by_field() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("profileImage", jpeg_part("me.jpg", 100))
        .add_part("workImages", jpeg_part("a.jpg", 100))
        .add_part("workImages", jpeg_part("b.jpg", 100));
    let response = app
        .client()
        .post(&api_path("/uploads/gallery"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["fields"]["profileImage"].as_array().unwrap().len(), 1);
    assert_eq!(body["fields"]["workImages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_second_profile_image_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("profileImage", jpeg_part("one.jpg", 100))
        .add_part("profileImage", jpeg_part("two.jpg", 100));
    let response = app
        .client()
        .post(&api_path("/uploads/gallery"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_folder_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("file", jpeg_part("a.jpg", 100))
        .add_text("folder", "../etc");
    let response = app.client().post(&api_path("/uploads")).multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replace_deletes_only_dropped_urls() {
    let app = setup_test_app().await;
    let a = upload_one(&app, "a.jpg").await;
    let b = upload_one(&app, "b.jpg").await;
    let c = upload_one(&app, "c.jpg").await;

    let response = app
        .client()
        .post(&api_path("/assets/replace"))
        .json(&json!({ "previous": [a, b], "next": [b, c] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let report: Value = response.json();
    assert_eq!(report["deleted"], json!([a]));
    assert_eq!(report["missing"], json!([]));
    assert_eq!(report["failed"], json!([]));

    // b and c are still stored
    for url in [&b, &c] {
        let response = app
            .client()
            .delete(&api_path("/uploads"))
            .add_query_param("url", url)
            .await;
        assert_eq!(response.json::<Value>(), json!({ "deleted": true }));
    }
}

#[tokio::test]
async fn test_release_reports_missing_and_foreign_urls() {
    let app = setup_test_app().await;
    let kept = upload_one(&app, "kept.jpg").await;
    let foreign = "https://elsewhere.example.com/photo.jpg";

    let response = app
        .client()
        .post(&api_path("/assets/release"))
        .json(&json!({ "urls": [kept, foreign, ""] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let report: Value = response.json();
    assert_eq!(report["deleted"], json!([kept]));
    assert_eq!(report["missing"], json!([foreign]));
}

#[tokio::test]
async fn test_health_reports_backend() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["backend"], "local");
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["paths"]["/api/v0/uploads"].is_object());
}

//! Upload integration tests.
//!
//! Tests verify:
//! - Multipart uploads create records and originals on disk
//! - Response URLs point at fetchable renditions
//! - Rejected uploads (wrong type, empty, missing field, too large)

use axum::http::StatusCode;
use tower::ServiceExt;

use rendition_server::record::ImageRecords;
use rendition_server::RouterConfig;

use super::test_utils::{
    body_bytes, body_json, create_test_jpeg, create_test_png, dimensions_of, get,
    upload_request, Part, TestEnv,
};

#[tokio::test]
async fn test_upload_single_image() {
    let env = TestEnv::new().await;
    let png = create_test_png(300, 200);
    let router = env.router();

    let response = router
        .clone()
        .oneshot(upload_request(
            "/upload",
            &[Part {
                field: "images",
                file_name: "Holiday Photo.png",
                content_type: "image/png",
                data: &png,
            }],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["host"].is_null());

    let images = json["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    let image = &images[0];
    let id = image["id"].as_str().unwrap();
    assert_eq!(image["size"], png.len() as u64);
    assert!(image["name"].as_str().unwrap().ends_with("-holiday-photo.png"));

    for size in ["thumb", "medium", "full"] {
        assert_eq!(image["urls"][size], format!("/image/{}/{}", size, id));
    }

    let record = env.records.lookup(id).await.unwrap().unwrap();
    assert_eq!(std::fs::read(&record.path).unwrap(), png);
    assert!(record.path.starts_with(env.source_dir()));

    let thumb_url = image["urls"]["thumb"].as_str().unwrap();
    let thumb = router.oneshot(get(thumb_url)).await.unwrap();
    assert_eq!(thumb.status(), StatusCode::OK);
    let body = body_bytes(thumb).await;
    assert_eq!(dimensions_of(&body), (100, 100));
}

#[tokio::test]
async fn test_upload_with_display_name() {
    let env = TestEnv::new().await;

    let response = env
        .router()
        .oneshot(upload_request(
            "/upload?name=Front%20Cover",
            &[Part {
                field: "images",
                file_name: "IMG_0001.jpg",
                content_type: "image/png",
                data: &create_test_png(32, 32),
            }],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let name = json["images"][0]["name"].as_str().unwrap();
    assert!(name.ends_with("-front-cover.png"), "got {}", name);
}

#[tokio::test]
async fn test_upload_with_public_url() {
    let env = TestEnv::new().await;

    let router = env.router_with(
        RouterConfig::new()
            .with_tracing(false)
            .with_public_url(Some("https://img.example.com/".to_string())),
    );
    let response = router
        .oneshot(upload_request(
            "/upload?pretier=1",
            &[Part {
                field: "images",
                file_name: "a.jpg",
                content_type: "image/jpeg",
                data: &create_test_jpeg(16, 16),
            }],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["host"], "https://img.example.com");

    let id = json["images"][0]["id"].as_str().unwrap();
    assert_eq!(
        json["images"][0]["urls"]["thumb"],
        format!("https://img.example.com/image/thumb/{}", id)
    );
}

#[tokio::test]
async fn test_upload_with_public_url_defaults_to_relative_urls() {
    let env = TestEnv::new().await;

    let router = env.router_with(
        RouterConfig::new()
            .with_tracing(false)
            .with_public_url(Some("https://img.example.com".to_string())),
    );
    let response = router
        .oneshot(upload_request(
            "/upload",
            &[Part {
                field: "images",
                file_name: "a.jpg",
                content_type: "image/jpeg",
                data: &create_test_jpeg(16, 16),
            }],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["host"], "https://img.example.com");

    let id = json["images"][0]["id"].as_str().unwrap();
    assert_eq!(
        json["images"][0]["urls"]["thumb"],
        format!("/image/thumb/{}", id)
    );
}

#[tokio::test]
async fn test_upload_multiple_images() {
    let env = TestEnv::new().await;
    let first = create_test_jpeg(20, 20);
    let second = create_test_png(30, 30);

    let response = env
        .router()
        .oneshot(upload_request(
            "/upload",
            &[
                Part {
                    field: "images",
                    file_name: "first.jpg",
                    content_type: "image/jpeg",
                    data: &first,
                },
                Part {
                    field: "images",
                    file_name: "second.png",
                    content_type: "image/png",
                    data: &second,
                },
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let images = json["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_ne!(images[0]["id"], images[1]["id"]);
    assert_eq!(env.records.len().await, 2);
}

#[tokio::test]
async fn test_upload_ignores_other_fields() {
    let env = TestEnv::new().await;
    let jpeg = create_test_jpeg(20, 20);

    let response = env
        .router()
        .oneshot(upload_request(
            "/upload",
            &[
                Part {
                    field: "attachment",
                    file_name: "other.jpg",
                    content_type: "image/jpeg",
                    data: &jpeg,
                },
                Part {
                    field: "images",
                    file_name: "kept.jpg",
                    content_type: "image/jpeg",
                    data: &jpeg,
                },
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["images"].as_array().unwrap().len(), 1);
}

// =============================================================================
// Rejected Uploads
// =============================================================================

#[tokio::test]
async fn test_upload_unsupported_type() {
    let env = TestEnv::new().await;

    let response = env
        .router()
        .oneshot(upload_request(
            "/upload",
            &[Part {
                field: "images",
                file_name: "notes.txt",
                content_type: "text/plain",
                data: b"hello",
            }],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unsupported_type");
    assert!(env.records.is_empty().await);
}

#[tokio::test]
async fn test_upload_without_images_field() {
    let env = TestEnv::new().await;

    let response = env
        .router()
        .oneshot(upload_request(
            "/upload",
            &[Part {
                field: "file",
                file_name: "a.jpg",
                content_type: "image/jpeg",
                data: &create_test_jpeg(8, 8),
            }],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_upload");
}

#[tokio::test]
async fn test_upload_empty_file() {
    let env = TestEnv::new().await;

    let response = env
        .router()
        .oneshot(upload_request(
            "/upload",
            &[Part {
                field: "images",
                file_name: "empty.jpg",
                content_type: "image/jpeg",
                data: b"",
            }],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(env.records.is_empty().await);
}

#[tokio::test]
async fn test_upload_too_large() {
    let env = TestEnv::new().await;

    let router = env.router_with(
        RouterConfig::new()
            .with_tracing(false)
            .with_upload_max_bytes(64),
    );
    let response = router
        .oneshot(upload_request(
            "/upload",
            &[Part {
                field: "images",
                file_name: "big.jpg",
                content_type: "image/jpeg",
                data: &create_test_jpeg(64, 64),
            }],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(env.records.is_empty().await);
}

//! API integration tests for rendition retrieval and error handling.
//!
//! Tests verify:
//! - Crop, fit and original renditions through `GET /image/{size}/{id}`
//! - The default-size route and the informational endpoints
//! - Error cases (unknown size, missing image, broken originals)
//! - HTTP response codes, headers and error bodies

use axum::http::StatusCode;
use tower::ServiceExt;

use rendition_server::server::GENERIC_ERROR_MESSAGE;
use rendition_server::RouterConfig;

use super::test_utils::{
    body_bytes, body_json, create_test_jpeg, create_test_png, dimensions_of, get, TestEnv,
};

// =============================================================================
// Rendition Retrieval
// =============================================================================

#[tokio::test]
async fn test_thumb_is_cropped_and_cached() {
    let env = TestEnv::new().await;
    let record = env
        .seed("photo.jpg", "image/jpeg", create_test_jpeg(400, 300))
        .await;

    let response = env
        .router()
        .oneshot(get(&format!("/image/thumb/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=86400"
    );
    assert_eq!(
        response.headers().get("x-rendition-cache-hit").unwrap(),
        "false"
    );

    let body = body_bytes(response).await;
    assert_eq!(dimensions_of(&body), (100, 100));

    let cached = env.cache_dir().join("thumb").join(&record.id);
    assert_eq!(std::fs::read(&cached).unwrap(), body.to_vec());
    assert_eq!(env.transform_calls(), 1);
}

#[tokio::test]
async fn test_second_request_is_a_cache_hit() {
    let env = TestEnv::new().await;
    let record = env
        .seed("photo.jpg", "image/jpeg", create_test_jpeg(400, 300))
        .await;
    let router = env.router();
    let uri = format!("/image/thumb/{}", record.id);

    let first = router.clone().oneshot(get(&uri)).await.unwrap();
    let first_body = body_bytes(first).await;

    let second = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        second.headers().get("x-rendition-cache-hit").unwrap(),
        "true"
    );
    assert_eq!(body_bytes(second).await, first_body);

    assert_eq!(env.transform_calls(), 1);
}

#[tokio::test]
async fn test_fit_keeps_aspect_ratio_and_format() {
    let env = TestEnv::new().await;
    let record = env
        .seed("wide.png", "image/png", create_test_png(1280, 640))
        .await;

    let response = env
        .router()
        .oneshot(get(&format!("/image/medium/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(dimensions_of(&body_bytes(response).await), (640, 320));
}

#[tokio::test]
async fn test_fit_never_upscales() {
    let env = TestEnv::new().await;
    let record = env
        .seed("small.png", "image/png", create_test_png(200, 100))
        .await;

    let response = env
        .router()
        .oneshot(get(&format!("/image/medium/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(dimensions_of(&body_bytes(response).await), (200, 100));
}

#[tokio::test]
async fn test_original_size_returns_source_bytes() {
    let env = TestEnv::new().await;
    let source = create_test_jpeg(321, 123);
    let record = env.seed("photo.jpg", "image/jpeg", source.clone()).await;

    let response = env
        .router()
        .oneshot(get(&format!("/image/full/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.to_vec(), source);
}

#[tokio::test]
async fn test_default_route_serves_default_size() {
    let env = TestEnv::new().await;
    let source = create_test_png(64, 48);
    let record = env.seed("icon.png", "image/png", source.clone()).await;

    let response = env
        .router()
        .oneshot(get(&format!("/image/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.to_vec(), source);
    assert!(env.cache_dir().join("full").join(&record.id).is_file());
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    let env = TestEnv::new().await;
    let record = env
        .seed("photo.jpg", "image/jpeg", create_test_jpeg(50, 50))
        .await;

    let router = env.router_with(
        RouterConfig::new()
            .with_tracing(false)
            .with_cache_max_age(60),
    );
    let response = router
        .oneshot(get(&format!("/image/full/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60"
    );
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_unknown_size() {
    let env = TestEnv::new().await;
    let record = env
        .seed("photo.jpg", "image/jpeg", create_test_jpeg(50, 50))
        .await;

    let response = env
        .router()
        .oneshot(get(&format!("/image/doesnotexist/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unknown_size");
    assert_eq!(json["status"], 404);
    assert!(json["message"].as_str().unwrap().contains("doesnotexist"));

    assert_eq!(env.transform_calls(), 0);
    assert!(!env.cache_dir().join("doesnotexist").exists());
}

#[tokio::test]
async fn test_missing_image() {
    let env = TestEnv::new().await;

    let response = env
        .router()
        .oneshot(get("/image/thumb/00000000-0000-4000-8000-000000000000"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_path_traversal_is_not_found() {
    let env = TestEnv::new().await;

    let response = env
        .router()
        .oneshot(get("/image/full/..%2Fdb.json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_broken_original_hides_details_in_production() {
    let env = TestEnv::new().await;
    let record = env
        .seed("fake.jpg", "image/jpeg", b"definitely not an image".to_vec())
        .await;

    let response = env
        .router()
        .oneshot(get(&format!("/image/thumb/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "transform_failed");
    assert_eq!(json["message"], GENERIC_ERROR_MESSAGE);

    assert!(!env.cache_dir().join("thumb").join(&record.id).exists());
}

#[tokio::test]
async fn test_broken_original_shows_details_in_debug() {
    let env = TestEnv::new().await;
    let record = env
        .seed("fake.jpg", "image/jpeg", b"definitely not an image".to_vec())
        .await;

    let router = env.router_with(RouterConfig::new().with_tracing(false).with_debug(true));
    let response = router
        .oneshot(get(&format!("/image/thumb/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    let message = json["message"].as_str().unwrap();
    assert_ne!(message, GENERIC_ERROR_MESSAGE);
    assert!(message.contains("Transform failed"));
}

#[tokio::test]
async fn test_deleted_original_is_source_unavailable() {
    let env = TestEnv::new().await;
    let record = env
        .seed("photo.jpg", "image/jpeg", create_test_jpeg(50, 50))
        .await;
    std::fs::remove_file(&record.path).unwrap();

    let response = env
        .router()
        .oneshot(get(&format!("/image/thumb/{}", record.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "source_unavailable");
}

// =============================================================================
// Informational Endpoints
// =============================================================================

#[tokio::test]
async fn test_info_endpoint() {
    let env = TestEnv::new().await;

    let response = env.router().oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "rendition-server");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["description"].is_string());
    assert_eq!(json["license"], "MIT");
}

#[tokio::test]
async fn test_health_endpoint() {
    let env = TestEnv::new().await;

    let response = env.router().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_sizes_endpoint() {
    let env = TestEnv::new().await;

    let response = env.router().oneshot(get("/sizes")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["thumb"]["mode"], "crop");
    assert_eq!(json["thumb"]["width"], 100);
    assert_eq!(json["medium"]["mode"], "fit");
    assert_eq!(json["full"]["mode"], "original");
}

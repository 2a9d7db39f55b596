//! Cache behaviour integration tests.
//!
//! Tests verify:
//! - Concurrent requests for one rendition share a single transform
//! - `DELETE /cache` drops renditions and keeps originals
//! - Cache directories exist for every configured size

use axum::http::StatusCode;
use tower::ServiceExt;

use super::test_utils::{body_bytes, body_json, create_test_jpeg, delete, get, TestEnv};

#[tokio::test]
async fn test_directories_created_at_startup() {
    let env = TestEnv::new().await;

    for size in ["thumb", "medium", "full"] {
        assert!(env.cache_dir().join(size).is_dir(), "missing {}", size);
    }
}

#[tokio::test]
async fn test_custom_catalog_directories() {
    let env = TestEnv::with_sizes(&["tiny=16x16:crop", "full=original"]).await;

    assert!(env.cache_dir().join("tiny").is_dir());
    assert!(env.cache_dir().join("full").is_dir());
    assert!(!env.cache_dir().join("thumb").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_transform() {
    let env = TestEnv::new().await;
    let record = env
        .seed("photo.jpg", "image/jpeg", create_test_jpeg(800, 600))
        .await;
    let router = env.router();
    let uri = format!("/image/medium/{}", record.id);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = router.clone();
        let uri = uri.clone();
        handles.push(tokio::spawn(async move {
            let response = router.oneshot(get(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            body_bytes(response).await
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        bodies.push(handle.await.unwrap());
    }

    assert_eq!(env.transform_calls(), 1);
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(env.service.in_flight_count().await, 0);
}

#[tokio::test]
async fn test_clear_drops_renditions_and_regenerates() {
    let env = TestEnv::new().await;
    let record = env
        .seed("photo.jpg", "image/jpeg", create_test_jpeg(400, 300))
        .await;
    let router = env.router();
    let uri = format!("/image/thumb/{}", record.id);

    let first = router.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let cached = env.cache_dir().join("thumb").join(&record.id);
    assert!(cached.is_file());

    let cleared = router.clone().oneshot(delete("/cache")).await.unwrap();
    assert_eq!(cleared.status(), StatusCode::OK);
    let json = body_json(cleared).await;
    assert_eq!(json["sizes"]["thumb"]["mode"], "crop");
    assert_eq!(json["sizes"]["full"]["mode"], "original");

    assert!(!cached.exists());
    for size in ["thumb", "medium", "full"] {
        assert!(env.cache_dir().join(size).is_dir());
    }

    let again = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(
        again.headers().get("x-rendition-cache-hit").unwrap(),
        "false"
    );
    assert_eq!(env.transform_calls(), 2);
    assert!(cached.is_file());
}

#[tokio::test]
async fn test_clear_keeps_originals_and_records() {
    let env = TestEnv::new().await;
    let record = env
        .seed("photo.jpg", "image/jpeg", create_test_jpeg(64, 64))
        .await;

    let response = env.router().oneshot(delete("/cache")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(record.path.is_file());
    assert_eq!(env.records.len().await, 1);

    let response = env
        .router()
        .oneshot(get(&format!("/image/full/{}", record.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_clear_removes_stray_entries() {
    let env = TestEnv::new().await;
    std::fs::write(env.cache_dir().join("stray.txt"), b"leftover").unwrap();
    std::fs::create_dir_all(env.cache_dir().join("retired")).unwrap();

    let response = env.router().oneshot(delete("/cache")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(!env.cache_dir().join("stray.txt").exists());
    assert!(!env.cache_dir().join("retired").exists());
}

#[tokio::test]
async fn test_clear_on_empty_cache() {
    let env = TestEnv::new().await;

    let first = env.router().oneshot(delete("/cache")).await.unwrap();
    let second = env.router().oneshot(delete("/cache")).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(env.transform_calls(), 0);
}

//! Integration tests for chunked uploads and stitched content reads.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::fixtures::{multipart_body, multipart_content_type, seeded_bytes};
use common::TestServer;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Send a multipart upload and return status plus parsed JSON body.
async fn upload(
    server: &TestServer,
    token: Option<&str>,
    text_fields: &[(&str, &str)],
    part: &[u8],
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/uploads")
        .header("Content-Type", multipart_content_type());
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let request = builder
        .body(Body::from(multipart_body(text_fields, part)))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Fetch record content; returns the raw response.
async fn get_content(
    server: &TestServer,
    token: Option<&str>,
    record_id: &str,
    extra_headers: &[(&str, &str)],
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method("GET")
        .uri(format!("/v1/records/{record_id}/content"));
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    server
        .router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Upload a multi-part file and return (record_id, expected content).
async fn upload_parts(
    server: &TestServer,
    token: &str,
    name: &str,
    visibility: &str,
    part_sizes: &[usize],
) -> (String, Vec<u8>) {
    let total: usize = part_sizes.iter().sum();
    let parts: Vec<_> = part_sizes
        .iter()
        .enumerate()
        .map(|(i, &len)| seeded_bytes(i as u64 + 1, len))
        .collect();

    let total_str = total.to_string();
    let (status, body) = upload(
        server,
        Some(token),
        &[
            ("part_sequence", "00000000"),
            ("total_size", &total_str),
            ("display_name", name),
            ("visibility", visibility),
        ],
        &parts[0],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    let record_id = body["recordId"].as_str().unwrap().to_string();

    for (i, part) in parts.iter().enumerate().skip(1) {
        let seq = format!("{i:08}");
        let (status, body) = upload(
            server,
            Some(token),
            &[("target_record_id", &record_id), ("part_sequence", &seq)],
            part,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "append {i} failed: {body}");
    }

    let expected: Vec<u8> = parts.iter().flat_map(|p| p.to_vec()).collect();
    (record_id, expected)
}

#[tokio::test]
async fn test_upload_requires_identity() {
    let server = TestServer::new().await;
    let (status, body) = upload(
        &server,
        None,
        &[
            ("part_sequence", "00000000"),
            ("total_size", "4"),
            ("display_name", "x.txt"),
        ],
        b"data",
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "authentication_required");
}

#[tokio::test]
async fn test_multi_part_upload_stitches_in_sequence_order() {
    let server = TestServer::new().await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, expected) =
        upload_parts(&server, &token, "video.bin", "private", &[5000, 5000, 2000]).await;

    let response = get_content(&server, Some(&token), &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-length"],
        expected.len().to_string().as_str()
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), expected.as_slice());
}

#[tokio::test]
async fn test_duplicate_part_delivery_is_noop() {
    let server = TestServer::new().await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, expected) =
        upload_parts(&server, &token, "doc.txt", "private", &[1024, 1024]).await;

    // Redeliver sequence 1 with different bytes; it must change nothing.
    let (status, body) = upload(
        &server,
        Some(&token),
        &[("target_record_id", &record_id), ("part_sequence", "00000001")],
        b"different bytes",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let version_after = body["version"].as_i64().unwrap();

    // The stored blob for sequence 1 still holds the original bytes.
    let rid = satchel_core::record::RecordId::parse(&record_id).unwrap();
    let blob = server
        .state
        .storage
        .get(&satchel_storage::part_key(&rid, 1))
        .await
        .unwrap();
    assert_eq!(blob, seeded_bytes(2, 1024));

    let response = get_content(&server, Some(&token), &record_id, &[]).await;
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), expected.as_slice());

    // Version matches the record's current version (no bump for the dup).
    let (_, meta) = json_get(&server, &token, &format!("/v1/records/{record_id}")).await;
    assert_eq!(meta["version"].as_i64().unwrap(), version_after);
    assert_eq!(meta["parts"].as_array().unwrap().len(), 2);
}

async fn json_get(server: &TestServer, token: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_append_by_non_owner_is_forbidden() {
    let server = TestServer::new().await;
    let owner_token = server.create_principal(Uuid::new_v4(), None).await;
    let other_token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, _) = upload_parts(&server, &owner_token, "a.txt", "private", &[64]).await;

    let (status, body) = upload(
        &server,
        Some(&other_token),
        &[("target_record_id", &record_id), ("part_sequence", "00000001")],
        b"intruder",
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn test_oversize_part_rejected() {
    let server = TestServer::with_config(|c| c.server.max_part_size = 1024).await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let big = seeded_bytes(9, 2048);
    let (status, body) = upload(
        &server,
        Some(&token),
        &[
            ("part_sequence", "00000000"),
            ("total_size", "2048"),
            ("display_name", "big.bin"),
        ],
        &big,
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "payload_too_large");
}

#[tokio::test]
async fn test_invalid_part_sequence_rejected() {
    let server = TestServer::new().await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let (status, _) = upload(
        &server,
        Some(&token),
        &[
            ("part_sequence", "0000000a"),
            ("total_size", "4"),
            ("display_name", "x.txt"),
        ],
        b"data",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_private_content_access_split() {
    let server = TestServer::new().await;
    let owner_token = server.create_principal(Uuid::new_v4(), None).await;
    let other_token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, _) = upload_parts(&server, &owner_token, "secret.txt", "private", &[32]).await;

    // Anonymous caller: 401 so it can retry with credentials.
    let response = get_content(&server, None, &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Identified caller without access: 403, fatal.
    let response = get_content(&server, Some(&other_token), &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Owner reads fine.
    let response = get_content(&server, Some(&owner_token), &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_shared_content_readable_anonymously() {
    let server = TestServer::new().await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, expected) =
        upload_parts(&server, &token, "shared.txt", "shared-view", &[64]).await;

    let response = get_content(&server, None, &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), expected.as_slice());
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let server = TestServer::new().await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let response = get_content(&server, Some(&token), &Uuid::new_v4().to_string(), &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conditional_read_short_circuits_to_304() {
    let server = TestServer::new().await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, _) = upload_parts(&server, &token, "doc.pdf", "private", &[256]).await;

    let response = get_content(&server, Some(&token), &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers()["etag"].to_str().unwrap().to_string();
    let last_modified = response.headers()["last-modified"]
        .to_str()
        .unwrap()
        .to_string();

    // Matching ETag: 304, empty body.
    let response =
        get_content(&server, Some(&token), &record_id, &[("If-None-Match", &etag)]).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());

    // Matching If-Modified-Since alone: also 304.
    let response = get_content(
        &server,
        Some(&token),
        &record_id,
        &[("If-Modified-Since", &last_modified)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    // Stale ETag: full response.
    let response = get_content(
        &server,
        Some(&token),
        &record_id,
        &[("If-None-Match", "\"stale\"")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_content_classification_headers() {
    let server = TestServer::new().await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let (image_id, _) = upload_parts(&server, &token, "photo.png", "private", &[64]).await;
    let response = get_content(&server, Some(&token), &image_id, &[]).await;
    assert_eq!(response.headers()["content-type"], "image/png");
    assert!(response.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("inline"));

    // HTML never renders inline, whatever the extension says.
    let (html_id, _) = upload_parts(&server, &token, "page.html", "private", &[64]).await;
    let response = get_content(&server, Some(&token), &html_id, &[]).await;
    assert_eq!(response.headers()["content-type"], "text/html");
    assert!(response.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let (blob_id, _) = upload_parts(&server, &token, "mystery.xyz", "private", &[64]).await;
    let response = get_content(&server, Some(&token), &blob_id, &[]).await;
    assert_eq!(
        response.headers()["content-type"],
        "application/octet-stream"
    );
}

#[tokio::test]
async fn test_thumbnail_variant() {
    let server = TestServer::new().await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, _) = upload_parts(&server, &token, "photo.jpg", "private", &[512]).await;

    // No thumbnail rendered yet.
    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/records/{record_id}/content?variant=thumbnail"))
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The rendering layer drops a thumb blob into storage.
    let rid = satchel_core::record::RecordId::parse(&record_id).unwrap();
    let thumb = seeded_bytes(42, 200);
    server
        .state
        .storage
        .put(&satchel_storage::thumb_key(&rid), thumb.clone())
        .await
        .unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/records/{record_id}/content?variant=thumbnail"))
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");
    assert_eq!(response.headers()["content-disposition"], "inline");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes, thumb);
}

#[tokio::test]
async fn test_shaped_download_takes_minimum_duration() {
    // 8 KiB at 16 KiB/s must take at least ~500ms end to end.
    let server = TestServer::with_config(|c| c.server.download_rate_limit = 16 * 1024).await;
    let token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, expected) =
        upload_parts(&server, &token, "capped.bin", "private", &[4096, 4096]).await;

    let started = std::time::Instant::now();
    let response = get_content(&server, Some(&token), &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(bytes.as_ref(), expected.as_slice());
    assert!(
        elapsed >= std::time::Duration::from_millis(450),
        "download finished too fast: {elapsed:?}"
    );
}

#[tokio::test]
async fn test_delete_record_owner_only() {
    let server = TestServer::new().await;
    let owner_token = server.create_principal(Uuid::new_v4(), None).await;
    let other_token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, _) = upload_parts(&server, &owner_token, "gone.txt", "private", &[64]).await;

    // Non-owner cannot delete.
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/v1/records/{record_id}"))
        .header("Authorization", format!("Bearer {other_token}"))
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Owner delete succeeds and removes content and blobs.
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/v1/records/{record_id}"))
        .header("Authorization", format!("Bearer {owner_token}"))
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_content(&server, Some(&owner_token), &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let rid = satchel_core::record::RecordId::parse(&record_id).unwrap();
    let key = satchel_storage::part_key(&rid, 0);
    assert!(!server.state.storage.exists(&key).await.unwrap());
}

async fn patch_visibility(
    server: &TestServer,
    token: &str,
    record_id: &str,
    visibility: &str,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/v1/records/{record_id}"))
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from(format!(r#"{{"visibility":"{visibility}"}}"#)))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_visibility_update_changes_access_and_version() {
    let server = TestServer::new().await;
    let owner_token = server.create_principal(Uuid::new_v4(), None).await;
    let other_token = server.create_principal(Uuid::new_v4(), None).await;

    let (record_id, expected) =
        upload_parts(&server, &owner_token, "memo.txt", "private", &[64]).await;

    // Private: anonymous reads blocked.
    let response = get_content(&server, None, &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Non-owner cannot change visibility.
    let (status, body) = patch_visibility(&server, &other_token, &record_id, "shared-view").await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (_, before) = json_get(&server, &owner_token, &format!("/v1/records/{record_id}")).await;
    let version_before = before["version"].as_i64().unwrap();

    // Owner flips it to shared-view; a fresh version is minted.
    let (status, body) = patch_visibility(&server, &owner_token, &record_id, "shared-view").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let version_after = body["version"].as_i64().unwrap();
    assert!(version_after > version_before);

    // Now readable anonymously, with the metadata reflecting the change.
    let response = get_content(&server, None, &record_id, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), expected.as_slice());

    let (_, meta) = json_get(&server, &owner_token, &format!("/v1/records/{record_id}")).await;
    assert_eq!(meta["visibility"], "shared-view");
    assert_eq!(meta["version"].as_i64().unwrap(), version_after);
}

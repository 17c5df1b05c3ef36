//! Integration tests for the `/api/v1/jobs` status, download and cancel endpoints.

mod common;

use std::time::Duration;

use axum::http::{header, StatusCode};
use common::{body_bytes, body_json, get, post_json, wait_for_terminal};
use genrelay_core::provider::{GeneratedMedia, OperationStatus};
use serde_json::json;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

async fn submit(app: &common::TestApp, body: serde_json::Value) -> String {
    let json = body_json(post_json(app.app(), "/api/v1/generate", body).await).await;
    json["data"]["jobId"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Test: unknown job id is 404 for status, download and cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = common::build_test_app();

    for uri in [
        "/api/v1/jobs/vid_doesnotexist",
        "/api/v1/jobs/vid_doesnotexist/download",
    ] {
        let response = get(app.app(), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }

    let response = post_json(app.app(), "/api/v1/jobs/vid_doesnotexist/cancel", json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: completed image downloads with its MIME type and attachment name
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_image_downloads_as_attachment() {
    let app = common::build_test_app();
    let job_id = submit(&app, json!({ "model": "imagen4", "prompt": "a red fox" })).await;

    let response = get(app.app(), &format!("/api/v1/jobs/{job_id}/download")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CONTENT_LENGTH], "8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION].to_str().unwrap(),
        format!("attachment; filename=\"imagen4_{job_id}.png\"")
    );
    assert_eq!(body_bytes(response).await, PNG_SIGNATURE);
}

// ---------------------------------------------------------------------------
// Test: download before completion is 409 NOT_READY
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_while_processing_returns_409() {
    let app = common::build_test_app();
    let job_id = submit(&app, json!({ "model": "veo3", "prompt": "ocean waves" })).await;

    let response = get(app.app(), &format!("/api/v1/jobs/{job_id}/download")).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_READY");
    assert!(json["error"].as_str().unwrap().contains("processing"));
}

// ---------------------------------------------------------------------------
// Test: video completes in the background and becomes downloadable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn video_completes_and_downloads() {
    let app = common::build_test_app_with(
        |config| config.poll_interval_secs = 0,
        std::sync::Arc::new(genrelay_core::provider::StaticTokenSource::new("t")),
    );
    app.provider.push_poll(Ok(OperationStatus::Pending));
    app.provider
        .push_poll(Ok(OperationStatus::Done(GeneratedMedia::Inline {
            data_base64: "AAAAIGZ0eXA=".into(),
            mime_type: "video/mp4".into(),
        })));

    let job_id = submit(&app, json!({ "model": "veo2", "prompt": "city lights" })).await;
    let json = wait_for_terminal(&app, &job_id).await;
    let data = &json["data"];

    assert_eq!(data["status"], "completed");
    assert_eq!(data["fileType"], "video/mp4");
    assert!(data["completedAt"].is_string());

    let response = get(app.app(), &format!("/api/v1/jobs/{job_id}/download")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        body_bytes(response).await,
        [0x00, 0x00, 0x00, 0x20, b'f', b't', b'y', b'p']
    );
}

// ---------------------------------------------------------------------------
// Test: remote-only output is reported but not downloadable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remote_video_output_is_not_downloadable() {
    let app = common::build_test_app_with(
        |config| config.poll_interval_secs = 0,
        std::sync::Arc::new(genrelay_core::provider::StaticTokenSource::new("t")),
    );
    app.provider
        .push_poll(Ok(OperationStatus::Done(GeneratedMedia::Remote {
            uri: "gs://bucket/out/sample_0.mp4".into(),
        })));

    let job_id = submit(&app, json!({ "model": "veo3", "prompt": "ocean waves" })).await;
    let json = wait_for_terminal(&app, &job_id).await;

    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["output"], "remote");
    assert_eq!(json["data"]["remoteUri"], "gs://bucket/out/sample_0.mp4");

    let response = get(app.app(), &format!("/api/v1/jobs/{job_id}/download")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "NOT_READY");
}

// ---------------------------------------------------------------------------
// Test: a video that never finishes times out after the attempt budget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn video_times_out_after_max_attempts() {
    let app = common::build_test_app_with(
        |config| {
            config.poll_interval_secs = 0;
            config.poll_max_attempts = 3;
        },
        std::sync::Arc::new(genrelay_core::provider::StaticTokenSource::new("t")),
    );

    let job_id = submit(&app, json!({ "model": "veo3", "prompt": "ocean waves" })).await;
    let json = wait_for_terminal(&app, &job_id).await;

    assert_eq!(json["data"]["status"], "timeout");
    assert!(json["data"]["errorDetail"]
        .as_str()
        .unwrap()
        .contains("3 polling attempts"));
    assert_eq!(app.provider.poll_calls(), 3);

    let response = get(app.app(), &format!("/api/v1/jobs/{job_id}/download")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Test: provider-reported failure ends the job in error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_failure_ends_job_in_error() {
    let app = common::build_test_app_with(
        |config| config.poll_interval_secs = 0,
        std::sync::Arc::new(genrelay_core::provider::StaticTokenSource::new("t")),
    );
    app.provider.push_poll(Ok(OperationStatus::Failed(
        "Operation failed (code 3): prompt rejected".into(),
    )));

    let job_id = submit(&app, json!({ "model": "veo3", "prompt": "ocean waves" })).await;
    let json = wait_for_terminal(&app, &job_id).await;

    assert_eq!(json["data"]["status"], "error");
    assert_eq!(
        json["data"]["errorDetail"],
        "Operation failed (code 3): prompt rejected"
    );
}

// ---------------------------------------------------------------------------
// Test: cancel stops a processing video; cancelling again conflicts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_ends_processing_video_in_error() {
    let app = common::build_test_app();
    let job_id = submit(&app, json!({ "model": "veo3", "prompt": "ocean waves" })).await;

    let response = post_json(app.app(), &format!("/api/v1/jobs/{job_id}/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = wait_for_terminal(&app, &job_id).await;
    assert_eq!(json["data"]["status"], "error");
    assert!(json["data"]["errorDetail"]
        .as_str()
        .unwrap()
        .contains("cancelled"));

    let response = post_json(app.app(), &format!("/api/v1/jobs/{job_id}/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/jobs lists jobs newest first and shows active pollers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_jobs_is_newest_first() {
    let app = common::build_test_app();
    let first = submit(&app, json!({ "model": "imagen3", "prompt": "a lighthouse" })).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = submit(&app, json!({ "model": "veo3", "prompt": "ocean waves" })).await;

    let response = get(app.app(), "/api/v1/jobs").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["jobId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    let health = body_json(get(app.app(), "/health").await).await;
    assert_eq!(health["active_pollers"], 1);
}

// ---------------------------------------------------------------------------
// Test: repeated status reads of a finished job are identical
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_status_is_stable() {
    let app = common::build_test_app();
    let job_id = submit(&app, json!({ "model": "imagen4-fast", "prompt": "a red fox" })).await;

    let uri = format!("/api/v1/jobs/{job_id}");
    let first = body_json(get(app.app(), &uri).await).await;
    let second = body_json(get(app.app(), &uri).await).await;

    assert_eq!(first["data"]["status"], "completed");
    assert_eq!(first, second);
}

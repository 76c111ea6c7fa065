mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::app::spawn_test_app;
use common::http::{assert_json_error, assert_status_ok_json, request, response_json};
use gesture_pager::gesture::types::GestureEvent;

#[tokio::test]
async fn it_reliable_batch_updates_threshold_and_detector() {
    let app = spawn_test_app().await;
    let mut events = app.state.subscribe_events();

    let resp = request(
        &app.app,
        Method::POST,
        "/api/calibration/batch",
        Some(json!({
            "gestureType": "blink",
            "samples": [0.40, 0.41, 0.39, 0.40, 0.40],
        })),
    )
    .await;
    let (status, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["isReliable"], true);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["sampleSize"], 5);
    // 运行时上下文 guitar/good/50：环境系数为 1
    let recommended = body["data"]["recommendedThreshold"].as_f64().unwrap();
    assert!((recommended - 0.40).abs() < 1e-9);

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event within timeout")
        .expect("event");
    assert!(matches!(event, GestureEvent::CalibrationCompleted { .. }));

    let resp = request(
        &app.app,
        Method::GET,
        "/api/calibration/threshold?gestureType=blink",
        None,
    )
    .await;
    let (status, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["source"]["kind"], "exact");
    assert_eq!(body["data"]["status"], "completed");

    let resp = request(&app.app, Method::GET, "/api/active-profile", None).await;
    let (_, body) = response_json(resp).await;
    assert_eq!(body["data"]["thresholds"]["adaptive"], true);
    let blink = body["data"]["thresholds"]["blinkThreshold"].as_f64().unwrap();
    assert!((blink - 0.40).abs() < 1e-9);
}

#[tokio::test]
async fn it_unreliable_batch_leaves_threshold_unchanged() {
    let app = spawn_test_app().await;

    let resp = request(
        &app.app,
        Method::POST,
        "/api/calibration/batch",
        Some(json!({ "gestureType": "blink", "samples": [0.4, 0.41] })),
    )
    .await;
    let (status, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["isReliable"], false);
    assert_eq!(body["data"]["status"], "unreliable");

    let resp = request(
        &app.app,
        Method::GET,
        "/api/calibration/threshold?gestureType=blink",
        None,
    )
    .await;
    let (_, body) = response_json(resp).await;
    assert_eq!(body["data"]["source"]["kind"], "base");
    assert_eq!(body["data"]["value"], 0.3);
}

#[tokio::test]
async fn it_explicit_context_applies_lighting_factor() {
    let app = spawn_test_app().await;

    let resp = request(
        &app.app,
        Method::POST,
        "/api/calibration/batch",
        Some(json!({
            "gestureType": "mouthOpen",
            "context": { "instrument": "vocal", "lighting": "poor", "userDistanceCm": 50 },
            "samples": [0.5, 0.5, 0.5, 0.5, 0.5],
        })),
    )
    .await;
    let (_, body) = response_json(resp).await;
    let recommended = body["data"]["recommendedThreshold"].as_f64().unwrap();
    // poor 光照 1.2 × vocal/mouthOpen 0.8
    assert!((recommended - 0.5 * 1.2 * 0.8).abs() < 1e-9);

    // 相似上下文（距离 60，其余相同）可以复用该值
    let resp = request(
        &app.app,
        Method::GET,
        "/api/calibration/threshold?gestureType=mouthOpen&instrument=vocal&lighting=poor&distanceCm=60",
        None,
    )
    .await;
    let (_, body) = response_json(resp).await;
    assert_eq!(body["data"]["source"]["kind"], "similar");
    assert_eq!(body["data"]["context"]["userDistanceCm"], 60);
}

#[tokio::test]
async fn it_batch_rejects_too_many_samples() {
    let app = spawn_test_app().await;

    let samples = vec![0.3; 1_001];
    let resp = request(
        &app.app,
        Method::POST,
        "/api/calibration/batch",
        Some(json!({ "gestureType": "blink", "samples": samples })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn it_feedback_adjusts_threshold() {
    let app = spawn_test_app().await;

    let resp = request(
        &app.app,
        Method::POST,
        "/api/calibration/feedback",
        Some(json!({ "gestureType": "blink", "feedback": "tooSensitive" })),
    )
    .await;
    let (status, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    let threshold = body["data"]["threshold"].as_f64().unwrap();
    assert!((threshold - 0.36).abs() < 1e-9);

    let resp = request(
        &app.app,
        Method::POST,
        "/api/calibration/feedback",
        Some(json!({ "gestureType": "blink", "feedback": "tooInsensitive" })),
    )
    .await;
    let (_, body) = response_json(resp).await;
    let lowered = body["data"]["threshold"].as_f64().unwrap();
    assert!(lowered < threshold);
}

#[tokio::test]
async fn it_outcomes_drive_accuracy_and_report() {
    let app = spawn_test_app().await;

    for success in [true, true, true, false] {
        let resp = request(
            &app.app,
            Method::POST,
            "/api/calibration/outcomes",
            Some(json!({ "gestureType": "headShake", "success": success })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = request(
        &app.app,
        Method::GET,
        "/api/calibration/report?gestureType=headShake",
        None,
    )
    .await;
    let (status, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["accuracy"], 0.75);
    assert_eq!(body["data"]["historySize"], 0);
}

#[tokio::test]
async fn it_schedules_and_lists_optimization_tasks() {
    let app = spawn_test_app().await;

    let resp = request(
        &app.app,
        Method::POST,
        "/api/calibration/optimization-tasks",
        Some(json!({ "gestureType": "blink", "targetAccuracy": 0.9 })),
    )
    .await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["gestureType"], "blink");
    assert_eq!(body["data"]["context"]["instrument"], "guitar");

    let resp = request(
        &app.app,
        Method::GET,
        "/api/calibration/optimization-tasks",
        None,
    )
    .await;
    let (_, body) = response_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let resp = request(
        &app.app,
        Method::POST,
        "/api/calibration/optimization-tasks",
        Some(json!({ "gestureType": "blink", "targetAccuracy": 1.5 })),
    )
    .await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_TARGET_ACCURACY");
}

#[tokio::test]
async fn it_threshold_query_validates_parameters() {
    let app = spawn_test_app().await;

    let resp = request(&app.app, Method::GET, "/api/calibration/threshold", None).await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_PARAMETER");

    let resp = request(
        &app.app,
        Method::GET,
        "/api/calibration/threshold?gestureType=wink",
        None,
    )
    .await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_PARAMETER");
}

#[tokio::test]
async fn it_history_lists_batches() {
    let app = spawn_test_app().await;

    for gesture in ["blink", "headShake"] {
        request(
            &app.app,
            Method::POST,
            "/api/calibration/batch",
            Some(json!({ "gestureType": gesture, "samples": [0.5, 0.5, 0.5] })),
        )
        .await;
    }

    let resp = request(&app.app, Method::GET, "/api/calibration/history", None).await;
    let (_, body) = response_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let resp = request(
        &app.app,
        Method::GET,
        "/api/calibration/history?gestureType=blink",
        None,
    )
    .await;
    let (_, body) = response_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn it_config_reload_validates() {
    let app = spawn_test_app().await;

    let resp = request(&app.app, Method::GET, "/api/calibration/config", None).await;
    let (status, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["similarityThreshold"], 0.8);

    let mut config = body["data"].clone();
    config["learningRate"] = json!(0.0);
    let resp = request(&app.app, Method::PUT, "/api/calibration/config", Some(config.clone())).await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_CONFIG");

    config["learningRate"] = json!(0.25);
    let resp = request(&app.app, Method::PUT, "/api/calibration/config", Some(config)).await;
    let (status, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["learningRate"], 0.25);
}

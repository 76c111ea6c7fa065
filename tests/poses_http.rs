mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::app::{spawn_test_app, spawn_test_app_for};
use common::fixtures::{closed_frame, lost_frame, open_frame, yaw_frame};
use common::http::{
    assert_frames_accepted, assert_json_error, assert_status_ok_json, post_frames, request,
    response_json,
};
use gesture_pager::gesture::types::{
    GestureEvent, InstrumentType, NavigationDirection, NavigationSource,
};

async fn next_event(
    rx: &mut tokio::sync::broadcast::Receiver<GestureEvent>,
) -> GestureEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event within timeout")
        .expect("event channel open")
}

#[tokio::test]
async fn it_head_shake_frames_emit_navigation() {
    let app = spawn_test_app().await;
    let mut events = app.state.subscribe_events();

    let frames: Vec<_> = [0.0, 0.1, 0.2, 0.3]
        .into_iter()
        .map(|t| yaw_frame(t, 34.0))
        .collect();
    let resp = post_frames(&app.app, frames).await;
    let (status, body) = response_json(resp).await;
    assert_frames_accepted(status, &body, 4);

    assert_eq!(
        next_event(&mut events).await,
        GestureEvent::Navigation {
            direction: NavigationDirection::Next,
            source: NavigationSource::HeadShake,
        }
    );
}

#[tokio::test]
async fn it_hybrid_shake_then_blink_confirms() {
    let app = spawn_test_app_for(InstrumentType::Piano).await;
    let mut events = app.state.subscribe_events();

    let mut frames: Vec<_> = [0.0, 0.1, 0.2, 0.3]
        .into_iter()
        .map(|t| yaw_frame(t, -34.0))
        .collect();
    frames.push(open_frame(0.6));
    frames.push(closed_frame(1.2));
    frames.push(open_frame(1.3));
    frames.push(closed_frame(1.5));

    let resp = post_frames(&app.app, frames).await;
    let (status, _) = response_json(resp).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    assert_eq!(
        next_event(&mut events).await,
        GestureEvent::WaitingForConfirmation {
            direction: NavigationDirection::Previous,
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        GestureEvent::Navigation {
            direction: NavigationDirection::Previous,
            source: NavigationSource::Hybrid,
        }
    );
}

#[tokio::test]
async fn it_hybrid_timeout_is_reported_on_next_frame() {
    let app = spawn_test_app_for(InstrumentType::Piano).await;
    let mut events = app.state.subscribe_events();

    let mut frames: Vec<_> = [0.0, 0.1, 0.2, 0.3]
        .into_iter()
        .map(|t| yaw_frame(t, 34.0))
        .collect();
    // 超时后才出现的帧（包括丢失人脸）
    frames.push(lost_frame(4.0));

    let resp = post_frames(&app.app, frames).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    assert!(matches!(
        next_event(&mut events).await,
        GestureEvent::WaitingForConfirmation { .. }
    ));
    assert_eq!(next_event(&mut events).await, GestureEvent::ConfirmationTimeout);

    let resp = request(&app.app, Method::GET, "/api/active-profile", None).await;
    let (_, body) = response_json(resp).await;
    assert_eq!(body["data"]["state"]["state"], "idle");
}

#[tokio::test]
async fn it_rejects_oversized_batch() {
    let app = spawn_test_app().await;

    let frames: Vec<_> = (0..513).map(|i| open_frame(i as f64 * 0.033)).collect();
    let resp = post_frames(&app.app, frames).await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn it_rejects_malformed_frames() {
    let app = spawn_test_app().await;

    let resp = post_frames(&app.app, vec![json!({ "type": "sample", "yaw": 0.1 })]).await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_REQUEST_BODY");
}

#[tokio::test]
async fn it_rejects_frames_after_shutdown() {
    let app = spawn_test_app().await;
    app.shutdown_tx.send(()).unwrap();
    for _ in 0..50 {
        if !app.state.runtime().is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let resp = post_frames(&app.app, vec![open_frame(0.0)]).await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_json_error(&body, "RUNTIME_UNAVAILABLE");
}

#[tokio::test]
async fn it_empty_batch_is_accepted() {
    let app = spawn_test_app().await;

    let resp = post_frames(&app.app, vec![]).await;
    let (status, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["accepted"], 0);
}

mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_app;
use common::fixtures::yaw_frame;
use common::http::{assert_frames_accepted, post_frames, read_sse_until, request, response_json};

#[tokio::test]
async fn it_sse_endpoint_is_reachable() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/api/realtime/events", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.contains("text/event-stream"));
}

#[tokio::test]
async fn it_sse_streams_navigation_events() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/api/realtime/events", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body().into_data_stream();

    let frames = [0.0, 0.1, 0.2, 0.3]
        .into_iter()
        .map(|t| yaw_frame(t, 34.0))
        .collect();
    let (status, body_json) = response_json(post_frames(&app.app, frames).await).await;
    assert_frames_accepted(status, &body_json, 4);

    let received = read_sse_until(&mut body, "navigation").await;
    assert!(received.contains("\"direction\":\"next\""));
    assert!(received.contains("\"source\":\"headShake\""));
}

#[tokio::test]
async fn it_sse_connection_count_is_released() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/api/realtime/events", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        app.state
            .sse_connections()
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );

    drop(response);
    assert_eq!(
        app.state
            .sse_connections()
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

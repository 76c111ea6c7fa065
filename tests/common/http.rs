use std::time::Duration;

use axum::body::{to_bytes, Body, BodyDataStream};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

pub async fn request(app: &Router, method: Method, path: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(path);
    let req = match body {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request body"),
        None => builder.body(Body::empty()).expect("empty body"),
    };

    app.clone().oneshot(req).await.expect("oneshot response")
}

/// POST /api/poses，帧按给定顺序提交
pub async fn post_frames(app: &Router, frames: Vec<Value>) -> Response {
    request(app, Method::POST, "/api/poses", Some(json!({ "frames": frames }))).await
}

pub async fn response_json(resp: Response) -> (StatusCode, Value) {
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body bytes");

    let json = if bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice::<Value>(&bytes).expect("parse json body")
    };

    (status, json)
}

pub fn assert_json_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
    assert!(body.get("message").is_some());
}

pub fn assert_status_ok_json(status: StatusCode, body: &Value) {
    assert!(status.is_success());
    assert_eq!(body["success"], true);
    assert!(body.get("data").is_some());
}

/// 帧批次的 202 回执：全部入队，没有丢帧
pub fn assert_frames_accepted(status: StatusCode, body: &Value, count: usize) {
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["accepted"], count);
    assert_eq!(body["data"]["dropped"], 0);
}

/// 读取 SSE 数据直到出现 `event: <name>`，返回目前收到的全部文本
pub async fn read_sse_until(body: &mut BodyDataStream, event_name: &str) -> String {
    let marker = format!("event: {event_name}");
    let mut received = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !received.contains(&marker) {
        let chunk = tokio::time::timeout_at(deadline, body.next())
            .await
            .expect("sse chunk within timeout")
            .expect("stream open")
            .expect("chunk bytes");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    received
}

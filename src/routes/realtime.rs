use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{extract::State, Router};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::constants::MAX_SSE_CONNECTIONS;
use crate::response::AppError;
use crate::state::AppState;

/// 连接结束时释放计数
struct SseGuard(AppState);

impl Drop for SseGuard {
    fn drop(&mut self) {
        self.0.sse_connections().fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(sse_handler))
}

/// 把手势事件（翻页、等待确认、超时、校准完成）推给前端
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let current = state.sse_connections().fetch_add(1, Ordering::SeqCst);
    if current >= MAX_SSE_CONNECTIONS {
        state.sse_connections().fetch_sub(1, Ordering::SeqCst);
        return Err(AppError::service_unavailable(
            "TOO_MANY_CONNECTIONS",
            "Too many SSE connections",
        ));
    }
    let guard = SseGuard(state.clone());

    let mut events = state.subscribe_events();
    let mut shutdown_rx = state.shutdown_rx();

    let stream = async_stream::stream! {
        let _guard = guard;
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            yield Ok(Event::default().event(event.kind()).data(json));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "SSE consumer lagging, events skipped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}

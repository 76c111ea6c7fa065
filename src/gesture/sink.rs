use tokio::sync::{broadcast, mpsc};

use crate::gesture::types::GestureEvent;

/// 事件出口。没有注册出口或出口没有接收方时事件被丢弃，不视为错误。
pub trait EventSink: Send + Sync {
    /// 返回 false 表示事件未被任何接收方收到
    fn emit(&self, event: &GestureEvent) -> bool;
}

impl EventSink for broadcast::Sender<GestureEvent> {
    fn emit(&self, event: &GestureEvent) -> bool {
        self.send(event.clone()).is_ok()
    }
}

impl EventSink for mpsc::UnboundedSender<GestureEvent> {
    fn emit(&self, event: &GestureEvent) -> bool {
        self.send(event.clone()).is_ok()
    }
}

pub(crate) fn dispatch(sink: Option<&dyn EventSink>, event: &GestureEvent) {
    let delivered = sink.map(|s| s.emit(event)).unwrap_or(false);
    if !delivered {
        tracing::debug!(event = event.kind(), "No event consumer, dropping gesture event");
    }
}

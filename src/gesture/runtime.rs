//! 协调器的单线程所有者
//!
//! 一个 tokio 任务独占 `GestureCoordinator`，所有输入通过有界队列串行处理。
//! 帧入口使用 `try_send`，不会阻塞采集线程；队列满时丢弃该帧。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::gesture::coordinator::{CoordinatorStatus, GestureCoordinator};
use crate::gesture::profile::GestureProfile;
use crate::gesture::types::{CalibrationContext, PoseFrame};
use crate::gesture::GestureError;

pub enum RuntimeCommand {
    Frame(PoseFrame),
    SetProfile {
        profile: GestureProfile,
        reply: oneshot::Sender<Result<(), GestureError>>,
    },
    SetContext(CalibrationContext),
    Reset,
    Status(oneshot::Sender<CoordinatorStatus>),
}

#[derive(Clone)]
pub struct GestureRuntime {
    tx: mpsc::Sender<RuntimeCommand>,
    dropped_frames: Arc<AtomicU64>,
}

impl GestureRuntime {
    pub fn spawn(
        coordinator: GestureCoordinator,
        capacity: usize,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run(coordinator, rx, shutdown_rx));
        (
            Self {
                tx,
                dropped_frames: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }

    /// 非阻塞投递一帧；返回 false 表示帧被丢弃
    pub fn feed_pose(&self, frame: PoseFrame) -> bool {
        match self.tx.try_send(RuntimeCommand::Frame(frame)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped, "Gesture frame queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Gesture runtime stopped, dropping frame");
                false
            }
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    pub async fn set_profile(&self, profile: GestureProfile) -> Result<(), GestureError> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeCommand::SetProfile { profile, reply }).await?;
        rx.await.map_err(|_| GestureError::RuntimeClosed)?
    }

    pub async fn set_context(&self, context: CalibrationContext) -> Result<(), GestureError> {
        self.send(RuntimeCommand::SetContext(context)).await
    }

    pub async fn reset(&self) -> Result<(), GestureError> {
        self.send(RuntimeCommand::Reset).await
    }

    pub async fn status(&self) -> Result<CoordinatorStatus, GestureError> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeCommand::Status(reply)).await?;
        rx.await.map_err(|_| GestureError::RuntimeClosed)
    }

    async fn send(&self, command: RuntimeCommand) -> Result<(), GestureError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| GestureError::RuntimeClosed)
    }
}

async fn run(
    mut coordinator: GestureCoordinator,
    mut rx: mpsc::Receiver<RuntimeCommand>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tracing::info!(
        instrument = coordinator.profile().instrument.as_str(),
        "Gesture runtime started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Gesture runtime shutting down");
                break;
            }
            command = rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                handle(&mut coordinator, command);
            }
        }
    }
}

fn handle(coordinator: &mut GestureCoordinator, command: RuntimeCommand) {
    match command {
        RuntimeCommand::Frame(frame) => {
            coordinator.feed(&frame);
        }
        RuntimeCommand::SetProfile { profile, reply } => {
            let _ = reply.send(coordinator.set_profile(profile));
        }
        RuntimeCommand::SetContext(context) => coordinator.set_context(context),
        RuntimeCommand::Reset => coordinator.reset(),
        RuntimeCommand::Status(reply) => {
            coordinator.sync_thresholds();
            let _ = reply.send(coordinator.status());
        }
    }
}

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::calibration::{CalibrationConfig, CalibrationEngine};
use crate::config::Config;
use crate::gesture::profile::GestureProfile;
use crate::gesture::types::GestureEvent;
use crate::gesture::{GestureCoordinator, GestureRuntime};
use crate::store::operations::settings::RuntimeSettings;
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    engine: Arc<CalibrationEngine>,
    runtime: GestureRuntime,
    events_tx: broadcast::Sender<GestureEvent>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
    sse_connections: Arc<AtomicUsize>,
}

impl AppState {
    /// 载入保存的设置与阈值，启动手势运行时
    pub async fn new(
        store: Arc<Store>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Result<Self, StoreError> {
        let (events_tx, _) = broadcast::channel(config.gesture.event_channel_capacity.max(1));

        let settings = store
            .get_runtime_settings()?
            .unwrap_or_else(|| RuntimeSettings::for_instrument(config.gesture.default_instrument));

        let engine = CalibrationEngine::new(
            CalibrationConfig::from_env(&config.calibration),
            store.clone(),
            GestureProfile::default_for(config.gesture.default_instrument),
        )
        .with_sink(events_tx.clone());
        engine.load_from_store().await?;
        let engine = Arc::new(engine);

        let coordinator = build_coordinator(&store, &settings)?
            .with_min_pose_confidence(config.gesture.min_pose_confidence)
            .with_context(settings.context)
            .with_thresholds(engine.subscribe())
            .with_sink(events_tx.clone());

        let (runtime, _) = GestureRuntime::spawn(
            coordinator,
            config.gesture.frame_queue_capacity,
            shutdown_tx.subscribe(),
        );

        Ok(Self {
            store,
            engine,
            runtime,
            events_tx,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
            sse_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn engine(&self) -> &Arc<CalibrationEngine> {
        &self.engine
    }

    pub fn runtime(&self) -> &GestureRuntime {
        &self.runtime
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GestureEvent> {
        self.events_tx.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn sse_connections(&self) -> &AtomicUsize {
        &self.sse_connections
    }
}

/// 保存的 profile 不合法时退回内置默认值，不阻止启动
fn build_coordinator(
    store: &Store,
    settings: &RuntimeSettings,
) -> Result<GestureCoordinator, StoreError> {
    let profile = store.get_profile_or_default(settings.active_instrument)?;
    match GestureCoordinator::new(profile) {
        Ok(coordinator) => Ok(coordinator),
        Err(e) => {
            tracing::warn!(
                error = %e,
                instrument = settings.active_instrument.as_str(),
                "Stored profile rejected, using built-in default"
            );
            GestureCoordinator::new(GestureProfile::default_for(settings.active_instrument))
                .map_err(|e| StoreError::Validation(e.to_string()))
        }
    }
}

use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use gesture_pager::config::{CalibrationEnvConfig, Config, GestureEnvConfig, WorkerConfig};
use gesture_pager::gesture::types::InstrumentType;
use gesture_pager::routes::build_router;
use gesture_pager::state::AppState;
use gesture_pager::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
    _temp_dir: TempDir,
}

fn test_config(sled_path: String, default_instrument: InstrumentType) -> Config {
    // 直接构造 Config，避免 set_var 在并行测试间互相干扰
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        cors_origin: "http://localhost:5173".to_string(),
        worker: WorkerConfig {
            is_leader: false,
            optimization_cron: "0 */5 * * * *".to_string(),
            threshold_flush_cron: "*/10 * * * * *".to_string(),
        },
        gesture: GestureEnvConfig {
            default_instrument,
            frame_queue_capacity: 64,
            event_channel_capacity: 256,
            min_pose_confidence: 0.5,
        },
        calibration: CalibrationEnvConfig {
            learning_rate: 0.1,
            similarity_threshold: 0.8,
            history_limit: 100,
        },
    }
}

pub async fn spawn_test_app_for(instrument: InstrumentType) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("gesture-test.sled");
    let config = test_config(sled_path.to_string_lossy().to_string(), instrument);

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, shutdown_tx.clone())
        .await
        .expect("app state");

    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_test_app_for(InstrumentType::Guitar).await
}

pub mod threshold_flush;
pub mod threshold_optimization;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::calibration::CalibrationEngine;
use crate::config::WorkerConfig;

/// 单次 worker 调用的超时
const WORKER_TIMEOUT: Duration = Duration::from_secs(60);

/// Drain period before scheduler shutdown to let in-flight tasks complete.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    ThresholdOptimization,
    ThresholdFlush,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThresholdOptimization => "threshold_optimization",
            Self::ThresholdFlush => "threshold_flush",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: String,
}

pub struct WorkerManager {
    engine: Arc<CalibrationEngine>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
}

impl WorkerManager {
    pub fn new(
        engine: Arc<CalibrationEngine>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            engine,
            shutdown_rx,
            config: config.clone(),
        }
    }

    /// Single source of truth for all planned jobs and their cron schedules.
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::ThresholdOptimization,
                cron: self.config.optimization_cron.clone(),
            },
            JobSpec {
                name: WorkerName::ThresholdFlush,
                cron: self.config.threshold_flush_cron.clone(),
            },
        ]
    }

    /// Start the worker scheduler. Returns an error if the scheduler cannot be created or started.
    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;

        self.register_jobs(&scheduler).await;

        scheduler.start().await?;

        tracing::info!("Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            "Worker manager shutting down, draining for {}s",
            DRAIN_TIMEOUT.as_secs()
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in self.planned_jobs() {
            let engine = self.engine.clone();
            let name_str = spec.name.as_str();

            match spec.name {
                WorkerName::ThresholdOptimization => {
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let engine = engine.clone();
                        async move {
                            threshold_optimization::run(&engine).await;
                        }
                    })
                    .await;
                }
                WorkerName::ThresholdFlush => {
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let engine = engine.clone();
                        async move {
                            threshold_flush::run(&engine).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name = name_str, cron = %spec.cron, "Registered worker");
        }
    }
}

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                worker = name,
                "Skipping worker invocation: previous run still in progress"
            );
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error = %err, cron, worker = name, "Failed to create worker job"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use crate::calibration::CalibrationConfig;
    use crate::config::Config;
    use crate::gesture::profile::GestureProfile;
    use crate::gesture::types::{CalibrationContext, FeedbackKind, GestureType, InstrumentType};
    use crate::store::Store;

    use super::*;

    fn engine(tmp: &tempfile::TempDir, name: &str) -> (Arc<Store>, Arc<CalibrationEngine>) {
        let store = Arc::new(Store::open(tmp.path().join(name).to_str().unwrap()).unwrap());
        let engine = Arc::new(CalibrationEngine::new(
            CalibrationConfig::default(),
            store.clone(),
            GestureProfile::default_for(InstrumentType::Piano),
        ));
        (store, engine)
    }

    #[tokio::test]
    async fn leader_switch_controls_job_registration() {
        let cfg = Config::from_env();
        let tmp = tempfile::tempdir().expect("tempdir");
        let (_, engine) = engine(&tmp, "worker_test.sled");
        let (tx, _) = broadcast::channel(2);

        let mut worker_cfg = cfg.worker.clone();
        worker_cfg.is_leader = false;

        let manager = WorkerManager::new(engine, tx.subscribe(), &worker_cfg);
        assert!(manager.planned_jobs().is_empty());
        manager
            .start()
            .await
            .expect("non-leader start should succeed");
    }

    #[tokio::test]
    async fn leader_plans_jobs_with_configured_crons() {
        let cfg = Config::from_env();
        let tmp = tempfile::tempdir().expect("tempdir");
        let (_, engine) = engine(&tmp, "worker_test_2.sled");
        let (tx, _) = broadcast::channel(2);

        let mut worker_cfg = cfg.worker.clone();
        worker_cfg.is_leader = true;
        worker_cfg.threshold_flush_cron = "*/30 * * * * *".to_string();

        let manager = WorkerManager::new(engine, tx.subscribe(), &worker_cfg);
        let jobs = manager.planned_jobs();
        assert_eq!(jobs.len(), 2);
        let flush = jobs
            .iter()
            .find(|j| j.name == WorkerName::ThresholdFlush)
            .expect("flush job");
        assert_eq!(flush.cron, "*/30 * * * * *");
    }

    #[tokio::test]
    async fn leader_start_stops_on_shutdown() {
        let cfg = Config::from_env();
        let tmp = tempfile::tempdir().expect("tempdir");
        let (_, engine) = engine(&tmp, "worker_test_3.sled");
        let (tx, _) = broadcast::channel(2);

        let mut worker_cfg = cfg.worker.clone();
        worker_cfg.is_leader = true;

        let manager = WorkerManager::new(engine, tx.subscribe(), &worker_cfg);
        let handle = tokio::spawn(manager.start());
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("manager should stop")
            .expect("join");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn flush_worker_persists_feedback_adjustments() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let (store, engine) = engine(&tmp, "worker_test_4.sled");

        engine
            .record_feedback(
                GestureType::Blink,
                FeedbackKind::TooSensitive,
                CalibrationContext::default(),
            )
            .await;
        assert!(store.get_threshold(GestureType::Blink).unwrap().is_none());

        threshold_flush::run(&engine).await;

        let stored = store
            .get_threshold(GestureType::Blink)
            .unwrap()
            .expect("persisted threshold");
        assert_eq!(stored.per_context.len(), 1);
    }

    #[test]
    fn all_worker_names_have_str() {
        for name in [WorkerName::ThresholdOptimization, WorkerName::ThresholdFlush] {
            assert!(!name.as_str().is_empty(), "{:?} has empty str", name);
        }
    }
}

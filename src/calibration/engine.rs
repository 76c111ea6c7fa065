use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Mutex, RwLock};

use crate::calibration::config::CalibrationConfig;
use crate::calibration::stats;
use crate::calibration::table::{AdaptiveThreshold, LookupSource, ThresholdLookup, ThresholdTable};
use crate::calibration::types::{
    CalibrationRecord, CalibrationReport, CalibrationResult, CalibrationSample, CalibrationStatus,
    OptimizationSummary, OptimizationTask,
};
use crate::constants::{HEAD_NOD_BASE_DEG, MOUTH_OPEN_BASE};
use crate::gesture::profile::GestureProfile;
use crate::gesture::sink::{self, EventSink};
use crate::gesture::types::{CalibrationContext, FeedbackKind, GestureEvent, GestureType};
use crate::store::{Store, StoreError};

/// 报告中展示的最近推荐值个数
const REPORT_TREND_LEN: usize = 10;

/// 内存中的学习数据：校准历史、反馈因子、识别结果、优化任务
#[derive(Debug, Default)]
struct LearningState {
    history: VecDeque<CalibrationRecord>,
    feedback: HashMap<GestureType, VecDeque<f64>>,
    outcomes: HashMap<GestureType, VecDeque<bool>>,
    tasks: Vec<OptimizationTask>,
}

impl LearningState {
    fn accuracy(&self, gesture_type: GestureType) -> Option<f64> {
        let outcomes = self.outcomes.get(&gesture_type)?;
        if outcomes.is_empty() {
            return None;
        }
        let hits = outcomes.iter().filter(|ok| **ok).count();
        Some(hits as f64 / outcomes.len() as f64)
    }

    fn mean_feedback_factor(&self, gesture_type: GestureType) -> Option<f64> {
        let factors: Vec<f64> = self.feedback.get(&gesture_type)?.iter().copied().collect();
        stats::mean(&factors)
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, limit: usize) {
    queue.push_back(value);
    while queue.len() > limit {
        queue.pop_front();
    }
}

/// 各手势参数的基础值。摇头/点头为弧度
pub fn base_value(gesture_type: GestureType, profile: &GestureProfile) -> f64 {
    match gesture_type {
        GestureType::Blink => profile.blink_threshold,
        GestureType::HeadShake => profile.shake_angle_radians(),
        GestureType::HeadNod => HEAD_NOD_BASE_DEG.to_radians(),
        GestureType::MouthOpen => MOUTH_OPEN_BASE,
    }
}

pub struct CalibrationEngine {
    config: Arc<RwLock<CalibrationConfig>>,
    store: Arc<Store>,
    base_profile: GestureProfile,
    table: RwLock<ThresholdTable>,
    snapshot_tx: watch::Sender<Arc<ThresholdTable>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    learning: Mutex<LearningState>,
    dirty: Mutex<HashSet<GestureType>>,
    sink: Option<Box<dyn EventSink>>,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig, store: Arc<Store>, base_profile: GestureProfile) -> Self {
        let mut table = ThresholdTable::new(config.lookup_params());
        for gesture_type in GestureType::ALL {
            table.insert(AdaptiveThreshold::new(
                gesture_type,
                base_value(gesture_type, &base_profile),
                config.learning_rate,
            ));
        }
        let (snapshot_tx, _) = watch::channel(Arc::new(table.clone()));

        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            base_profile,
            table: RwLock::new(table),
            snapshot_tx,
            key_locks: Mutex::new(HashMap::new()),
            learning: Mutex::new(LearningState::default()),
            dirty: Mutex::new(HashSet::new()),
            sink: None,
        }
    }

    /// 校准完成事件的出口
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub async fn reload_config(&self, new_config: CalibrationConfig) -> Result<(), String> {
        new_config.validate()?;
        let params = new_config.lookup_params();
        *self.config.write().await = new_config;

        let mut table = self.table.write().await;
        table.set_params(params);
        self.snapshot_tx.send_replace(Arc::new(table.clone()));
        tracing::info!("Calibration config reloaded");
        Ok(())
    }

    pub async fn get_config(&self) -> CalibrationConfig {
        self.config.read().await.clone()
    }

    /// 检测路径订阅阈值快照
    pub fn subscribe(&self) -> watch::Receiver<Arc<ThresholdTable>> {
        self.snapshot_tx.subscribe()
    }

    /// 用持久化的阈值覆盖内存中的默认值，返回载入条数
    pub async fn load_from_store(&self) -> Result<usize, StoreError> {
        let persisted = self.store.list_thresholds()?;
        let count = persisted.len();

        let mut table = self.table.write().await;
        for threshold in persisted {
            table.insert(threshold);
        }
        self.snapshot_tx.send_replace(Arc::new(table.clone()));
        tracing::info!(count, "Adaptive thresholds loaded");
        Ok(count)
    }

    async fn acquire_key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;

        // 只有 map 自己持有引用的锁处于空闲状态
        if locks.len() > 256 {
            locks.retain(|_, v| Arc::strong_count(v) > 1);
        }

        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 修改某个手势的阈值，发布新快照并标记待持久化
    async fn update_threshold<F>(&self, gesture_type: GestureType, update: F) -> f64
    where
        F: FnOnce(&mut AdaptiveThreshold) -> f64,
    {
        let learning_rate = self.config.read().await.learning_rate;
        let mut table = self.table.write().await;
        let entry = table.get_or_insert_with(gesture_type, || {
            AdaptiveThreshold::new(
                gesture_type,
                base_value(gesture_type, &self.base_profile),
                learning_rate,
            )
        });
        entry.learning_rate = learning_rate;
        let value = update(entry);

        self.snapshot_tx.send_replace(Arc::new(table.clone()));
        drop(table);

        self.dirty.lock().await.insert(gesture_type);
        value
    }

    pub async fn lookup(&self, gesture_type: GestureType, context: &CalibrationContext) -> ThresholdLookup {
        let context = context.normalized();
        let table = self.table.read().await;
        table
            .resolve(gesture_type, &context)
            .unwrap_or_else(|| ThresholdLookup {
                value: base_value(gesture_type, &self.base_profile),
                source: LookupSource::Base,
            })
    }

    /// 精确上下文 → 相似上下文 → 基础值
    pub async fn adaptive_threshold(&self, gesture_type: GestureType, context: &CalibrationContext) -> f64 {
        self.lookup(gesture_type, context).await.value
    }

    pub async fn calibrate(
        &self,
        gesture_type: GestureType,
        context: CalibrationContext,
        samples: &[CalibrationSample],
    ) -> CalibrationResult {
        let config = self.config.read().await.clone();
        let context = context.normalized();

        let values: Vec<f64> = samples
            .iter()
            .filter(|s| s.gesture_type == gesture_type)
            .map(|s| s.measured_value)
            .filter(|v| v.is_finite())
            .collect();
        if values.len() < samples.len() {
            tracing::debug!(
                discarded = samples.len() - values.len(),
                "Discarded calibration samples"
            );
        }

        let Some(mean) = stats::mean(&values) else {
            let current = self.adaptive_threshold(gesture_type, &context).await;
            tracing::warn!(
                gesture = gesture_type.as_str(),
                context = %context.key(),
                "Calibration batch has no usable samples"
            );
            let result = CalibrationResult {
                gesture_type,
                context,
                recommended_threshold: current,
                confidence: 0.0,
                sample_size: 0,
                variance: 0.0,
                is_reliable: false,
                status: CalibrationStatus::Unreliable,
            };
            self.record_history(&result, config.history_limit).await;
            return result;
        };

        let variance = stats::variance(&values, mean);
        let confidence = stats::confidence(values.len(), variance, config.max_sample_size);
        let recommended = stats::recommend(
            mean,
            &context,
            gesture_type,
            config.min_threshold,
            config.max_threshold,
        );
        let is_reliable =
            confidence > config.reliability_threshold && values.len() >= config.min_reliable_samples;

        let result = CalibrationResult {
            gesture_type,
            context,
            recommended_threshold: recommended,
            confidence,
            sample_size: values.len(),
            variance,
            is_reliable,
            status: if is_reliable {
                CalibrationStatus::Completed
            } else {
                CalibrationStatus::Unreliable
            },
        };

        if is_reliable {
            let lock = self.acquire_key_lock(&threshold_key(gesture_type, &context)).await;
            let _guard = lock.lock().await;
            self.update_threshold(gesture_type, |t| {
                t.set(context, recommended);
                recommended
            })
            .await;

            sink::dispatch(
                self.sink.as_deref(),
                &GestureEvent::CalibrationCompleted {
                    gesture_type,
                    recommended_threshold: recommended,
                    confidence,
                },
            );
            tracing::info!(
                gesture = gesture_type.as_str(),
                context = %context.key(),
                recommended,
                confidence,
                samples = values.len(),
                "Calibration completed"
            );
        } else {
            tracing::info!(
                gesture = gesture_type.as_str(),
                context = %context.key(),
                confidence,
                samples = values.len(),
                "Calibration unreliable, threshold unchanged"
            );
        }

        self.record_history(&result, config.history_limit).await;
        result
    }

    async fn record_history(&self, result: &CalibrationResult, limit: usize) {
        let record = CalibrationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            result: result.clone(),
            created_at: Utc::now(),
        };
        let mut learning = self.learning.lock().await;
        push_bounded(&mut learning.history, record, limit);
    }

    /// 按用户反馈在线调整，返回调整后该上下文的阈值
    pub async fn record_feedback(
        &self,
        gesture_type: GestureType,
        feedback: FeedbackKind,
        context: CalibrationContext,
    ) -> f64 {
        let context = context.normalized();
        let config = self.config.read().await.clone();

        let lock = self.acquire_key_lock(&threshold_key(gesture_type, &context)).await;
        let _guard = lock.lock().await;

        let current = self.adaptive_threshold(gesture_type, &context).await;
        let target = current * feedback.factor();
        let updated = self
            .update_threshold(gesture_type, |t| t.blend(context, target))
            .await;

        {
            let mut learning = self.learning.lock().await;
            push_bounded(
                learning.feedback.entry(gesture_type).or_default(),
                feedback.factor(),
                config.feedback_window,
            );
            push_bounded(
                learning.outcomes.entry(gesture_type).or_default(),
                feedback == FeedbackKind::Perfect,
                config.outcome_window,
            );
        }

        tracing::debug!(
            gesture = gesture_type.as_str(),
            feedback = ?feedback,
            previous = current,
            updated,
            "Feedback applied"
        );
        updated
    }

    /// 上报一次识别是否符合用户意图
    pub async fn record_outcome(&self, gesture_type: GestureType, success: bool) {
        let window = self.config.read().await.outcome_window;
        let mut learning = self.learning.lock().await;
        push_bounded(learning.outcomes.entry(gesture_type).or_default(), success, window);
    }

    pub async fn accuracy(&self, gesture_type: GestureType) -> Option<f64> {
        self.learning.lock().await.accuracy(gesture_type)
    }

    pub async fn schedule_optimization(
        &self,
        gesture_type: GestureType,
        context: CalibrationContext,
        target_accuracy: f64,
        deadline: Option<DateTime<Utc>>,
    ) -> OptimizationTask {
        let ttl = self.config.read().await.task_ttl_secs;
        let now = Utc::now();
        let task = OptimizationTask {
            id: uuid::Uuid::new_v4().to_string(),
            gesture_type,
            context: context.normalized(),
            target_accuracy: target_accuracy.clamp(0.0, 1.0),
            deadline: deadline.unwrap_or(now + Duration::seconds(ttl)),
            created_at: now,
        };
        self.learning.lock().await.tasks.push(task.clone());
        tracing::info!(
            task_id = %task.id,
            gesture = gesture_type.as_str(),
            target = task.target_accuracy,
            "Optimization task scheduled"
        );
        task
    }

    pub async fn pending_tasks(&self) -> Vec<OptimizationTask> {
        self.learning.lock().await.tasks.clone()
    }

    /// 一次后台优化：清理过期任务，对准确率不达标的手势按平均反馈因子微调
    pub async fn run_optimization_tick(&self, now: DateTime<Utc>) -> OptimizationSummary {
        let mut summary = OptimizationSummary::default();

        let plan: Vec<(OptimizationTask, Option<f64>, Option<f64>)> = {
            let mut learning = self.learning.lock().await;
            let before = learning.tasks.len();
            learning.tasks.retain(|task| task.deadline > now);
            summary.expired = before - learning.tasks.len();

            learning
                .tasks
                .iter()
                .map(|task| {
                    (
                        task.clone(),
                        learning.accuracy(task.gesture_type),
                        learning.mean_feedback_factor(task.gesture_type),
                    )
                })
                .collect()
        };

        for (task, accuracy, factor) in plan {
            let (Some(accuracy), Some(factor)) = (accuracy, factor) else {
                summary.waiting += 1;
                continue;
            };
            if accuracy >= task.target_accuracy {
                summary.satisfied += 1;
                continue;
            }

            let lock = self
                .acquire_key_lock(&threshold_key(task.gesture_type, &task.context))
                .await;
            let _guard = lock.lock().await;
            let current = self.adaptive_threshold(task.gesture_type, &task.context).await;
            let updated = self
                .update_threshold(task.gesture_type, |t| t.blend(task.context, current * factor))
                .await;
            summary.adjusted += 1;

            tracing::debug!(
                task_id = %task.id,
                gesture = task.gesture_type.as_str(),
                accuracy,
                factor,
                previous = current,
                updated,
                "Optimization step applied"
            );
        }

        summary
    }

    /// 已写入的阈值优先：之后不可靠的批次不会改动既有状态
    pub async fn status(&self, gesture_type: GestureType, context: &CalibrationContext) -> CalibrationStatus {
        let context = context.normalized();
        let stored = self
            .table
            .read()
            .await
            .get(gesture_type)
            .and_then(|t| t.stored(&context))
            .is_some();
        if stored {
            return CalibrationStatus::Completed;
        }

        self.learning
            .lock()
            .await
            .history
            .iter()
            .rev()
            .find(|r| r.result.gesture_type == gesture_type && r.result.context == context)
            .map_or(CalibrationStatus::NotCalibrated, |r| r.result.status)
    }

    pub async fn history(&self, gesture_type: Option<GestureType>) -> Vec<CalibrationRecord> {
        self.learning
            .lock()
            .await
            .history
            .iter()
            .filter(|r| gesture_type.map_or(true, |g| r.result.gesture_type == g))
            .cloned()
            .collect()
    }

    pub async fn report(&self, gesture_type: GestureType) -> CalibrationReport {
        let learning = self.learning.lock().await;
        let records: Vec<&CalibrationRecord> = learning
            .history
            .iter()
            .filter(|r| r.result.gesture_type == gesture_type)
            .collect();

        let confidences: Vec<f64> = records.iter().map(|r| r.result.confidence).collect();
        let reliable: Vec<f64> = records
            .iter()
            .filter(|r| r.result.is_reliable)
            .map(|r| r.result.recommended_threshold)
            .collect();
        let recent_thresholds: Vec<f64> = reliable
            .iter()
            .skip(reliable.len().saturating_sub(REPORT_TREND_LEN))
            .copied()
            .collect();
        let threshold_trend = match (recent_thresholds.first(), recent_thresholds.last()) {
            (Some(first), Some(last)) if recent_thresholds.len() > 1 => Some(last - first),
            _ => None,
        };

        CalibrationReport {
            gesture_type,
            history_size: records.len(),
            reliable_count: reliable.len(),
            mean_confidence: stats::mean(&confidences),
            recent_thresholds,
            threshold_trend,
            accuracy: learning.accuracy(gesture_type),
            pending_tasks: learning
                .tasks
                .iter()
                .filter(|t| t.gesture_type == gesture_type)
                .count(),
        }
    }

    /// 把有改动的手势阈值批量写入 sled；失败时保留脏标记
    pub async fn flush_dirty(&self) -> Result<usize, StoreError> {
        let dirty: Vec<GestureType> = self.dirty.lock().await.drain().collect();
        if dirty.is_empty() {
            return Ok(0);
        }

        let thresholds: Vec<AdaptiveThreshold> = {
            let table = self.table.read().await;
            dirty
                .iter()
                .filter_map(|g| table.get(*g).cloned())
                .collect()
        };

        if let Err(e) = self.store.upsert_thresholds(&thresholds) {
            self.dirty.lock().await.extend(dirty);
            return Err(e);
        }
        Ok(thresholds.len())
    }
}

fn threshold_key(gesture_type: GestureType, context: &CalibrationContext) -> String {
    format!("{}:{}", gesture_type.param_name(), context.key())
}

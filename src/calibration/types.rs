use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gesture::types::{CalibrationContext, GestureType};

/// 一次测量。同一批次内 gesture_type 与目标不一致的样本会被丢弃
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationSample {
    pub gesture_type: GestureType,
    pub measured_value: f64,
    pub context: CalibrationContext,
    pub timestamp: DateTime<Utc>,
}

impl CalibrationSample {
    pub fn new(gesture_type: GestureType, measured_value: f64, context: CalibrationContext) -> Self {
        Self {
            gesture_type,
            measured_value,
            context,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationStatus {
    NotCalibrated,
    Completed,
    /// 批次置信度不足，阈值未写入
    Unreliable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationResult {
    pub gesture_type: GestureType,
    pub context: CalibrationContext,
    pub recommended_threshold: f64,
    pub confidence: f64,
    pub sample_size: usize,
    pub variance: f64,
    pub is_reliable: bool,
    pub status: CalibrationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    pub id: String,
    pub result: CalibrationResult,
    pub created_at: DateTime<Utc>,
}

/// 后台优化任务：在截止时间前把该手势的识别准确率推向目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationTask {
    pub id: String,
    pub gesture_type: GestureType,
    pub context: CalibrationContext,
    pub target_accuracy: f64,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationSummary {
    pub expired: usize,
    pub adjusted: usize,
    /// 准确率已达标
    pub satisfied: usize,
    /// 缺少反馈或识别结果，留待下次
    pub waiting: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    pub gesture_type: GestureType,
    pub history_size: usize,
    pub reliable_count: usize,
    pub mean_confidence: Option<f64>,
    /// 最近几次可靠校准的推荐值（旧 → 新）
    pub recent_thresholds: Vec<f64>,
    /// 最新推荐值减去最早推荐值
    pub threshold_trend: Option<f64>,
    pub accuracy: Option<f64>,
    pub pending_tasks: usize,
}

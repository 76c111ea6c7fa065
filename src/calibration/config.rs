use serde::{Deserialize, Serialize};

use crate::calibration::table::LookupParams;

/// 校准引擎参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    /// 样本数达到该值时样本量因子为 1
    pub max_sample_size: usize,
    pub min_reliable_samples: usize,
    /// 置信度必须严格大于该值才算可靠
    pub reliability_threshold: f64,
    pub learning_rate: f64,
    pub similarity_threshold: f64,
    pub distance_scale_cm: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    /// 校准历史保留条数
    pub history_limit: usize,
    /// 每种手势保留的最近反馈因子数
    pub feedback_window: usize,
    /// 每种手势保留的最近识别结果数
    pub outcome_window: usize,
    /// 后台优化任务的默认有效期（秒）
    #[serde(default = "default_task_ttl_secs")]
    pub task_ttl_secs: i64,
}

fn default_task_ttl_secs() -> i64 {
    3_600
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_sample_size: 10,
            min_reliable_samples: 3,
            reliability_threshold: 0.7,
            learning_rate: 0.1,
            similarity_threshold: 0.8,
            distance_scale_cm: 50.0,
            min_threshold: 0.1,
            max_threshold: 1.0,
            history_limit: 100,
            feedback_window: 20,
            outcome_window: 50,
            task_ttl_secs: default_task_ttl_secs(),
        }
    }
}

impl CalibrationConfig {
    /// 环境变量覆盖默认值；组合非法时退回默认配置
    pub fn from_env(env_config: &crate::config::CalibrationEnvConfig) -> Self {
        let config = Self {
            learning_rate: env_config.learning_rate,
            similarity_threshold: env_config.similarity_threshold,
            history_limit: env_config.history_limit,
            ..Self::default()
        };
        match config.validate() {
            Ok(()) => config,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Invalid calibration env config, using defaults");
                Self::default()
            }
        }
    }

    pub fn lookup_params(&self) -> LookupParams {
        LookupParams {
            similarity_threshold: self.similarity_threshold,
            distance_scale_cm: self.distance_scale_cm,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_sample_size == 0 {
            return Err("max_sample_size must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.reliability_threshold) {
            return Err("reliability_threshold must be in [0,1]".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err("learning_rate must be in (0,1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err("similarity_threshold must be in [0,1]".to_string());
        }
        if !(self.distance_scale_cm.is_finite() && self.distance_scale_cm > 0.0) {
            return Err("distance_scale_cm must be > 0".to_string());
        }
        if !(self.min_threshold > 0.0 && self.min_threshold < self.max_threshold) {
            return Err("min_threshold must be > 0 and < max_threshold".to_string());
        }
        if self.history_limit == 0 || self.feedback_window == 0 || self.outcome_window == 0 {
            return Err("history_limit / feedback_window / outcome_window must be >= 1".to_string());
        }
        if self.task_ttl_secs <= 0 {
            return Err("task_ttl_secs must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(CalibrationConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_clamp_range_is_rejected() {
        let config = CalibrationConfig {
            min_threshold: 0.9,
            max_threshold: 0.5,
            ..CalibrationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_learning_rate_is_rejected() {
        let config = CalibrationConfig {
            learning_rate: 0.0,
            ..CalibrationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

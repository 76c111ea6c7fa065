//! 后台阈值优化：清理过期任务，对准确率未达标的手势按近期反馈微调

use std::sync::Arc;

use crate::calibration::CalibrationEngine;

pub async fn run(engine: &Arc<CalibrationEngine>) {
    let summary = engine.run_optimization_tick(chrono::Utc::now()).await;

    if summary.adjusted > 0 || summary.expired > 0 {
        tracing::info!(
            adjusted = summary.adjusted,
            expired = summary.expired,
            satisfied = summary.satisfied,
            waiting = summary.waiting,
            "Threshold optimization tick"
        );
    } else {
        tracing::debug!(
            satisfied = summary.satisfied,
            waiting = summary.waiting,
            "Threshold optimization tick: nothing to adjust"
        );
    }
}

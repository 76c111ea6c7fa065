use std::sync::Arc;

use crate::calibration::CalibrationEngine;

pub async fn run(engine: &Arc<CalibrationEngine>) {
    tracing::debug!("threshold_flush: start");
    match engine.flush_dirty().await {
        Ok(0) => {}
        Ok(count) => tracing::debug!(count, "threshold_flush: done"),
        Err(e) => tracing::error!(error = %e, "threshold_flush failed"),
    }
}

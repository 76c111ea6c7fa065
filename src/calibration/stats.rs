//! 校准统计：均值、总体方差、置信度与环境修正系数

use crate::gesture::types::{CalibrationContext, GestureType, InstrumentType, LightingQuality};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 总体方差（除以 n）
pub fn variance(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// `(min(n/max, 1) + max(0, 1 - variance)) / 2`
pub fn confidence(sample_size: usize, variance: f64, max_sample_size: usize) -> f64 {
    let size_factor = (sample_size as f64 / max_sample_size.max(1) as f64).min(1.0);
    let consistency = (1.0 - variance).max(0.0);
    (size_factor + consistency) / 2.0
}

pub fn lighting_multiplier(lighting: LightingQuality) -> f64 {
    match lighting {
        LightingQuality::Poor => 1.2,
        LightingQuality::Excellent => 0.9,
        LightingQuality::Fair | LightingQuality::Good => 1.0,
    }
}

pub fn distance_multiplier(distance_cm: u32) -> f64 {
    if distance_cm > 60 {
        1.1
    } else if distance_cm < 40 {
        0.95
    } else {
        1.0
    }
}

/// 特定乐器与手势组合的修正
pub fn pair_multiplier(instrument: InstrumentType, gesture_type: GestureType) -> f64 {
    match (instrument, gesture_type) {
        (InstrumentType::Vocal, GestureType::MouthOpen) => 0.8,
        (InstrumentType::Percussion, GestureType::HeadNod) => 0.9,
        _ => 1.0,
    }
}

pub fn context_multiplier(context: &CalibrationContext, gesture_type: GestureType) -> f64 {
    lighting_multiplier(context.lighting)
        * distance_multiplier(context.user_distance_cm)
        * pair_multiplier(context.instrument, gesture_type)
}

pub fn recommend(
    mean: f64,
    context: &CalibrationContext,
    gesture_type: GestureType,
    min: f64,
    max: f64,
) -> f64 {
    (mean * context_multiplier(context, gesture_type)).clamp(min, max)
}

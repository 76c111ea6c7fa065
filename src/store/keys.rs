use crate::gesture::types::{GestureType, InstrumentType};

pub fn profile_key(instrument: InstrumentType) -> String {
    instrument.as_str().to_string()
}

/// 阈值按参数名存储，例如 `blinkThreshold`
pub fn threshold_key(gesture_type: GestureType) -> String {
    gesture_type.param_name().to_string()
}

pub fn settings_key(name: &str) -> String {
    format!("settings:{}", name)
}

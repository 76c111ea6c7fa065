use serde_json::{json, Value};

/// 正视前方、双眼睁开
pub fn open_frame(t: f64) -> Value {
    sample_frame(t, 0.0, true)
}

/// 双眼闭合
pub fn closed_frame(t: f64) -> Value {
    sample_frame(t, 0.0, false)
}

/// 偏航角（度）
pub fn yaw_frame(t: f64, yaw_deg: f64) -> Value {
    sample_frame(t, yaw_deg.to_radians(), true)
}

pub fn lost_frame(t: f64) -> Value {
    json!({ "type": "lost", "timestamp": t })
}

fn sample_frame(t: f64, yaw: f64, eyes_open: bool) -> Value {
    let openness = if eyes_open { 1.0 } else { 0.0 };
    json!({
        "type": "sample",
        "leftEyeOpen": eyes_open,
        "rightEyeOpen": eyes_open,
        "leftEyeOpenness": openness,
        "rightEyeOpenness": openness,
        "yaw": yaw,
        "pitch": 0.0,
        "roll": 0.0,
        "confidence": 0.95,
        "timestamp": t,
    })
}

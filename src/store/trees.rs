pub const GESTURE_PROFILES: &str = "gesture_profiles";
pub const ADAPTIVE_THRESHOLDS: &str = "adaptive_thresholds";
pub const SETTINGS: &str = "settings";
pub const META: &str = "meta";

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_FRAME_QUEUE_CAPACITY, DEFAULT_MIN_POSE_CONFIDENCE,
};
use crate::gesture::types::InstrumentType;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub worker: WorkerConfig,
    pub gesture: GestureEnvConfig,
    pub calibration: CalibrationEnvConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub optimization_cron: String,
    pub threshold_flush_cron: String,
}

#[derive(Debug, Clone)]
pub struct GestureEnvConfig {
    /// 首次启动（没有保存的设置）时使用的乐器
    pub default_instrument: InstrumentType,
    pub frame_queue_capacity: usize,
    pub event_channel_capacity: usize,
    pub min_pose_confidence: f64,
}

#[derive(Debug, Clone)]
pub struct CalibrationEnvConfig {
    pub learning_rate: f64,
    pub similarity_threshold: f64,
    pub history_limit: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/gesture.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                optimization_cron: env_or("OPTIMIZATION_CRON", "0 */5 * * * *"),
                threshold_flush_cron: env_or("THRESHOLD_FLUSH_CRON", "*/10 * * * * *"),
            },
            gesture: GestureEnvConfig {
                default_instrument: env_or_parse("DEFAULT_INSTRUMENT", InstrumentType::Piano),
                frame_queue_capacity: env_or_parse(
                    "FRAME_QUEUE_CAPACITY",
                    DEFAULT_FRAME_QUEUE_CAPACITY,
                ),
                event_channel_capacity: env_or_parse(
                    "EVENT_CHANNEL_CAPACITY",
                    DEFAULT_EVENT_CHANNEL_CAPACITY,
                ),
                min_pose_confidence: env_or_parse(
                    "MIN_POSE_CONFIDENCE",
                    DEFAULT_MIN_POSE_CONFIDENCE,
                ),
            },
            calibration: CalibrationEnvConfig {
                learning_rate: env_or_parse("CALIBRATION_LEARNING_RATE", 0.1_f64),
                similarity_threshold: env_or_parse("CALIBRATION_SIMILARITY_THRESHOLD", 0.8_f64),
                history_limit: env_or_parse("CALIBRATION_HISTORY_LIMIT", 100_usize),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 单帧面部姿态观测，由外部感知模块每帧产生一次，只读。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseSample {
    pub left_eye_open: bool,
    pub right_eye_open: bool,
    /// 左眼睁开程度 [0,1]
    pub left_eye_openness: f64,
    /// 右眼睁开程度 [0,1]
    pub right_eye_openness: f64,
    /// 偏航角（弧度），正值为头部向右
    pub yaw: f64,
    /// 俯仰角（弧度）
    pub pitch: f64,
    /// 滚转角（弧度）
    pub roll: f64,
    /// 人脸检测置信度 [0,1]
    pub confidence: f64,
    /// 单调时钟时间戳（秒）
    pub timestamp: f64,
}

impl PoseSample {
    /// 正视前方、双眼睁开的样本
    pub fn neutral(timestamp: f64) -> Self {
        Self {
            left_eye_open: true,
            right_eye_open: true,
            left_eye_openness: 1.0,
            right_eye_openness: 1.0,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            confidence: 1.0,
            timestamp,
        }
    }

    pub fn with_yaw(mut self, yaw: f64) -> Self {
        self.yaw = yaw;
        self
    }

    pub fn with_eyes_closed(mut self) -> Self {
        self.left_eye_open = false;
        self.right_eye_open = false;
        self.left_eye_openness = 0.0;
        self.right_eye_openness = 0.0;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// 一帧的感知结果。未检测到人脸是独立状态，不是全零样本。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PoseFrame {
    Sample(PoseSample),
    Lost { timestamp: f64 },
}

impl PoseFrame {
    pub fn timestamp(&self) -> f64 {
        match self {
            Self::Sample(sample) => sample.timestamp,
            Self::Lost { timestamp } => *timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationDirection {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationSource {
    Blink,
    HeadShake,
    Hybrid,
}

/// 摇头检测输出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShakeDirection {
    Left,
    Right,
    None,
}

impl ShakeDirection {
    /// 向右 = 下一页，向左 = 上一页
    pub fn to_navigation(self) -> Option<NavigationDirection> {
        match self {
            Self::Right => Some(NavigationDirection::Next),
            Self::Left => Some(NavigationDirection::Previous),
            Self::None => None,
        }
    }
}

/// 发往外部协作方的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GestureEvent {
    Navigation {
        direction: NavigationDirection,
        source: NavigationSource,
    },
    WaitingForConfirmation {
        direction: NavigationDirection,
    },
    ConfirmationTimeout,
    #[serde(rename_all = "camelCase")]
    CalibrationCompleted {
        gesture_type: GestureType,
        recommended_threshold: f64,
        confidence: f64,
    },
}

impl GestureEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Navigation { .. } => "navigation",
            Self::WaitingForConfirmation { .. } => "waiting_for_confirmation",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::CalibrationCompleted { .. } => "calibration_completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstrumentType {
    Piano,
    Guitar,
    Violin,
    Vocal,
    Percussion,
    Wind,
}

impl InstrumentType {
    pub const ALL: [InstrumentType; 6] = [
        Self::Piano,
        Self::Guitar,
        Self::Violin,
        Self::Vocal,
        Self::Percussion,
        Self::Wind,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Piano => "piano",
            Self::Guitar => "guitar",
            Self::Violin => "violin",
            Self::Vocal => "vocal",
            Self::Percussion => "percussion",
            Self::Wind => "wind",
        }
    }
}

impl FromStr for InstrumentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "instrument",
                value: s.to_string(),
            })
    }
}

/// 环境光照质量（有序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LightingQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl LightingQuality {
    pub const ALL: [LightingQuality; 4] = [Self::Poor, Self::Fair, Self::Good, Self::Excellent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

impl FromStr for LightingQuality {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "lighting",
                value: s.to_string(),
            })
    }
}

/// 可校准的手势类型，每种对应一个自适应阈值参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GestureType {
    Blink,
    HeadShake,
    HeadNod,
    MouthOpen,
}

impl GestureType {
    pub const ALL: [GestureType; 4] = [Self::Blink, Self::HeadShake, Self::HeadNod, Self::MouthOpen];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blink => "blink",
            Self::HeadShake => "headShake",
            Self::HeadNod => "headNod",
            Self::MouthOpen => "mouthOpen",
        }
    }

    /// 阈值表中的参数名
    pub fn param_name(self) -> &'static str {
        match self {
            Self::Blink => "blinkThreshold",
            Self::HeadShake => "headShakeAngle",
            Self::HeadNod => "headNodAngle",
            Self::MouthOpen => "mouthOpenThreshold",
        }
    }
}

impl FromStr for GestureType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()) || g.param_name() == s.trim())
            .ok_or_else(|| ParseEnumError {
                kind: "gesture type",
                value: s.to_string(),
            })
    }
}

/// 用户对当前灵敏度的反馈
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackKind {
    TooSensitive,
    TooInsensitive,
    Perfect,
    NeedsAdjustment,
}

impl FeedbackKind {
    /// 阈值乘数：过于灵敏时提高阈值，不够灵敏时降低
    pub fn factor(self) -> f64 {
        match self {
            Self::TooSensitive => 1.2,
            Self::TooInsensitive => 0.8,
            Self::Perfect => 1.0,
            Self::NeedsAdjustment => 1.1,
        }
    }
}

/// 距离分桶宽度（厘米）
pub const DISTANCE_BUCKET_CM: u32 = 10;

pub fn bucket_distance(distance_cm: f64) -> u32 {
    if !distance_cm.is_finite() || distance_cm <= 0.0 {
        return 0;
    }
    let bucket = DISTANCE_BUCKET_CM as f64;
    ((distance_cm / bucket).round() * bucket) as u32
}

/// 阈值的上下文键：乐器 + 光照 + 分桶后的用户距离
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationContext {
    pub instrument: InstrumentType,
    pub lighting: LightingQuality,
    pub user_distance_cm: u32,
}

impl CalibrationContext {
    pub fn new(instrument: InstrumentType, lighting: LightingQuality, distance_cm: f64) -> Self {
        Self {
            instrument,
            lighting,
            user_distance_cm: bucket_distance(distance_cm),
        }
    }

    /// 外部传入的距离可能未分桶
    pub fn normalized(self) -> Self {
        Self {
            user_distance_cm: bucket_distance(self.user_distance_cm as f64),
            ..self
        }
    }

    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.instrument.as_str(),
            self.lighting.as_str(),
            self.user_distance_cm
        )
    }

    /// 相似度 = 乐器相同、距离接近程度、光照相同三项的平均
    pub fn similarity(&self, other: &CalibrationContext, distance_scale_cm: f64) -> f64 {
        let instrument = if self.instrument == other.instrument { 1.0 } else { 0.0 };
        let lighting = if self.lighting == other.lighting { 1.0 } else { 0.0 };
        let delta = (self.user_distance_cm as f64 - other.user_distance_cm as f64).abs();
        let distance = (1.0 - delta / distance_scale_cm).max(0.0);
        (instrument + distance + lighting) / 3.0
    }
}

impl Default for CalibrationContext {
    fn default() -> Self {
        Self::new(InstrumentType::Piano, LightingQuality::Good, 50.0)
    }
}

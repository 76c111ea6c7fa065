use serde::{Deserialize, Serialize};

use crate::gesture::types::InstrumentType;

/// 每种乐器的手势配置。运行时作为不可变快照使用，热切换时整体替换。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureProfile {
    pub instrument: InstrumentType,
    pub enable_blink: bool,
    pub enable_head_shake: bool,
    pub require_confirmation: bool,
    /// 睁眼程度低于该值视为闭眼
    pub blink_threshold: f64,
    /// 两次闭眼的最大间隔（秒）
    pub blink_time_window: f64,
    /// 两次闭眼的最小间隔（秒），更短的视为同一次闭眼
    pub min_blink_duration: f64,
    pub required_blink_count: u32,
    /// 长眨眼时长（秒）。检测器目前不测量闭眼时长，该字段仅保存配置
    pub long_blink_duration: f64,
    /// 摇头角度阈值（度）
    pub shake_angle_threshold: f64,
    /// 超过阈值需要持续的时间（秒）
    pub shake_duration: f64,
    /// 触发后的冷却时间（秒）
    pub shake_cooldown: f64,
    /// 混合模式下等待确认眨眼的超时（秒）
    pub confirmation_timeout: f64,
}

/// 检测器组合方式，由 profile 的开关推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchMode {
    BlinkOnly,
    HeadShakeOnly,
    /// 摇头后需要眨眼确认
    Hybrid,
    /// 两个检测器各自独立触发
    Independent,
}

impl GestureProfile {
    pub fn default_for(instrument: InstrumentType) -> Self {
        let base = Self {
            instrument,
            enable_blink: true,
            enable_head_shake: true,
            require_confirmation: false,
            blink_threshold: 0.3,
            blink_time_window: 0.5,
            min_blink_duration: 0.1,
            required_blink_count: 2,
            long_blink_duration: 1.0,
            shake_angle_threshold: 30.0,
            shake_duration: 0.3,
            shake_cooldown: 0.5,
            confirmation_timeout: 3.0,
        };

        match instrument {
            // 双手占用、头部自由：摇头 + 眨眼确认
            InstrumentType::Piano => Self {
                require_confirmation: true,
                ..base
            },
            InstrumentType::Guitar | InstrumentType::Wind => Self {
                enable_blink: false,
                ..base
            },
            // 下巴夹琴或演唱时头部动作受限
            InstrumentType::Violin | InstrumentType::Vocal => Self {
                enable_head_shake: false,
                ..base
            },
            InstrumentType::Percussion => Self {
                shake_cooldown: 0.8,
                ..base
            },
        }
    }

    pub fn mode(&self) -> DispatchMode {
        match (self.enable_blink, self.enable_head_shake) {
            (true, false) => DispatchMode::BlinkOnly,
            (false, true) => DispatchMode::HeadShakeOnly,
            _ if self.require_confirmation => DispatchMode::Hybrid,
            _ => DispatchMode::Independent,
        }
    }

    pub fn shake_angle_radians(&self) -> f64 {
        self.shake_angle_threshold.to_radians()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.enable_blink && !self.enable_head_shake {
            return Err("at least one of enable_blink / enable_head_shake must be set".to_string());
        }

        let durations = [
            ("blink_time_window", self.blink_time_window),
            ("min_blink_duration", self.min_blink_duration),
            ("long_blink_duration", self.long_blink_duration),
            ("shake_duration", self.shake_duration),
            ("shake_cooldown", self.shake_cooldown),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} must be > 0 (got {value})"));
            }
        }

        if self.min_blink_duration >= self.blink_time_window {
            return Err("min_blink_duration must be < blink_time_window".to_string());
        }
        if self.required_blink_count == 0 {
            return Err("required_blink_count must be >= 1".to_string());
        }
        if !(self.blink_threshold > 0.0 && self.blink_threshold <= 1.0) {
            return Err("blink_threshold must be in (0,1]".to_string());
        }
        if !(self.shake_angle_threshold > 0.0 && self.shake_angle_threshold < 90.0) {
            return Err("shake_angle_threshold must be in (0,90) degrees".to_string());
        }
        if self.mode() == DispatchMode::Hybrid
            && (!self.confirmation_timeout.is_finite() || self.confirmation_timeout <= 0.0)
        {
            return Err("confirmation_timeout must be > 0 in a hybrid profile".to_string());
        }

        Ok(())
    }
}

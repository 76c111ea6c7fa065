//! 摇头检测状态机
//!
//! Neutral → Exceeding(direction, since) → 触发 → Cooldown(until) → Neutral
//!
//! 偏航角需要在同一方向上持续超过阈值 `duration` 秒才触发；换方向不继承已累计的时间。
//! 丢失人脸时只取消进行中的计时，不能当作回到 0 度，否则短暂丢帧后重新捕获
//! 会被当成“回正后再次转头”，一次摇头触发两次。

use crate::gesture::profile::GestureProfile;
use crate::gesture::types::ShakeDirection;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadShakeSettings {
    /// 角度阈值（弧度）
    pub angle_threshold: f64,
    pub duration: f64,
    pub cooldown: f64,
}

impl HeadShakeSettings {
    pub fn from_profile(profile: &GestureProfile) -> Self {
        Self {
            angle_threshold: profile.shake_angle_radians(),
            duration: profile.shake_duration,
            cooldown: profile.shake_cooldown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShakeState {
    Neutral,
    Exceeding { direction: ShakeDirection, since: f64 },
    Cooldown { until: f64 },
}

#[derive(Debug, Clone)]
pub struct HeadShakeDetector {
    settings: HeadShakeSettings,
    state: ShakeState,
}

impl HeadShakeDetector {
    pub fn new(settings: HeadShakeSettings) -> Self {
        Self {
            settings,
            state: ShakeState::Neutral,
        }
    }

    pub fn state(&self) -> ShakeState {
        self.state
    }

    pub fn angle_threshold(&self) -> f64 {
        self.settings.angle_threshold
    }

    /// 自适应阈值变化时更新；不影响进行中的状态
    pub fn set_angle_threshold(&mut self, radians: f64) {
        self.settings.angle_threshold = radians;
    }

    pub fn observe(&mut self, yaw: f64, now: f64) -> ShakeDirection {
        if let ShakeState::Cooldown { until } = self.state {
            if now < until {
                return ShakeDirection::None;
            }
            self.state = ShakeState::Neutral;
        }

        if !yaw.is_finite() || yaw.abs() < self.settings.angle_threshold {
            self.state = ShakeState::Neutral;
            return ShakeDirection::None;
        }

        let direction = if yaw > 0.0 {
            ShakeDirection::Right
        } else {
            ShakeDirection::Left
        };

        match self.state {
            ShakeState::Exceeding {
                direction: current,
                since,
            } if current == direction => {
                if now - since >= self.settings.duration {
                    self.state = ShakeState::Cooldown {
                        until: now + self.settings.cooldown,
                    };
                    return direction;
                }
            }
            _ => {
                self.state = ShakeState::Exceeding {
                    direction,
                    since: now,
                };
            }
        }

        ShakeDirection::None
    }

    /// 没有姿态样本：取消计时，冷却照常
    pub fn signal_lost(&mut self) {
        if matches!(self.state, ShakeState::Exceeding { .. }) {
            self.state = ShakeState::Neutral;
        }
    }

    pub fn reset(&mut self) {
        self.state = ShakeState::Neutral;
    }
}

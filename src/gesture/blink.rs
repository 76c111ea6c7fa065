//! 双眨眼检测
//!
//! 只统计“闭眼”的重复出现，不测量闭眼时长：
//! - 两次闭眼间隔落在 (min_blink_duration, blink_time_window) 内时计数加一
//! - 间隔不超过 min_blink_duration 视为同一次闭眼（防抖）
//! - 间隔超过 blink_time_window 时从 1 重新计数
//!
//! 睁眼帧不改变状态，计数只会被窗口外的闭眼重置。

use crate::gesture::profile::GestureProfile;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkSettings {
    pub time_window: f64,
    pub min_interval: f64,
    pub required_count: u32,
}

impl BlinkSettings {
    pub fn from_profile(profile: &GestureProfile) -> Self {
        Self {
            time_window: profile.blink_time_window,
            min_interval: profile.min_blink_duration,
            required_count: profile.required_blink_count.max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    settings: BlinkSettings,
    last_closure_time: Option<f64>,
    closure_count: u32,
}

impl BlinkDetector {
    pub fn new(settings: BlinkSettings) -> Self {
        Self {
            settings,
            last_closure_time: None,
            closure_count: 0,
        }
    }

    /// 仅在双眨眼完成的那一帧返回 true
    pub fn observe(&mut self, left_open: bool, right_open: bool, now: f64) -> bool {
        if left_open || right_open {
            return false;
        }

        match self.last_closure_time {
            Some(last) => {
                let gap = now - last;
                if gap <= self.settings.min_interval {
                    // 同一次闭眼的连续帧
                } else if gap < self.settings.time_window {
                    self.closure_count += 1;
                } else {
                    self.closure_count = 1;
                }
            }
            None => self.closure_count = 1,
        }
        self.last_closure_time = Some(now);

        if self.closure_count >= self.settings.required_count {
            self.closure_count = 0;
            return true;
        }
        false
    }

    pub fn closure_count(&self) -> u32 {
        self.closure_count
    }

    pub fn reset(&mut self) {
        self.last_closure_time = None;
        self.closure_count = 0;
    }
}

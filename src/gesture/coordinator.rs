//! 手势协调器
//!
//! 按 profile 的模式分发到两个检测器，并维护混合模式下“摇头 + 眨眼确认”的两阶段协议：
//!
//! ```text
//! Idle --摇头--> WaitingConfirmation(dir, deadline) --眨眼(< deadline)--> Navigation(dir, Hybrid)
//!                         |--到期--> ConfirmationTimeout
//!                         |--再次摇头--> 替换方向与截止时间
//! ```
//!
//! 每帧开始时先检查截止时间，丢帧也会推进超时。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::calibration::table::ThresholdTable;
use crate::constants::{
    BLINK_THRESHOLD_MAX, BLINK_THRESHOLD_MIN, DEFAULT_MIN_POSE_CONFIDENCE, SHAKE_ANGLE_MAX_DEG,
    SHAKE_ANGLE_MIN_DEG,
};
use crate::gesture::blink::{BlinkDetector, BlinkSettings};
use crate::gesture::head_shake::{HeadShakeDetector, HeadShakeSettings};
use crate::gesture::profile::{DispatchMode, GestureProfile};
use crate::gesture::sink::{self, EventSink};
use crate::gesture::types::{
    CalibrationContext, GestureEvent, GestureType, NavigationDirection, NavigationSource,
    PoseFrame, PoseSample,
};
use crate::gesture::GestureError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CoordinatorState {
    Idle,
    WaitingConfirmation {
        direction: NavigationDirection,
        deadline: f64,
    },
}

/// 检测器实际使用的阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedThresholds {
    pub blink_threshold: f64,
    /// 弧度
    pub shake_angle: f64,
    /// 至少一项来自校准数据
    pub adaptive: bool,
}

impl ResolvedThresholds {
    pub fn from_profile(profile: &GestureProfile) -> Self {
        Self {
            blink_threshold: profile.blink_threshold,
            shake_angle: profile.shake_angle_radians(),
            adaptive: false,
        }
    }

    /// 校准值优先（精确或相似上下文），否则使用 profile 自身的值
    pub fn resolve(
        profile: &GestureProfile,
        context: &CalibrationContext,
        table: Option<&ThresholdTable>,
    ) -> Self {
        let calibrated = |gesture: GestureType| {
            table
                .and_then(|t| t.resolve(gesture, context))
                .filter(|lookup| lookup.is_adaptive())
                .map(|lookup| lookup.value)
                .filter(|value| value.is_finite())
        };

        let blink = calibrated(GestureType::Blink);
        let angle = calibrated(GestureType::HeadShake);
        let fallback = Self::from_profile(profile);

        Self {
            blink_threshold: blink
                .map(|v| v.clamp(BLINK_THRESHOLD_MIN, BLINK_THRESHOLD_MAX))
                .unwrap_or(fallback.blink_threshold),
            shake_angle: angle
                .map(|v| v.clamp(SHAKE_ANGLE_MIN_DEG.to_radians(), SHAKE_ANGLE_MAX_DEG.to_radians()))
                .unwrap_or(fallback.shake_angle),
            adaptive: blink.is_some() || angle.is_some(),
        }
    }
}

/// 状态快照，供状态接口使用
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStatus {
    pub profile: GestureProfile,
    pub mode: DispatchMode,
    pub state: CoordinatorState,
    pub context: CalibrationContext,
    pub thresholds: ResolvedThresholds,
    pub blink_closure_count: u32,
}

pub struct GestureCoordinator {
    profile: GestureProfile,
    blink: BlinkDetector,
    head_shake: HeadShakeDetector,
    state: CoordinatorState,
    context: CalibrationContext,
    thresholds_rx: Option<watch::Receiver<Arc<ThresholdTable>>>,
    resolved: ResolvedThresholds,
    min_pose_confidence: f64,
    sink: Option<Box<dyn EventSink>>,
}

impl GestureCoordinator {
    pub fn new(profile: GestureProfile) -> Result<Self, GestureError> {
        profile.validate().map_err(GestureError::InvalidProfile)?;
        let context = CalibrationContext {
            instrument: profile.instrument,
            ..CalibrationContext::default()
        };

        Ok(Self {
            blink: BlinkDetector::new(BlinkSettings::from_profile(&profile)),
            head_shake: HeadShakeDetector::new(HeadShakeSettings::from_profile(&profile)),
            state: CoordinatorState::Idle,
            context,
            thresholds_rx: None,
            resolved: ResolvedThresholds::from_profile(&profile),
            min_pose_confidence: DEFAULT_MIN_POSE_CONFIDENCE,
            sink: None,
            profile,
        })
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_thresholds(mut self, rx: watch::Receiver<Arc<ThresholdTable>>) -> Self {
        self.thresholds_rx = Some(rx);
        self.refresh_thresholds(true);
        self
    }

    pub fn with_context(mut self, context: CalibrationContext) -> Self {
        self.set_context(context);
        self
    }

    pub fn with_min_pose_confidence(mut self, min_confidence: f64) -> Self {
        self.min_pose_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn profile(&self) -> &GestureProfile {
        &self.profile
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn context(&self) -> &CalibrationContext {
        &self.context
    }

    pub fn thresholds(&self) -> ResolvedThresholds {
        self.resolved
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            profile: self.profile.clone(),
            mode: self.profile.mode(),
            state: self.state,
            context: self.context,
            thresholds: self.resolved,
            blink_closure_count: self.blink.closure_count(),
        }
    }

    /// 热切换 profile：校验失败时保留旧配置；成功后回到 Idle 并重建检测器
    pub fn set_profile(&mut self, profile: GestureProfile) -> Result<(), GestureError> {
        if let Err(reason) = profile.validate() {
            tracing::warn!(
                instrument = profile.instrument.as_str(),
                reason = %reason,
                "Rejected gesture profile"
            );
            return Err(GestureError::InvalidProfile(reason));
        }

        tracing::info!(
            instrument = profile.instrument.as_str(),
            mode = ?profile.mode(),
            "Gesture profile switched"
        );
        self.profile = profile;
        self.rebuild();
        Ok(())
    }

    pub fn set_context(&mut self, context: CalibrationContext) {
        let context = context.normalized();
        if context == self.context {
            return;
        }
        self.context = context;
        self.refresh_thresholds(true);
    }

    /// 应用阈值表的最新快照（没有变化时不做任何事）
    pub fn sync_thresholds(&mut self) {
        self.refresh_thresholds(false);
    }

    /// 丢弃所有进行中的状态
    pub fn reset(&mut self) {
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.state = CoordinatorState::Idle;
        self.blink = BlinkDetector::new(BlinkSettings::from_profile(&self.profile));
        self.head_shake = HeadShakeDetector::new(HeadShakeSettings::from_profile(&self.profile));
        self.refresh_thresholds(true);
    }

    /// 处理一帧，返回本帧产生的事件（同时已发往 sink）
    pub fn feed(&mut self, frame: &PoseFrame) -> Vec<GestureEvent> {
        let now = frame.timestamp();
        let mut events = Vec::new();

        if let Some(event) = self.check_timeout(now) {
            events.push(event);
        }
        self.refresh_thresholds(false);

        let sample = match frame {
            PoseFrame::Sample(sample) if sample.confidence >= self.min_pose_confidence => sample,
            _ => {
                // 眨眼计数只由时间窗口重置
                self.head_shake.signal_lost();
                return events;
            }
        };

        let blinked = self.profile.enable_blink && self.observe_blink(sample, now);
        let shake = if self.profile.enable_head_shake {
            self.head_shake.observe(sample.yaw, now).to_navigation()
        } else {
            None
        };

        match self.profile.mode() {
            DispatchMode::BlinkOnly => {
                if blinked {
                    self.emit_navigation(NavigationDirection::Next, NavigationSource::Blink, &mut events);
                }
            }
            DispatchMode::HeadShakeOnly => {
                if let Some(direction) = shake {
                    self.emit_navigation(direction, NavigationSource::HeadShake, &mut events);
                }
            }
            DispatchMode::Independent => {
                if blinked {
                    self.emit_navigation(NavigationDirection::Next, NavigationSource::Blink, &mut events);
                }
                if let Some(direction) = shake {
                    self.emit_navigation(direction, NavigationSource::HeadShake, &mut events);
                }
            }
            DispatchMode::Hybrid => {
                // 确认先于新的摇头处理：同一帧内眨眼确认旧方向，摇头开启新的等待
                if blinked {
                    self.confirm(now, &mut events);
                }
                if let Some(direction) = shake {
                    self.state = CoordinatorState::WaitingConfirmation {
                        direction,
                        deadline: now + self.profile.confirmation_timeout,
                    };
                    self.emit(GestureEvent::WaitingForConfirmation { direction }, &mut events);
                }
            }
        }

        events
    }

    /// 截止时间已到则回到 Idle 并发出超时事件
    pub fn check_timeout(&mut self, now: f64) -> Option<GestureEvent> {
        match self.state {
            CoordinatorState::WaitingConfirmation { deadline, .. } if now >= deadline => {
                self.state = CoordinatorState::Idle;
                let event = GestureEvent::ConfirmationTimeout;
                sink::dispatch(self.sink.as_deref(), &event);
                Some(event)
            }
            _ => None,
        }
    }

    fn observe_blink(&mut self, sample: &PoseSample, now: f64) -> bool {
        let threshold = self.resolved.blink_threshold;
        let left_open = sample.left_eye_open && sample.left_eye_openness >= threshold;
        let right_open = sample.right_eye_open && sample.right_eye_openness >= threshold;
        self.blink.observe(left_open, right_open, now)
    }

    fn confirm(&mut self, now: f64, events: &mut Vec<GestureEvent>) {
        match self.state {
            CoordinatorState::WaitingConfirmation {
                direction,
                deadline,
            } if now < deadline => {
                self.state = CoordinatorState::Idle;
                self.emit_navigation(direction, NavigationSource::Hybrid, events);
            }
            _ => tracing::debug!("Blink without pending head shake, ignored"),
        }
    }

    fn emit_navigation(
        &self,
        direction: NavigationDirection,
        source: NavigationSource,
        events: &mut Vec<GestureEvent>,
    ) {
        self.emit(GestureEvent::Navigation { direction, source }, events);
    }

    fn emit(&self, event: GestureEvent, events: &mut Vec<GestureEvent>) {
        sink::dispatch(self.sink.as_deref(), &event);
        events.push(event);
    }

    fn refresh_thresholds(&mut self, force: bool) {
        let changed = self
            .thresholds_rx
            .as_ref()
            .map(|rx| rx.has_changed().unwrap_or(false))
            .unwrap_or(false);
        if !force && !changed {
            return;
        }

        let table = self
            .thresholds_rx
            .as_mut()
            .map(|rx| Arc::clone(&rx.borrow_and_update()));
        let resolved = ResolvedThresholds::resolve(&self.profile, &self.context, table.as_deref());

        if resolved != self.resolved {
            tracing::debug!(
                blink_threshold = resolved.blink_threshold,
                shake_angle_deg = resolved.shake_angle.to_degrees(),
                adaptive = resolved.adaptive,
                "Detector thresholds updated"
            );
        }
        self.resolved = resolved;
        self.head_shake.set_angle_threshold(resolved.shake_angle);
    }
}

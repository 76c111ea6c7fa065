//! 自适应阈值表
//!
//! 每个手势类型一个 `AdaptiveThreshold`：基础值 + 按上下文存储的校准值。
//! 查找顺序：精确上下文 → 最相似的已存上下文（相似度需超过阈值）→ 基础值。

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gesture::types::{CalibrationContext, GestureType};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupParams {
    /// 相似上下文必须严格超过该分数才会被采用
    pub similarity_threshold: f64,
    /// 距离相似度的归一化尺度（厘米）
    pub distance_scale_cm: f64,
}

impl Default for LookupParams {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            distance_scale_cm: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextThreshold {
    pub context: CalibrationContext,
    pub value: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LookupSource {
    Exact,
    Similar { key: String, score: f64 },
    Base,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdLookup {
    pub value: f64,
    pub source: LookupSource,
}

impl ThresholdLookup {
    /// 是否来自校准数据而不是基础值
    pub fn is_adaptive(&self) -> bool {
        !matches!(self.source, LookupSource::Base)
    }
}

/// 单个可调参数的阈值，持久化为扁平 JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveThreshold {
    pub gesture_type: GestureType,
    pub base_value: f64,
    /// key = `CalibrationContext::key()`
    #[serde(default)]
    pub per_context: BTreeMap<String, ContextThreshold>,
    pub learning_rate: f64,
}

impl AdaptiveThreshold {
    pub fn new(gesture_type: GestureType, base_value: f64, learning_rate: f64) -> Self {
        Self {
            gesture_type,
            base_value,
            per_context: BTreeMap::new(),
            learning_rate,
        }
    }

    pub fn stored(&self, context: &CalibrationContext) -> Option<f64> {
        self.per_context.get(&context.key()).map(|entry| entry.value)
    }

    pub fn resolve(&self, context: &CalibrationContext, params: &LookupParams) -> ThresholdLookup {
        if let Some(value) = self.stored(context) {
            return ThresholdLookup {
                value,
                source: LookupSource::Exact,
            };
        }

        // 同分时保留键序靠前的上下文
        let best = self
            .per_context
            .iter()
            .map(|(key, entry)| {
                (
                    key,
                    entry,
                    context.similarity(&entry.context, params.distance_scale_cm),
                )
            })
            .fold(None, |best: Option<(&String, &ContextThreshold, f64)>, candidate| match best {
                Some(current) if current.2 >= candidate.2 => Some(current),
                _ => Some(candidate),
            });

        match best {
            Some((key, entry, score)) if score > params.similarity_threshold => ThresholdLookup {
                value: entry.value,
                source: LookupSource::Similar {
                    key: key.clone(),
                    score,
                },
            },
            _ => ThresholdLookup {
                value: self.base_value,
                source: LookupSource::Base,
            },
        }
    }

    pub fn set(&mut self, context: CalibrationContext, value: f64) {
        self.per_context.insert(
            context.key(),
            ContextThreshold {
                context,
                value,
                updated_at: Utc::now(),
            },
        );
    }

    /// 指数平滑合并：已有值时 `stored*(1-lr) + new*lr`，否则直接写入
    pub fn blend(&mut self, context: CalibrationContext, new_value: f64) -> f64 {
        let merged = match self.stored(&context) {
            Some(stored) => stored * (1.0 - self.learning_rate) + new_value * self.learning_rate,
            None => new_value,
        };
        self.set(context, merged);
        merged
    }
}

/// 所有手势阈值的快照。检测路径只读 `Arc<ThresholdTable>`，写入方整体替换。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdTable {
    thresholds: HashMap<GestureType, AdaptiveThreshold>,
    params: LookupParams,
}

impl ThresholdTable {
    pub fn new(params: LookupParams) -> Self {
        Self {
            thresholds: HashMap::new(),
            params,
        }
    }

    pub fn get(&self, gesture_type: GestureType) -> Option<&AdaptiveThreshold> {
        self.thresholds.get(&gesture_type)
    }

    pub fn insert(&mut self, threshold: AdaptiveThreshold) {
        self.thresholds.insert(threshold.gesture_type, threshold);
    }

    pub fn get_or_insert_with(
        &mut self,
        gesture_type: GestureType,
        default: impl FnOnce() -> AdaptiveThreshold,
    ) -> &mut AdaptiveThreshold {
        self.thresholds.entry(gesture_type).or_insert_with(default)
    }

    pub fn set_params(&mut self, params: LookupParams) {
        self.params = params;
    }

    pub fn resolve(
        &self,
        gesture_type: GestureType,
        context: &CalibrationContext,
    ) -> Option<ThresholdLookup> {
        self.thresholds
            .get(&gesture_type)
            .map(|t| t.resolve(context, &self.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::types::{InstrumentType, LightingQuality};

    fn ctx(instrument: InstrumentType, lighting: LightingQuality, distance: f64) -> CalibrationContext {
        CalibrationContext::new(instrument, lighting, distance)
    }

    #[test]
    fn exact_match_wins() {
        let mut t = AdaptiveThreshold::new(GestureType::Blink, 0.3, 0.1);
        let c = ctx(InstrumentType::Piano, LightingQuality::Good, 50.0);
        t.set(c, 0.42);
        let hit = t.resolve(&c, &LookupParams::default());
        assert_eq!(hit.value, 0.42);
        assert_eq!(hit.source, LookupSource::Exact);
    }

    #[test]
    fn similar_context_is_used_above_threshold() {
        let mut t = AdaptiveThreshold::new(GestureType::Blink, 0.3, 0.1);
        t.set(ctx(InstrumentType::Piano, LightingQuality::Good, 50.0), 0.42);

        // 距离差 10cm：(1 + 0.8 + 1) / 3 ≈ 0.933
        let near = t.resolve(
            &ctx(InstrumentType::Piano, LightingQuality::Good, 60.0),
            &LookupParams::default(),
        );
        assert_eq!(near.value, 0.42);
        assert!(matches!(near.source, LookupSource::Similar { .. }));

        // 光照不同：(1 + 1 + 0) / 3 ≈ 0.667
        let other_light = t.resolve(
            &ctx(InstrumentType::Piano, LightingQuality::Poor, 50.0),
            &LookupParams::default(),
        );
        assert_eq!(other_light.value, 0.3);
        assert_eq!(other_light.source, LookupSource::Base);
    }

    #[test]
    fn equally_similar_contexts_resolve_to_first_key() {
        let mut t = AdaptiveThreshold::new(GestureType::Blink, 0.3, 0.1);
        t.set(ctx(InstrumentType::Piano, LightingQuality::Good, 40.0), 0.4);
        t.set(ctx(InstrumentType::Piano, LightingQuality::Good, 60.0), 0.6);

        let hit = t.resolve(
            &ctx(InstrumentType::Piano, LightingQuality::Good, 50.0),
            &LookupParams::default(),
        );
        assert_eq!(hit.value, 0.4);
        assert!(matches!(
            hit.source,
            LookupSource::Similar { ref key, .. } if key == "piano:good:40"
        ));
    }

    #[test]
    fn most_similar_candidate_is_chosen() {
        let mut t = AdaptiveThreshold::new(GestureType::HeadShake, 0.5, 0.1);
        t.set(ctx(InstrumentType::Guitar, LightingQuality::Fair, 30.0), 0.6);
        t.set(ctx(InstrumentType::Guitar, LightingQuality::Fair, 50.0), 0.7);
        let hit = t.resolve(
            &ctx(InstrumentType::Guitar, LightingQuality::Fair, 60.0),
            &LookupParams::default(),
        );
        assert_eq!(hit.value, 0.7);
    }

    #[test]
    fn blend_smooths_existing_value() {
        let mut t = AdaptiveThreshold::new(GestureType::Blink, 0.3, 0.1);
        let c = ctx(InstrumentType::Vocal, LightingQuality::Good, 50.0);
        assert_eq!(t.blend(c, 0.5), 0.5);
        let merged = t.blend(c, 1.0);
        assert!((merged - (0.5 * 0.9 + 1.0 * 0.1)).abs() < 1e-12);
    }

    #[test]
    fn table_resolves_missing_gesture_as_none() {
        let table = ThresholdTable::new(LookupParams::default());
        assert!(table
            .resolve(GestureType::MouthOpen, &CalibrationContext::default())
            .is_none());
    }
}

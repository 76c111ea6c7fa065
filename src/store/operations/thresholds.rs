use crate::calibration::table::AdaptiveThreshold;
use crate::gesture::types::GestureType;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn get_threshold(&self, gesture_type: GestureType) -> Result<Option<AdaptiveThreshold>, StoreError> {
        let key = keys::threshold_key(gesture_type);
        match self.adaptive_thresholds.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_thresholds(&self) -> Result<Vec<AdaptiveThreshold>, StoreError> {
        let mut thresholds = Vec::new();
        for item in self.adaptive_thresholds.iter() {
            let (_, value) = item?;
            thresholds.push(Self::deserialize(&value)?);
        }
        Ok(thresholds)
    }

    /// 一次 sled batch 写入，要么全部成功要么全部不写
    pub fn upsert_thresholds(&self, thresholds: &[AdaptiveThreshold]) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for threshold in thresholds {
            let key = keys::threshold_key(threshold.gesture_type);
            batch.insert(key.as_bytes(), Self::serialize(threshold)?);
        }
        self.adaptive_thresholds.apply_batch(batch)?;
        Ok(())
    }
}

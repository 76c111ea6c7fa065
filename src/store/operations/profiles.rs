use crate::gesture::profile::GestureProfile;
use crate::gesture::types::InstrumentType;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn get_profile(&self, instrument: InstrumentType) -> Result<Option<GestureProfile>, StoreError> {
        let key = keys::profile_key(instrument);
        match self.gesture_profiles.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// 没有保存过的乐器返回内置默认值
    pub fn get_profile_or_default(&self, instrument: InstrumentType) -> Result<GestureProfile, StoreError> {
        Ok(self
            .get_profile(instrument)?
            .unwrap_or_else(|| GestureProfile::default_for(instrument)))
    }

    /// 写入前校验，非法 profile 不落盘
    pub fn upsert_profile(&self, profile: &GestureProfile) -> Result<(), StoreError> {
        profile.validate().map_err(StoreError::Validation)?;
        let key = keys::profile_key(profile.instrument);
        self.gesture_profiles
            .insert(key.as_bytes(), Self::serialize(profile)?)?;
        Ok(())
    }

    pub fn delete_profile(&self, instrument: InstrumentType) -> Result<(), StoreError> {
        let key = keys::profile_key(instrument);
        if self.gesture_profiles.remove(key.as_bytes())?.is_none() {
            return Err(StoreError::NotFound {
                entity: "gesture_profile".to_string(),
                key,
            });
        }
        Ok(())
    }
}

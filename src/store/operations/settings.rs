use serde::{Deserialize, Serialize};

use crate::gesture::types::{CalibrationContext, InstrumentType};
use crate::store::keys;
use crate::store::{Store, StoreError};

const RUNTIME_SETTINGS: &str = "runtime";

/// 重启后恢复的运行时选择
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    pub active_instrument: InstrumentType,
    pub context: CalibrationContext,
}

impl RuntimeSettings {
    pub fn for_instrument(instrument: InstrumentType) -> Self {
        Self {
            active_instrument: instrument,
            context: CalibrationContext {
                instrument,
                ..CalibrationContext::default()
            },
        }
    }
}

impl Store {
    pub fn get_runtime_settings(&self) -> Result<Option<RuntimeSettings>, StoreError> {
        let key = keys::settings_key(RUNTIME_SETTINGS);
        match self.settings.get(key.as_bytes())? {
            Some(raw) => match serde_json::from_slice::<RuntimeSettings>(&raw) {
                Ok(parsed) => Ok(Some(parsed)),
                Err(error) => {
                    tracing::error!(error = %error, "Failed to deserialize runtime settings");
                    Err(StoreError::Serialization(error))
                }
            },
            None => Ok(None),
        }
    }

    pub fn save_runtime_settings(&self, settings: &RuntimeSettings) -> Result<(), StoreError> {
        let key = keys::settings_key(RUNTIME_SETTINGS);
        self.settings.insert(key.as_bytes(), Self::serialize(settings)?)?;
        Ok(())
    }
}

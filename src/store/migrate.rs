use crate::gesture::profile::GestureProfile;
use crate::gesture::types::InstrumentType;
use crate::store::keys;
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![("001_seed_default_profiles", m001_seed_default_profiles)]
}

/// 执行所有未应用的迁移。
///
/// - 每个迁移函数必须幂等：进程可能在迁移完成但版本号写入之前退出
/// - 版本号在每个迁移成功后立即写入
/// - 仅向前：set_version 拒绝降级
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;

    for (index, (name, func)) in migrations().iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("corrupt version marker ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store.meta.insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

/// 写入各乐器的默认 profile，已存在的不覆盖
fn m001_seed_default_profiles(store: &Store) -> Result<(), StoreError> {
    for instrument in InstrumentType::ALL {
        let key = keys::profile_key(instrument);
        if store.gesture_profiles.contains_key(key.as_bytes())? {
            continue;
        }
        let profile = GestureProfile::default_for(instrument);
        store
            .gesture_profiles
            .insert(key.as_bytes(), Store::serialize(&profile)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn migration_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        run(&store).unwrap();
        let first = get_current_version(&store).unwrap();
        run(&store).unwrap();
        let second = get_current_version(&store).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(store.gesture_profiles.len(), InstrumentType::ALL.len());
    }

    #[test]
    fn seeding_keeps_existing_profiles() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();

        let mut custom = GestureProfile::default_for(InstrumentType::Guitar);
        custom.shake_angle_threshold = 42.0;
        store.upsert_profile(&custom).unwrap();

        run(&store).unwrap();
        let loaded = store.get_profile(InstrumentType::Guitar).unwrap().unwrap();
        assert_eq!(loaded.shake_angle_threshold, 42.0);
    }

    #[test]
    fn downgrade_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db2");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        set_version(&store, 3).unwrap();
        let err = set_version(&store, 2).unwrap_err();
        assert!(matches!(err, StoreError::Migration { .. }));
    }
}

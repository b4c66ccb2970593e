//! CRUD over the single `UserData` profile record.

use std::sync::Arc;

use crate::error::{PersistError, StorageError, ValidationError};
use crate::log_info;
use crate::models::{ProfileChanges, UserProfile};
use crate::storage::KeyValueStore;

const ENABLE_LOGS: bool = true;

pub const USER_DATA_KEY: &str = "UserData";

#[derive(Clone)]
pub struct ProfileStore {
    store: Arc<dyn KeyValueStore>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self) -> Result<Option<UserProfile>, StorageError> {
        let Some(raw) = self.store.get_item(USER_DATA_KEY).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: USER_DATA_KEY.to_string(),
                source,
            })
    }

    /// First-time setup. Replaces whatever is stored.
    pub async fn setup(&self, profile: UserProfile) -> Result<UserProfile, PersistError> {
        if profile.is_blank() {
            return Err(ValidationError::EmptyEntry.into());
        }
        let raw = encode(&profile)?;
        self.store.set_item(USER_DATA_KEY, raw).await?;
        log_info!("Profile created");
        Ok(profile)
    }

    /// Writes only the fields that changed; blank fields keep what is stored.
    pub async fn update(&self, changes: ProfileChanges) -> Result<UserProfile, PersistError> {
        if changes.is_blank() {
            return Err(ValidationError::EmptyEntry.into());
        }

        let current = self.get().await?.unwrap_or_default();
        let updated = current.apply(&changes);
        self.store
            .merge_item(USER_DATA_KEY, encode(&updated)?)
            .await?;
        log_info!("Profile updated");
        Ok(updated)
    }

    pub async fn remove(&self) -> Result<(), StorageError> {
        self.store.remove_item(USER_DATA_KEY).await?;
        log_info!("Profile removed");
        Ok(())
    }
}

fn encode(profile: &UserProfile) -> Result<String, StorageError> {
    serde_json::to_string(profile).map_err(|source| StorageError::Encode {
        key: USER_DATA_KEY.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::{json, Value};

    fn sam() -> UserProfile {
        UserProfile {
            name: "Sam".into(),
            age: "41".into(),
            nhs_number: "943 476 5919".into(),
            health_type: "type1".into(),
            ..UserProfile::default()
        }
    }

    #[tokio::test]
    async fn setup_get_update_remove() {
        let store = Arc::new(MemoryStore::new());
        let profiles = ProfileStore::new(store.clone());

        assert_eq!(profiles.get().await.unwrap(), None);
        profiles.setup(sam()).await.unwrap();
        assert_eq!(profiles.get().await.unwrap(), Some(sam()));

        let updated = profiles
            .update(ProfileChanges {
                age: Some("42".into()),
                name: Some("".into()),
                ..ProfileChanges::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "Sam");
        assert_eq!(updated.age, "42");
        assert_eq!(profiles.get().await.unwrap(), Some(updated));

        profiles.remove().await.unwrap();
        assert_eq!(profiles.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected_without_storage() {
        let store = Arc::new(MemoryStore::new());
        let profiles = ProfileStore::new(store.clone());

        assert!(profiles
            .setup(UserProfile::default())
            .await
            .unwrap_err()
            .is_validation());
        assert!(profiles
            .update(ProfileChanges::default())
            .await
            .unwrap_err()
            .is_validation());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn update_keeps_fields_it_does_not_know() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_item(
                USER_DATA_KEY,
                json!({"name": "Sam", "legacy_flag": true}).to_string(),
            )
            .await
            .unwrap();
        let profiles = ProfileStore::new(store.clone());

        profiles
            .update(ProfileChanges {
                weight: Some("80".into()),
                ..ProfileChanges::default()
            })
            .await
            .unwrap();

        let raw: Value = serde_json::from_str(&store.peek(USER_DATA_KEY).await.unwrap()).unwrap();
        assert_eq!(raw["legacy_flag"], true);
        assert_eq!(raw["weight"], "80");
        assert_eq!(raw["name"], "Sam");
    }
}

use std::sync::Arc;

use serde_json::Value;

use crate::api::AdminSession;
use crate::utils::storage::{KeyValueStorage, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const IS_AUTH_KEY: &str = "isAuth";
pub const ADMIN_PROFILE_KEY: &str = "admin";

/// Names earlier dashboard builds stored the access token under.
pub const LEGACY_TOKEN_KEYS: [&str; 5] = [
    "token",
    "authToken",
    "auth_token",
    "accessToken",
    "access",
];

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Moves a token stored under a legacy name to [`ACCESS_TOKEN_KEY`] and drops
/// the legacy entries. Returns the legacy key that was migrated, if any.
pub fn migrate_legacy_credential(
    storage: &dyn KeyValueStorage,
) -> Result<Option<&'static str>, StorageError> {
    let mut migrated = None;
    if non_empty(storage.get_item(ACCESS_TOKEN_KEY)?).is_none() {
        for key in LEGACY_TOKEN_KEYS {
            if let Some(token) = non_empty(storage.get_item(key)?) {
                storage.set_item(ACCESS_TOKEN_KEY, &token)?;
                migrated = Some(key);
                break;
            }
        }
    }
    for key in LEGACY_TOKEN_KEYS {
        storage.remove_item(key)?;
    }
    if let Some(key) = migrated {
        tracing::info!(legacy_key = key, "migrated stored credential to canonical key");
    }
    Ok(migrated)
}

/// Session entries in durable storage. One process-wide credential.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> Result<Self, StorageError> {
        migrate_legacy_credential(storage.as_ref())?;
        Ok(Self { storage })
    }

    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        Ok(non_empty(self.storage.get_item(ACCESS_TOKEN_KEY)?))
    }

    /// Credential for request decoration. Storage failures degrade to an
    /// anonymous request.
    pub fn credential(&self) -> Option<String> {
        match self.access_token() {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read stored credential");
                None
            }
        }
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        Ok(non_empty(self.storage.get_item(REFRESH_TOKEN_KEY)?))
    }

    pub fn is_authenticated(&self) -> Result<bool, StorageError> {
        Ok(self.storage.get_item(IS_AUTH_KEY)?.as_deref() == Some("true"))
    }

    /// Stored admin profile; a malformed blob reads as absent.
    pub fn admin_profile(&self) -> Result<Option<Value>, StorageError> {
        let raw = match self.storage.get_item(ADMIN_PROFILE_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        Ok(serde_json::from_str::<Value>(&raw)
            .ok()
            .filter(|profile| !profile.is_null()))
    }

    pub fn persist(&self, session: &AdminSession) -> Result<(), StorageError> {
        self.storage.set_item(ACCESS_TOKEN_KEY, &session.access_token)?;
        match &session.refresh_token {
            Some(refresh) => self.storage.set_item(REFRESH_TOKEN_KEY, refresh)?,
            None => self.storage.remove_item(REFRESH_TOKEN_KEY)?,
        }
        match &session.admin {
            Some(profile) => self
                .storage
                .set_item(ADMIN_PROFILE_KEY, &profile.to_string())?,
            None => self.storage.remove_item(ADMIN_PROFILE_KEY)?,
        }
        self.storage.set_item(IS_AUTH_KEY, "true")
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        for key in [
            IS_AUTH_KEY,
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            ADMIN_PROFILE_KEY,
        ]
        .into_iter()
        .chain(LEGACY_TOKEN_KEYS)
        {
            self.storage.remove_item(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::storage::MemoryStorage;
    use serde_json::json;

    fn storage_with(pairs: &[(&str, &str)]) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        for (key, value) in pairs {
            storage.set_item(key, value).unwrap();
        }
        storage
    }

    #[test]
    fn migrates_first_legacy_token_and_drops_the_rest() {
        let storage = storage_with(&[("authToken", "legacy-a"), ("access", "legacy-b")]);

        let migrated = migrate_legacy_credential(storage.as_ref()).unwrap();
        assert_eq!(migrated, Some("authToken"));
        assert_eq!(
            storage.get_item(ACCESS_TOKEN_KEY).unwrap().as_deref(),
            Some("legacy-a")
        );
        for key in LEGACY_TOKEN_KEYS {
            assert_eq!(storage.get_item(key).unwrap(), None);
        }
    }

    #[test]
    fn canonical_token_wins_over_legacy_entries() {
        let storage = storage_with(&[(ACCESS_TOKEN_KEY, "current"), ("token", "stale")]);

        let session = SessionStore::open(storage.clone()).unwrap();
        assert_eq!(session.credential().as_deref(), Some("current"));
        assert_eq!(storage.get_item("token").unwrap(), None);
    }

    #[test]
    fn blank_token_reads_as_absent() {
        let session = SessionStore::open(storage_with(&[(ACCESS_TOKEN_KEY, " ")])).unwrap();
        assert_eq!(session.credential(), None);
    }

    #[test]
    fn persist_and_clear_round_trip() {
        let storage = storage_with(&[]);
        let session = SessionStore::open(storage.clone()).unwrap();
        session
            .persist(&AdminSession {
                access_token: "tok".into(),
                refresh_token: Some("ref".into()),
                admin: Some(json!({ "id": 7, "email": "root@example.com" })),
            })
            .unwrap();

        assert!(session.is_authenticated().unwrap());
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("ref"));
        assert_eq!(
            session.admin_profile().unwrap(),
            Some(json!({ "id": 7, "email": "root@example.com" }))
        );

        session.clear().unwrap();
        assert!(!session.is_authenticated().unwrap());
        assert_eq!(session.credential(), None);
        assert_eq!(session.admin_profile().unwrap(), None);
    }

    #[test]
    fn malformed_profile_reads_as_absent() {
        let session =
            SessionStore::open(storage_with(&[(ADMIN_PROFILE_KEY, "{broken")])).unwrap();
        assert_eq!(session.admin_profile().unwrap(), None);
    }
}

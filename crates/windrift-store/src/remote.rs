//! `RemoteStore` (spec §4.3): the contract the sync engine calls instead
//! of speaking HTTP directly. Grounded on the teacher's `network.rs`
//! posture of keeping transport concerns behind a narrow async surface;
//! the in-memory double here plays the role the teacher's tests give an
//! injected storage backend.

use std::collections::HashMap;
use std::sync::Mutex;

use windrift_core::{EncryptedPayload, KeyData, SessionId, SyncManifest};

use crate::error::RemoteStoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileInfo {
    pub name: String,
    pub size: u64,
    pub modified_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageInfo {
    pub session_count: u32,
    pub total_size: u64,
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upload_manifest(&self, access_token: &str, manifest: &SyncManifest) -> Result<(), RemoteStoreError>;
    async fn download_manifest(&self, access_token: &str) -> Result<Option<SyncManifest>, RemoteStoreError>;
    async fn upload_key_data(&self, access_token: &str, key_data: &KeyData) -> Result<(), RemoteStoreError>;
    async fn download_key_data(&self, access_token: &str) -> Result<Option<KeyData>, RemoteStoreError>;
    async fn upload_session(
        &self,
        access_token: &str,
        session_id: &SessionId,
        payload: &EncryptedPayload,
    ) -> Result<(), RemoteStoreError>;
    async fn download_session(
        &self,
        access_token: &str,
        session_id: &SessionId,
    ) -> Result<Option<EncryptedPayload>, RemoteStoreError>;
    /// Idempotent: deleting an absent session is not an error.
    async fn delete_session(&self, access_token: &str, session_id: &SessionId) -> Result<(), RemoteStoreError>;
    async fn list_session_files(&self, access_token: &str) -> Result<Vec<RemoteFileInfo>, RemoteStoreError>;
    async fn get_storage_info(&self, access_token: &str) -> Result<StorageInfo, RemoteStoreError>;
    async fn clear_all_data(&self, access_token: &str) -> Result<(), RemoteStoreError>;
}

#[cfg(target_arch = "wasm32")]
#[async_trait::async_trait(?Send)]
pub trait RemoteStore {
    async fn upload_manifest(&self, access_token: &str, manifest: &SyncManifest) -> Result<(), RemoteStoreError>;
    async fn download_manifest(&self, access_token: &str) -> Result<Option<SyncManifest>, RemoteStoreError>;
    async fn upload_key_data(&self, access_token: &str, key_data: &KeyData) -> Result<(), RemoteStoreError>;
    async fn download_key_data(&self, access_token: &str) -> Result<Option<KeyData>, RemoteStoreError>;
    async fn upload_session(
        &self,
        access_token: &str,
        session_id: &SessionId,
        payload: &EncryptedPayload,
    ) -> Result<(), RemoteStoreError>;
    async fn download_session(
        &self,
        access_token: &str,
        session_id: &SessionId,
    ) -> Result<Option<EncryptedPayload>, RemoteStoreError>;
    async fn delete_session(&self, access_token: &str, session_id: &SessionId) -> Result<(), RemoteStoreError>;
    async fn list_session_files(&self, access_token: &str) -> Result<Vec<RemoteFileInfo>, RemoteStoreError>;
    async fn get_storage_info(&self, access_token: &str) -> Result<StorageInfo, RemoteStoreError>;
    async fn clear_all_data(&self, access_token: &str) -> Result<(), RemoteStoreError>;
}

/// An in-memory double for tests. Not `#[cfg(test)]`-gated: other
/// crates' tests (and doctests) construct it too, the way the teacher
/// exercises `network.rs` against an injected in-memory backend.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    manifest: Mutex<Option<SyncManifest>>,
    key_data: Mutex<Option<KeyData>>,
    sessions: Mutex<HashMap<SessionId, EncryptedPayload>>,
    /// When set, every call fails with this error instead of touching state.
    pub fail_with: Mutex<Option<RemoteStoreError>>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_failure(&self) -> Result<(), RemoteStoreError> {
        match self.fail_with.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait::async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn upload_manifest(&self, _access_token: &str, manifest: &SyncManifest) -> Result<(), RemoteStoreError> {
        self.check_failure()?;
        *self.manifest.lock().unwrap() = Some(manifest.clone());
        Ok(())
    }

    async fn download_manifest(&self, _access_token: &str) -> Result<Option<SyncManifest>, RemoteStoreError> {
        self.check_failure()?;
        Ok(self.manifest.lock().unwrap().clone())
    }

    async fn upload_key_data(&self, _access_token: &str, key_data: &KeyData) -> Result<(), RemoteStoreError> {
        self.check_failure()?;
        *self.key_data.lock().unwrap() = Some(key_data.clone());
        Ok(())
    }

    async fn download_key_data(&self, _access_token: &str) -> Result<Option<KeyData>, RemoteStoreError> {
        self.check_failure()?;
        Ok(self.key_data.lock().unwrap().clone())
    }

    async fn upload_session(
        &self,
        _access_token: &str,
        session_id: &SessionId,
        payload: &EncryptedPayload,
    ) -> Result<(), RemoteStoreError> {
        self.check_failure()?;
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.clone(), payload.clone());
        Ok(())
    }

    async fn download_session(
        &self,
        _access_token: &str,
        session_id: &SessionId,
    ) -> Result<Option<EncryptedPayload>, RemoteStoreError> {
        self.check_failure()?;
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn delete_session(&self, _access_token: &str, session_id: &SessionId) -> Result<(), RemoteStoreError> {
        self.check_failure()?;
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn list_session_files(&self, _access_token: &str) -> Result<Vec<RemoteFileInfo>, RemoteStoreError> {
        self.check_failure()?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .map(|(id, payload)| RemoteFileInfo {
                name: format!("sessions/{id}.enc"),
                size: (payload.iv.len() + payload.ct.len()) as u64,
                modified_time: 0,
            })
            .collect())
    }

    async fn get_storage_info(&self, _access_token: &str) -> Result<StorageInfo, RemoteStoreError> {
        self.check_failure()?;
        let sessions = self.sessions.lock().unwrap();
        Ok(StorageInfo {
            session_count: sessions.len() as u32,
            total_size: sessions.values().map(|p| (p.iv.len() + p.ct.len()) as u64).sum(),
        })
    }

    async fn clear_all_data(&self, _access_token: &str) -> Result<(), RemoteStoreError> {
        self.check_failure()?;
        *self.manifest.lock().unwrap() = None;
        *self.key_data.lock().unwrap() = None;
        self.sessions.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windrift_core::DeviceId;

    #[tokio::test]
    async fn download_session_absent_is_none_not_error() {
        let remote = InMemoryRemoteStore::new();
        let result = remote.download_session("token", &SessionId::from("s1")).await;
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn delete_session_is_idempotent() {
        let remote = InMemoryRemoteStore::new();
        assert!(remote.delete_session("token", &SessionId::from("absent")).await.is_ok());
        assert!(remote.delete_session("token", &SessionId::from("absent")).await.is_ok());
    }

    #[tokio::test]
    async fn configured_failure_surfaces_on_every_call() {
        let remote = InMemoryRemoteStore::new();
        *remote.fail_with.lock().unwrap() = Some(RemoteStoreError::AuthExpired);
        let manifest = SyncManifest::empty(DeviceId::from("d1"));
        let result = remote.upload_manifest("token", &manifest).await;
        assert_eq!(result, Err(RemoteStoreError::AuthExpired));
    }

    #[tokio::test]
    async fn clear_all_data_wipes_everything() {
        let remote = InMemoryRemoteStore::new();
        let manifest = SyncManifest::empty(DeviceId::from("d1"));
        remote.upload_manifest("token", &manifest).await.unwrap();
        remote.clear_all_data("token").await.unwrap();
        assert_eq!(remote.download_manifest("token").await, Ok(None));
    }
}

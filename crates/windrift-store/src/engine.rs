//! `SyncEngine` (spec §4.4): the orchestrator. Owns the ephemeral
//! unlocked key, talks to both `RemoteStore` and the crypto primitives,
//! and drives the reconciliation sequence in `perform_full_sync`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::lock::Mutex;
use serde::{Deserialize, Serialize};

use windrift_core::{
    DeviceId, EncryptedPayload, KeyData, QueueItemKind, Session, SessionId, SyncManifest,
    SyncSessionMeta, crypto,
};

use crate::error::EngineError;
use crate::queue::QueueStore;
use crate::remote::RemoteStore;
use crate::session_store::SessionLocalStore;
use crate::storage::KeyValueStore;
use crate::sync_state::SyncStateStore;

const KEY_DATA_KEY: &str = "key_data";
const CREDENTIALS_KEY: &str = "credentials";
const PREVIOUSLY_SYNCED_KEY: &str = "previously_synced";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unconfigured,
    Locked,
    Unlocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionEnvelope {
    session: Session,
    device_id: DeviceId,
    timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub success: bool,
    pub uploaded: u32,
    pub downloaded: u32,
    pub deleted: u32,
    pub errors: Vec<String>,
}

/// Refreshes the OAuth access token used against `RemoteStore`. The
/// actual OAuth flow is out of scope (spec §1); only this contract
/// matters to the engine.
#[cfg(not(target_arch = "wasm32"))]
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<String, EngineError>;
}

#[cfg(target_arch = "wasm32")]
#[async_trait::async_trait(?Send)]
pub trait TokenRefresher {
    async fn refresh(&self) -> Result<String, EngineError>;
}

pub struct StaticTokenRefresher(pub String);

#[cfg(not(target_arch = "wasm32"))]
#[async_trait::async_trait]
impl TokenRefresher for StaticTokenRefresher {
    async fn refresh(&self) -> Result<String, EngineError> {
        Ok(self.0.clone())
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait::async_trait(?Send)]
impl TokenRefresher for StaticTokenRefresher {
    async fn refresh(&self) -> Result<String, EngineError> {
        Ok(self.0.clone())
    }
}

pub struct SyncEngine {
    meta_store: Arc<dyn KeyValueStore>,
    local: SessionLocalStore,
    queue: QueueStore,
    sync_state: SyncStateStore,
    remote: Arc<dyn RemoteStore>,
    token_refresher: Arc<dyn TokenRefresher>,
    device_id: DeviceId,
    unlocked_key: Mutex<Option<crypto::Key>>,
    unlocked_token: Mutex<Option<String>>,
    syncing: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        token_refresher: Arc<dyn TokenRefresher>,
        device_id: DeviceId,
    ) -> Self {
        Self {
            local: SessionLocalStore::new(store.clone()),
            queue: QueueStore::new(store.clone()),
            sync_state: SyncStateStore::new(store.clone()),
            meta_store: store,
            remote,
            token_refresher,
            device_id,
            unlocked_key: Mutex::new(None),
            unlocked_token: Mutex::new(None),
            syncing: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    pub fn local(&self) -> &SessionLocalStore {
        &self.local
    }

    pub fn sync_state(&self) -> &SyncStateStore {
        &self.sync_state
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> EngineState {
        if self.unlocked_key.lock().await.is_some() {
            return EngineState::Unlocked;
        }
        match self.load_key_data().await {
            Some(_) => EngineState::Locked,
            None => EngineState::Unconfigured,
        }
    }

    async fn load_key_data(&self) -> Option<KeyData> {
        self.meta_store
            .load(KEY_DATA_KEY)
            .await
            .and_then(|b| serde_json::from_slice(&b).ok())
    }

    async fn put_key_data(&self, key_data: &KeyData) {
        let bytes = serde_json::to_vec(key_data).expect("KeyData always serializes");
        self.meta_store.put(KEY_DATA_KEY, bytes).await;
    }

    async fn load_credentials(&self) -> Option<EncryptedPayload> {
        self.meta_store
            .load(CREDENTIALS_KEY)
            .await
            .and_then(|b| serde_json::from_slice(&b).ok())
    }

    async fn put_credentials(&self, payload: &EncryptedPayload) {
        let bytes = serde_json::to_vec(payload).expect("EncryptedPayload always serializes");
        self.meta_store.put(CREDENTIALS_KEY, bytes).await;
    }

    async fn load_previously_synced(&self) -> Vec<SessionId> {
        match self.meta_store.load(PREVIOUSLY_SYNCED_KEY).await {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn mark_previously_synced(&self, id: &SessionId) {
        let mut ids = self.load_previously_synced().await;
        if !ids.contains(id) {
            ids.push(id.clone());
            let bytes = serde_json::to_vec(&ids).expect("ids always serialize");
            self.meta_store.put(PREVIOUSLY_SYNCED_KEY, bytes).await;
        }
    }

    async fn access_token(&self) -> Result<String, EngineError> {
        if let Some(token) = self.unlocked_token.lock().await.clone() {
            return Ok(token);
        }
        self.token_refresher.refresh().await
    }

    /// Unconfigured → Unlocked. Persists `KeyData` (never the recovery
    /// key) and the encrypted `raw_tokens`; returns the recovery key
    /// exactly once (spec §4.4).
    pub async fn setup_encryption(&self, password: &str, raw_tokens: &str) -> Result<String, EngineError> {
        let setup = crypto::setup_encryption(password)?;
        self.put_key_data(&setup.key_data).await;
        let credentials = crypto::encrypt(raw_tokens, &setup.key)?;
        self.put_credentials(&credentials).await;

        *self.unlocked_key.lock().await = Some(setup.key);
        *self.unlocked_token.lock().await = Some(raw_tokens.to_string());
        Ok(setup.recovery_key)
    }

    /// Unconfigured → Locked: fetches `KeyData` a different device already
    /// uploaded, so this device can offer its own unlock prompt instead of
    /// running `setup_encryption` again. A no-op if KeyData already exists
    /// locally.
    pub async fn bootstrap_from_remote(&self) -> Result<bool, EngineError> {
        if self.load_key_data().await.is_some() {
            return Ok(true);
        }
        let token = self.token_refresher.refresh().await?;
        match self.remote.download_key_data(&token).await? {
            Some(key_data) => {
                self.put_key_data(&key_data).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Locked → Unlocked on success. See spec §4.4 steps 1-5.
    pub async fn unlock(&self, password: &str) -> bool {
        let Some(key_data) = self.load_key_data().await else {
            return false;
        };
        let Ok(candidate) = crypto::derive_key(password, &key_data.salt) else {
            return false;
        };

        let verified = if let Some(credentials) = self.load_credentials().await {
            match crypto::decrypt(&credentials, &candidate) {
                Ok(tokens) => {
                    *self.unlocked_token.lock().await = Some(tokens);
                    true
                }
                Err(_) => false,
            }
        } else {
            match crypto::verification_hash(&candidate, &key_data.salt) {
                Ok(hash) => hash == key_data.verification_hash,
                Err(_) => false,
            }
        };

        if !verified {
            return false;
        }

        if let Ok(deterministic_hash) = crypto::verification_hash(&candidate, &key_data.salt)
            && deterministic_hash != key_data.verification_hash
        {
            let mut migrated = key_data;
            migrated.verification_hash = deterministic_hash;
            self.put_key_data(&migrated).await;
        }

        *self.unlocked_key.lock().await = Some(candidate);
        true
    }

    /// Unlocked → Locked. Drops the in-memory key and token.
    pub async fn lock(&self) {
        *self.unlocked_key.lock().await = None;
        *self.unlocked_token.lock().await = None;
    }

    /// Any state → Unconfigured. Drops all key material.
    pub async fn clear(&self) {
        self.lock().await;
        self.meta_store.delete(KEY_DATA_KEY).await;
        self.meta_store.delete(CREDENTIALS_KEY).await;
        self.meta_store.delete(PREVIOUSLY_SYNCED_KEY).await;
    }

    fn session_meta(session: &Session) -> SyncSessionMeta {
        SyncSessionMeta {
            id: session.id.clone(),
            name: session.name.clone(),
            updated_at: session.updated_at,
            tab_count: session.windows.iter().map(|w| w.tabs.len() as u32).sum(),
            checksum: crypto::compute_checksum(&serde_json::to_string(session).unwrap_or_default()),
        }
    }

    async fn upload_session_and_update_manifest(
        &self,
        session: &Session,
        key: &crypto::Key,
        token: &str,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let envelope = SessionEnvelope {
            session: session.clone(),
            device_id: self.device_id.clone(),
            timestamp: now_ms,
        };
        let payload = crypto::encrypt_object(&envelope, key)?;
        self.remote.upload_session(token, &session.id, &payload).await?;

        let mut manifest = self
            .remote
            .download_manifest(token)
            .await?
            .unwrap_or_else(|| SyncManifest::empty(self.device_id.clone()));
        manifest.upsert_session(Self::session_meta(session));
        manifest.last_sync = now_ms;
        manifest.device_id = self.device_id.clone();
        self.remote.upload_manifest(token, &manifest).await?;
        self.mark_previously_synced(&session.id).await;
        Ok(())
    }

    async fn delete_session_and_update_manifest(
        &self,
        session_id: &SessionId,
        token: &str,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        self.remote.delete_session(token, session_id).await?;
        let mut manifest = self
            .remote
            .download_manifest(token)
            .await?
            .unwrap_or_else(|| SyncManifest::empty(self.device_id.clone()));
        manifest.tombstone_session(session_id.clone(), now_ms);
        manifest.last_sync = now_ms;
        self.remote.upload_manifest(token, &manifest).await?;
        Ok(())
    }

    /// spec §4.4 `push_session`. Enqueues rather than failing while
    /// locked or on a remote error.
    pub async fn push_session(&self, session_id: &SessionId, now_ms: i64) {
        let key = self.unlocked_key.lock().await.clone();
        let Some(key) = key else {
            self.queue.enqueue(QueueItemKind::Upload, session_id.clone(), now_ms).await;
            return;
        };
        let Some(session) = self.local.get(session_id).await else {
            return;
        };
        let Ok(token) = self.access_token().await else {
            self.queue.enqueue(QueueItemKind::Upload, session_id.clone(), now_ms).await;
            return;
        };
        if self
            .upload_session_and_update_manifest(&session, &key, &token, now_ms)
            .await
            .is_err()
        {
            self.queue.enqueue(QueueItemKind::Upload, session_id.clone(), now_ms).await;
        }
    }

    /// spec §4.4 `delete_session_from_cloud`.
    pub async fn delete_session_from_cloud(&self, session_id: &SessionId, now_ms: i64) {
        let is_unlocked = self.unlocked_key.lock().await.is_some();
        if !is_unlocked {
            self.queue.enqueue(QueueItemKind::Delete, session_id.clone(), now_ms).await;
            return;
        }
        let Ok(token) = self.access_token().await else {
            self.queue.enqueue(QueueItemKind::Delete, session_id.clone(), now_ms).await;
            return;
        };
        if self
            .delete_session_and_update_manifest(session_id, &token, now_ms)
            .await
            .is_err()
        {
            self.queue.enqueue(QueueItemKind::Delete, session_id.clone(), now_ms).await;
        }
    }

    /// spec §4.5 `process_queue`. Stops (without consuming items) if the
    /// engine is locked.
    pub async fn process_queue(&self, now_ms: i64) {
        loop {
            let Some(item) = self.queue.get_next(now_ms).await else {
                break;
            };
            let key = self.unlocked_key.lock().await.clone();
            let Some(key) = key else {
                break;
            };
            let Ok(token) = self.access_token().await else {
                break;
            };

            let result: Result<(), EngineError> = match item.kind {
                QueueItemKind::Upload => match self.local.get(&item.session_id).await {
                    Some(session) => {
                        self.upload_session_and_update_manifest(&session, &key, &token, now_ms)
                            .await
                    }
                    None => Ok(()),
                },
                QueueItemKind::Delete => {
                    self.delete_session_and_update_manifest(&item.session_id, &token, now_ms)
                        .await
                }
            };

            match result {
                Ok(()) => self.queue.mark_complete(&item.id).await,
                Err(e) => {
                    self.queue.mark_failed(&item.id, e.to_string(), now_ms).await;
                }
            }
        }
        self.sync_state.set_pending_count(self.queue.len().await as u32).await;
    }

    /// spec §4.4 `perform_full_sync`. Reentrancy-guarded: a concurrent
    /// call returns immediately with `success=false`.
    pub async fn perform_full_sync(&self, now_ms: i64) -> SyncReport {
        if self.syncing.swap(true, Ordering::SeqCst) {
            return SyncReport {
                success: false,
                errors: vec!["already syncing".to_string()],
                ..Default::default()
            };
        }
        let report = self.perform_full_sync_inner(now_ms).await;
        self.syncing.store(false, Ordering::SeqCst);
        report
    }

    async fn perform_full_sync_inner(&self, now_ms: i64) -> SyncReport {
        self.sync_state.set_syncing(true, Some("starting".to_string())).await;

        let key = self.unlocked_key.lock().await.clone();
        let Some(key) = key else {
            self.sync_state.record_failure("not unlocked").await;
            return SyncReport {
                success: false,
                errors: vec!["not unlocked".to_string()],
                ..Default::default()
            };
        };

        let token = match self.token_refresher.refresh().await {
            Ok(t) => t,
            Err(e) => {
                self.sync_state.record_failure(e.to_string()).await;
                return SyncReport {
                    success: false,
                    errors: vec![e.to_string()],
                    ..Default::default()
                };
            }
        };

        if let Some(key_data) = self.load_key_data().await {
            // Best-effort: keeps a second device able to `bootstrap_from_remote`
            // without re-running setup_encryption. Not part of the reconciliation
            // the rest of this sync reports on.
            let _ = self.remote.upload_key_data(&token, &key_data).await;
        }

        self.sync_state.set_current_operation("downloading manifest").await;
        let mut manifest = match self.remote.download_manifest(&token).await {
            Ok(Some(m)) => m,
            Ok(None) => SyncManifest::empty(self.device_id.clone()),
            Err(e) => {
                self.sync_state.record_failure(e.to_string()).await;
                return SyncReport {
                    success: false,
                    errors: vec![e.to_string()],
                    ..Default::default()
                };
            }
        };

        let mut report = SyncReport::default();
        let local_sessions = self.local.all().await;
        let local_map: HashMap<SessionId, Session> =
            local_sessions.into_iter().map(|s| (s.id.clone(), s)).collect();

        self.sync_state.set_current_operation("uploading sessions").await;
        for session in local_map.values() {
            if manifest.tombstone(&session.id).is_some() {
                continue;
            }
            let needs_upload = match manifest.session_meta(&session.id) {
                None => true,
                Some(meta) => session.updated_at > meta.updated_at,
            };
            if !needs_upload {
                continue;
            }
            let envelope = SessionEnvelope {
                session: session.clone(),
                device_id: self.device_id.clone(),
                timestamp: now_ms,
            };
            match crypto::encrypt_object(&envelope, &key) {
                Ok(payload) => match self.remote.upload_session(&token, &session.id, &payload).await {
                    Ok(()) => {
                        manifest.upsert_session(Self::session_meta(session));
                        report.uploaded += 1;
                        self.mark_previously_synced(&session.id).await;
                    }
                    Err(e) => report.errors.push(format!("upload {}: {e}", session.id)),
                },
                Err(e) => report.errors.push(format!("encrypt {}: {e}", session.id)),
            }
        }

        self.sync_state.set_current_operation("downloading sessions").await;
        let remote_sessions = manifest.sessions.clone();
        for meta in &remote_sessions {
            if let Some(local_session) = local_map.get(&meta.id)
                && local_session.updated_at >= meta.updated_at
            {
                continue;
            }
            match self.remote.download_session(&token, &meta.id).await {
                Ok(Some(payload)) => match crypto::decrypt_object::<SessionEnvelope>(&payload, &key) {
                    Ok(envelope) => {
                        self.local.put(&envelope.session).await;
                        self.mark_previously_synced(&meta.id).await;
                        report.downloaded += 1;
                    }
                    Err(e) => report.errors.push(format!("decrypt {}: {e}", meta.id)),
                },
                Ok(None) => report.errors.push(format!("missing payload for {}", meta.id)),
                Err(e) => report.errors.push(format!("download {}: {e}", meta.id)),
            }
        }

        for tombstone in manifest.tombstones.clone() {
            if let Some(local_session) = local_map.get(&tombstone.id)
                && local_session.updated_at <= tombstone.deleted_at
            {
                self.local.delete(&tombstone.id).await;
                report.deleted += 1;
            }
        }

        self.sync_state.set_current_operation("propagating deletions").await;
        let previously_synced = self.load_previously_synced().await;
        let current_local_ids: HashSet<SessionId> =
            self.local.all().await.into_iter().map(|s| s.id).collect();
        for id in &previously_synced {
            if current_local_ids.contains(id) {
                continue;
            }
            match self.remote.delete_session(&token, id).await {
                Ok(()) => {
                    manifest.tombstone_session(id.clone(), now_ms);
                    report.deleted += 1;
                }
                Err(e) => report.errors.push(format!("delete propagation {id}: {e}")),
            }
        }

        manifest.prune_expired_tombstones(now_ms);
        manifest.last_sync = now_ms;
        manifest.device_id = self.device_id.clone();
        if let Err(e) = self.remote.upload_manifest(&token, &manifest).await {
            report.errors.push(format!("upload manifest: {e}"));
        }

        report.success = report.errors.is_empty();
        if report.success {
            self.sync_state.record_success(now_ms).await;
        } else {
            self.sync_state.record_failure(report.errors.join("; ")).await;
        }
        self.sync_state.set_pending_count(self.queue.len().await as u32).await;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemoteStore;
    use crate::storage::InMemoryStore;
    use windrift_core::SessionProvenance;

    fn engine(remote: Arc<InMemoryRemoteStore>) -> SyncEngine {
        SyncEngine::new(
            Arc::new(InMemoryStore::new()),
            remote,
            Arc::new(StaticTokenRefresher("token".to_string())),
            DeviceId::from("device-a"),
        )
    }

    fn session(id: &str, updated_at: i64, tab_count: usize) -> Session {
        use windrift_core::{Tab, TabGroup, Window, WindowState};
        Session {
            id: SessionId::from(id),
            name: format!("Session {id}"),
            created_at: updated_at,
            updated_at,
            windows: vec![Window {
                id: "w1".to_string(),
                tabs: (0..tab_count)
                    .map(|i| Tab {
                        id: format!("t{i}"),
                        url: format!("https://example.com/{i}"),
                        title: "Example".to_string(),
                        index: i as u32,
                        pinned: false,
                        favicon_url: None,
                        discarded: None,
                        group_id: None,
                    })
                    .collect(),
                groups: Vec::<TabGroup>::new(),
                focused: None,
                state: Some(WindowState::Normal),
            }],
            provenance: SessionProvenance::Manual,
        }
    }

    #[tokio::test]
    async fn setup_then_unlock_round_trips() {
        let engine = engine(Arc::new(InMemoryRemoteStore::new()));
        assert_eq!(engine.state().await, EngineState::Unconfigured);
        engine.setup_encryption("Password1", "raw-oauth-tokens").await.unwrap();
        assert_eq!(engine.state().await, EngineState::Unlocked);

        engine.lock().await;
        assert_eq!(engine.state().await, EngineState::Locked);
        assert!(engine.unlock("Password1").await);
        assert_eq!(engine.state().await, EngineState::Unlocked);
    }

    #[tokio::test]
    async fn second_device_bootstraps_key_data_from_remote_and_unlocks() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let device_a = engine(remote.clone());
        device_a.setup_encryption("Password1", "tokens").await.unwrap();
        device_a.perform_full_sync(100).await;

        let device_b = SyncEngine::new(
            Arc::new(InMemoryStore::new()),
            remote,
            Arc::new(StaticTokenRefresher("token".to_string())),
            DeviceId::from("device-b"),
        );
        assert_eq!(device_b.state().await, EngineState::Unconfigured);
        assert!(device_b.bootstrap_from_remote().await.unwrap());
        assert_eq!(device_b.state().await, EngineState::Locked);
        assert!(device_b.unlock("Password1").await);
    }

    #[tokio::test]
    async fn unlock_rejects_wrong_password() {
        let engine = engine(Arc::new(InMemoryRemoteStore::new()));
        engine.setup_encryption("Password1", "tokens").await.unwrap();
        engine.lock().await;
        assert!(!engine.unlock("WrongPassword").await);
        assert_eq!(engine.state().await, EngineState::Locked);
    }

    #[tokio::test]
    async fn push_session_while_locked_enqueues_and_unlock_then_process_queue_drains_it() {
        let engine = engine(Arc::new(InMemoryRemoteStore::new()));
        engine.setup_encryption("Password1", "tokens").await.unwrap();
        engine.local().put(&session("x", 1, 1)).await;
        engine.lock().await;

        engine.push_session(&SessionId::from("x"), 10).await;
        assert_eq!(engine.queue().len().await, 1);

        assert!(engine.unlock("Password1").await);
        engine.process_queue(20).await;
        assert!(engine.queue().is_empty().await);
    }

    #[tokio::test]
    async fn setup_and_first_sync_uploads_all_local_sessions() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let engine = engine(remote.clone());
        engine.setup_encryption("Password1", "tokens").await.unwrap();

        engine.local().put(&session("s1", 1, 1)).await;
        engine.local().put(&session("s2", 2, 1)).await;
        engine.local().put(&session("s3", 3, 1)).await;

        let report = engine.perform_full_sync(100).await;
        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(report.uploaded, 3);

        let manifest = remote.download_manifest("token").await.unwrap().unwrap();
        assert_eq!(manifest.sessions.len(), 3);
    }

    #[tokio::test]
    async fn second_device_downloads_all_sessions() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let device_a = engine(remote.clone());
        device_a.setup_encryption("Password1", "tokens").await.unwrap();
        device_a.local().put(&session("s1", 1, 2)).await;
        device_a.local().put(&session("s2", 2, 3)).await;
        device_a.perform_full_sync(100).await;

        let device_b = SyncEngine::new(
            Arc::new(InMemoryStore::new()),
            remote,
            Arc::new(StaticTokenRefresher("token".to_string())),
            DeviceId::from("device-b"),
        );
        assert!(device_b.unlock("Password1").await);
        let report = device_b.perform_full_sync(200).await;
        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(report.downloaded, 2);

        let s1 = device_b.local().get(&SessionId::from("s1")).await.unwrap();
        assert_eq!(s1.windows[0].tabs.len(), 2);
    }

    #[tokio::test]
    async fn conflict_resolution_keeps_newer_local_copy_and_uploads_it() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let engine = engine(remote.clone());
        engine.setup_encryption("Password1", "tokens").await.unwrap();
        engine.local().put(&session("s", 5, 1)).await;
        engine.perform_full_sync(100).await;

        // Simulate a stale remote write (updatedAt=5 has already propagated);
        // now the local copy is newer.
        let mut newer = session("s", 10, 1);
        newer.name = "Renamed locally".to_string();
        engine.local().put(&newer).await;

        let report = engine.perform_full_sync(200).await;
        assert!(report.success);
        assert_eq!(report.uploaded, 1);

        let manifest = remote.download_manifest("token").await.unwrap().unwrap();
        assert_eq!(manifest.session_meta(&SessionId::from("s")).unwrap().updated_at, 10);
    }

    #[tokio::test]
    async fn delete_propagates_to_a_second_device() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let device_a = engine(remote.clone());
        device_a.setup_encryption("Password1", "tokens").await.unwrap();
        device_a.local().put(&session("s", 1, 1)).await;
        device_a.perform_full_sync(100).await;

        let device_b = SyncEngine::new(
            Arc::new(InMemoryStore::new()),
            remote.clone(),
            Arc::new(StaticTokenRefresher("token".to_string())),
            DeviceId::from("device-b"),
        );
        device_b.unlock("Password1").await;
        device_b.perform_full_sync(150).await;
        assert!(device_b.local().get(&SessionId::from("s")).await.is_some());

        device_a.local().delete(&SessionId::from("s")).await;
        let report_a = device_a.perform_full_sync(200).await;
        assert!(report_a.success);
        assert_eq!(report_a.deleted, 1);

        let report_b = device_b.perform_full_sync(250).await;
        assert!(report_b.success);
        assert!(device_b.local().get(&SessionId::from("s")).await.is_none());
    }

    #[tokio::test]
    async fn concurrent_full_sync_is_reentrancy_guarded() {
        let engine = Arc::new(engine(Arc::new(InMemoryRemoteStore::new())));
        engine.setup_encryption("Password1", "tokens").await.unwrap();

        let a = engine.clone();
        let b = engine.clone();
        let (first, second) = futures::join!(
            async move { a.perform_full_sync(100).await },
            async move { b.perform_full_sync(100).await },
        );
        let successes = [&first, &second].iter().filter(|r| r.success).count();
        let guarded = [&first, &second]
            .iter()
            .filter(|r| r.errors.contains(&"already syncing".to_string()))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(guarded, 1);
    }
}

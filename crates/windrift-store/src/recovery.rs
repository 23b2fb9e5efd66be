//! `RecoverySnapshotService` (spec §4.6): crash recovery for the last-seen
//! window layout, independent of `SyncEngine` and the cloud entirely.
//! Capture and restore both delegate the one piece that is genuinely
//! out of scope here — reading and writing real browser windows — to
//! injected collaborator traits, the same way `engine.rs` treats token
//! refresh as a collaborator it calls through an interface.

use std::sync::Arc;

use futures::lock::Mutex;

use windrift_core::{RecoverySnapshot, Tab, TabGroup, Window, is_protected_url};

use crate::clock::Debouncer;
use crate::codec::ChunkedBlobCodec;
use crate::error::EngineError;
use crate::storage::KeyValueStore;

pub const DEFAULT_DEBOUNCE_MS: i64 = 3_000;
const MAX_LOCAL_SNAPSHOTS: usize = 5;
const ROTATION_KEY: &str = "recovery:rotation";
const REMOTE_SLOT_KEY_SPACE: &str = "recovery:latest";

/// Reads the browser's current window/tab layout. The capture collaborator
/// that produces this data is out of scope (spec §1); only this contract
/// matters here.
#[cfg(not(target_arch = "wasm32"))]
#[async_trait::async_trait]
pub trait WindowSource: Send + Sync {
    async fn enumerate_normal_windows(&self) -> Vec<Window>;
}

#[cfg(target_arch = "wasm32")]
#[async_trait::async_trait(?Send)]
pub trait WindowSource {
    async fn enumerate_normal_windows(&self) -> Vec<Window>;
}

/// Re-materializes a snapshot as real browser windows/tabs/groups. Also
/// out of scope as an implementation; only the contract matters.
#[cfg(not(target_arch = "wasm32"))]
#[async_trait::async_trait]
pub trait WindowRestorer: Send + Sync {
    async fn create_window(&self) -> Result<String, EngineError>;
    async fn create_tab(&self, window_id: &str, tab: &Tab) -> Result<(), EngineError>;
    async fn create_group(&self, window_id: &str, group: &TabGroup, tab_ids: &[String]) -> Result<(), EngineError>;
}

#[cfg(target_arch = "wasm32")]
#[async_trait::async_trait(?Send)]
pub trait WindowRestorer {
    async fn create_window(&self) -> Result<String, EngineError>;
    async fn create_tab(&self, window_id: &str, tab: &Tab) -> Result<(), EngineError>;
    async fn create_group(&self, window_id: &str, group: &TabGroup, tab_ids: &[String]) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub windows_created: u32,
    pub tabs_created: u32,
    pub groups_created: u32,
}

pub struct RecoverySnapshotService {
    local_store: Arc<dyn KeyValueStore>,
    remote_slot: ChunkedBlobCodec,
    debouncer: Mutex<Debouncer>,
}

impl RecoverySnapshotService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_debounce_ms(store, DEFAULT_DEBOUNCE_MS)
    }

    pub fn with_debounce_ms(store: Arc<dyn KeyValueStore>, debounce_ms: i64) -> Self {
        Self {
            remote_slot: ChunkedBlobCodec::new(store.clone()),
            local_store: store,
            debouncer: Mutex::new(Debouncer::new(debounce_ms)),
        }
    }

    /// Whether a capture trigger at `now_ms` should fire immediately, per
    /// the debounce discipline in spec §4.6. Callers that get `false`
    /// should rely on their own timer and `should_flush` instead.
    pub async fn on_trigger(&self, now_ms: i64) -> bool {
        self.debouncer.lock().await.on_trigger(now_ms)
    }

    pub async fn should_flush(&self, now_ms: i64) -> bool {
        self.debouncer.lock().await.should_flush(now_ms)
    }

    async fn mark_captured(&self, now_ms: i64) {
        self.debouncer.lock().await.mark_fired(now_ms);
    }

    /// The capture procedure (spec §4.6 steps 1-6). Returns `None` if no
    /// tab survived the protected-URL filter across every window.
    pub async fn capture(&self, source: &dyn WindowSource, now_ms: i64) -> Option<RecoverySnapshot> {
        let mut windows = Vec::new();
        for mut window in source.enumerate_normal_windows().await {
            window.tabs.retain(|tab| !is_protected_url(&tab.url));
            if window.tabs.is_empty() {
                continue;
            }
            window.drop_unreferenced_groups();
            windows.push(window);
        }
        if windows.is_empty() {
            return None;
        }

        let snapshot = RecoverySnapshot::new(now_ms, windows);
        self.rotate_in_locally(&snapshot).await;
        self.overwrite_remote_slot(&snapshot).await;
        self.mark_captured(now_ms).await;
        Some(snapshot)
    }

    async fn load_rotation(&self) -> Vec<RecoverySnapshot> {
        match self.local_store.load(ROTATION_KEY).await {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn rotate_in_locally(&self, snapshot: &RecoverySnapshot) {
        let mut rotation = self.load_rotation().await;
        rotation.retain(|s| s.id != snapshot.id);
        rotation.insert(0, snapshot.clone());
        rotation.truncate(MAX_LOCAL_SNAPSHOTS);
        let bytes = serde_json::to_vec(&rotation).expect("RecoverySnapshot always serializes");
        self.local_store.put(ROTATION_KEY, bytes).await;
    }

    async fn overwrite_remote_slot(&self, snapshot: &RecoverySnapshot) {
        let result = self
            .remote_slot
            .save(REMOTE_SLOT_KEY_SPACE, snapshot, snapshot.stats.tab_count, snapshot.timestamp)
            .await;
        if let Err(e) = result {
            tracing::warn!(
                snapshot_id = %snapshot.id,
                error = %e,
                "recovery snapshot did not fit the remote backup slot; local rotation remains authoritative"
            );
        }
    }

    /// The 5 most recent snapshots, newest first.
    pub async fn list_local(&self) -> Vec<RecoverySnapshot> {
        self.load_rotation().await
    }

    pub async fn get(&self, id: &str) -> Option<RecoverySnapshot> {
        self.load_rotation().await.into_iter().find(|s| s.id == id)
    }

    pub async fn latest_remote_slot(&self) -> Option<RecoverySnapshot> {
        self.remote_slot.load(REMOTE_SLOT_KEY_SPACE).await
    }

    /// spec §4.6 `restore_from_snapshot`. Group-creation failure is
    /// tolerated: the window/tab counts are still reported.
    pub async fn restore_from_snapshot(&self, id: &str, restorer: &dyn WindowRestorer) -> Option<RestoreReport> {
        let snapshot = self.get(id).await?;
        let mut report = RestoreReport::default();

        for window in &snapshot.windows {
            if window.tabs.is_empty() {
                continue;
            }
            let Ok(window_id) = restorer.create_window().await else {
                continue;
            };
            report.windows_created += 1;

            for tab in &window.tabs {
                if restorer.create_tab(&window_id, tab).await.is_ok() {
                    report.tabs_created += 1;
                }
            }

            for group in &window.groups {
                let tab_ids: Vec<String> = window
                    .tabs
                    .iter()
                    .filter(|t| t.group_id.as_deref() == Some(group.id.as_str()))
                    .map(|t| t.id.clone())
                    .collect();
                if tab_ids.is_empty() {
                    continue;
                }
                if restorer.create_group(&window_id, group, &tab_ids).await.is_ok() {
                    report.groups_created += 1;
                }
            }
        }

        Some(report)
    }
}

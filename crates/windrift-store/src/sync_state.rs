//! `SyncStateStore` (spec §2, §7): the small persistent record a progress
//! UI reads — whether a sync is running, when the last one succeeded,
//! the last error, how many queue items are pending, and a
//! human-readable label for the current stage.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub syncing: bool,
    pub last_sync: Option<i64>,
    pub last_error: Option<String>,
    pub pending_count: u32,
    pub current_operation: Option<String>,
}

pub struct SyncStateStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SyncStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: "sync_state".to_string(),
        }
    }

    pub async fn get(&self) -> SyncState {
        match self.store.load(&self.key).await {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            None => SyncState::default(),
        }
    }

    async fn put(&self, state: &SyncState) {
        let bytes = serde_json::to_vec(state).expect("SyncState always serializes");
        self.store.put(&self.key, bytes).await;
    }

    pub async fn set_syncing(&self, syncing: bool, current_operation: Option<String>) {
        let mut state = self.get().await;
        state.syncing = syncing;
        state.current_operation = current_operation;
        self.put(&state).await;
    }

    pub async fn set_current_operation(&self, label: impl Into<String>) {
        let mut state = self.get().await;
        state.current_operation = Some(label.into());
        self.put(&state).await;
    }

    pub async fn record_success(&self, now_ms: i64) {
        let mut state = self.get().await;
        state.syncing = false;
        state.last_sync = Some(now_ms);
        state.last_error = None;
        state.current_operation = None;
        self.put(&state).await;
    }

    pub async fn record_failure(&self, error: impl Into<String>) {
        let mut state = self.get().await;
        state.syncing = false;
        state.last_error = Some(error.into());
        state.current_operation = None;
        self.put(&state).await;
    }

    pub async fn set_pending_count(&self, pending_count: u32) {
        let mut state = self.get().await;
        state.pending_count = pending_count;
        self.put(&state).await;
    }
}

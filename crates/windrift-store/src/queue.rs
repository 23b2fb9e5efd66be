//! The durable operation queue (spec §4.5): idempotent at-most-one-per-session
//! coalescing, exponential backoff with jitter, persisted through a
//! [`KeyValueStore`] so a process restart resumes with exact state.
//! Backoff shape mirrors the reconnect loop in the teacher's
//! `network::run_sync_loop` (`base * 2^retries`, capped, plus 0-20% jitter),
//! repurposed from "reconnect after N failures" to "retry this item after
//! N failures."

use std::sync::Arc;

use futures::lock::Mutex;
use rand::Rng;

use windrift_core::{QueueItem, QueueItemId, QueueItemKind, SessionId};

use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base_ms: i64,
    pub cap_ms: i64,
    pub dead_letter_after: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 30_000,
            cap_ms: 60 * 60 * 1000,
            dead_letter_after: 10,
        }
    }
}

impl BackoffConfig {
    fn delay_ms(&self, retry_count: u32) -> i64 {
        let exp = self.base_ms.saturating_mul(1i64 << retry_count.min(20));
        let capped = exp.min(self.cap_ms);
        let jitter_max = capped / 5; // 0-20% jitter
        let jitter = if jitter_max > 0 {
            rand::rng().random_range(0..=jitter_max)
        } else {
            0
        };
        capped + jitter
    }

    /// Whether an item at this retry count has exceeded the dead-letter
    /// ceiling and should no longer be retried automatically.
    pub fn is_dead_lettered(&self, retry_count: u32) -> bool {
        retry_count >= self.dead_letter_after
    }
}

pub struct QueueStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
    lock: Mutex<()>,
    backoff: BackoffConfig,
}

impl QueueStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_backoff(store, BackoffConfig::default())
    }

    pub fn with_backoff(store: Arc<dyn KeyValueStore>, backoff: BackoffConfig) -> Self {
        Self {
            store,
            key: "queue".to_string(),
            lock: Mutex::new(()),
            backoff,
        }
    }

    async fn load_items(&self) -> Vec<QueueItem> {
        match self.store.load(&self.key).await {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn save_items(&self, items: &[QueueItem]) {
        let bytes = serde_json::to_vec(items).expect("QueueItem always serializes");
        self.store.put(&self.key, bytes).await;
    }

    /// Replaces any existing item for `session_id` with a fresh one of
    /// `kind`, resetting retry state — a later delete supersedes an
    /// earlier upload and vice versa (spec §4.5).
    pub async fn enqueue(&self, kind: QueueItemKind, session_id: SessionId, now: i64) -> QueueItem {
        let _guard = self.lock.lock().await;
        let mut items = self.load_items().await;
        items.retain(|i| i.session_id != session_id);
        let item = QueueItem::new(kind, session_id, now);
        items.push(item.clone());
        self.save_items(&items).await;
        item
    }

    /// The oldest item whose `next_eligible_at` has passed and that has
    /// not been dead-lettered, or `None`.
    pub async fn get_next(&self, now: i64) -> Option<QueueItem> {
        let _guard = self.lock.lock().await;
        self.load_items()
            .await
            .into_iter()
            .filter(|i| i.next_eligible_at <= now && !self.backoff.is_dead_lettered(i.retry_count))
            .min_by_key(|i| i.enqueued_at)
    }

    pub async fn mark_complete(&self, id: &QueueItemId) {
        let _guard = self.lock.lock().await;
        let mut items = self.load_items().await;
        items.retain(|i| &i.id != id);
        self.save_items(&items).await;
    }

    pub async fn mark_failed(&self, id: &QueueItemId, err: String, now: i64) -> Option<QueueItem> {
        let _guard = self.lock.lock().await;
        let mut items = self.load_items().await;
        let item = items.iter_mut().find(|i| &i.id == id)?;
        item.retry_count += 1;
        item.next_eligible_at = now + self.backoff.delay_ms(item.retry_count);
        item.last_error = Some(err);
        let updated = item.clone();
        self.save_items(&items).await;
        Some(updated)
    }

    pub async fn len(&self) -> usize {
        self.load_items().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

//! The durable queue's item type. Persistence and retry bookkeeping live
//! in `windrift-store::queue`; this is just the data shape (spec §3 /
//! §4.5).

use serde::{Deserialize, Serialize};

use crate::ids::{QueueItemId, SessionId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemKind {
    Upload,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: QueueItemId,
    pub kind: QueueItemKind,
    pub session_id: SessionId,
    pub enqueued_at: i64,
    pub retry_count: u32,
    pub next_eligible_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueItem {
    pub fn new(kind: QueueItemKind, session_id: SessionId, now: i64) -> Self {
        Self {
            id: QueueItemId::new(),
            kind,
            session_id,
            enqueued_at: now,
            retry_count: 0,
            next_eligible_at: now,
            last_error: None,
        }
    }
}

//! `SessionLocalStore` (spec §2, §4.4): local CRUD over sessions keyed by
//! their stable identifier. Interface-only in the spec; this is the
//! `KeyValueStore`-backed implementation the engine is exercised against
//! in tests and would use in production.

use std::sync::Arc;

use windrift_core::{Session, SessionId};

use crate::storage::KeyValueStore;

const PREFIX: &str = "session:";

fn session_key(id: &SessionId) -> String {
    format!("{PREFIX}{id}")
}

pub struct SessionLocalStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionLocalStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn all(&self) -> Vec<Session> {
        self.store
            .load_range(PREFIX)
            .await
            .values()
            .filter_map(|bytes| serde_json::from_slice(bytes).ok())
            .collect()
    }

    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        let bytes = self.store.load(&session_key(id)).await?;
        serde_json::from_slice(&bytes).ok()
    }

    pub async fn put(&self, session: &Session) {
        let bytes = serde_json::to_vec(session).expect("Session always serializes");
        self.store.put(&session_key(&session.id), bytes).await;
    }

    pub async fn delete(&self, id: &SessionId) {
        self.store.delete(&session_key(id)).await;
    }
}

//! The remote manifest: the index of synced sessions plus deletion
//! tombstones. See spec §3 (`SyncManifest`) and §6 (wire form).

use serde::{Deserialize, Serialize};

use crate::ids::{DeviceId, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSessionMeta {
    pub id: SessionId,
    pub name: String,
    pub updated_at: i64,
    pub tab_count: u32,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncTombstone {
    pub id: SessionId,
    pub deleted_at: i64,
}

pub const TOMBSTONE_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncManifest {
    pub version: u32,
    pub last_sync: i64,
    pub device_id: DeviceId,
    pub sessions: Vec<SyncSessionMeta>,
    pub tombstones: Vec<SyncTombstone>,
}

pub const SYNC_MANIFEST_VERSION: u32 = 1;

impl SyncManifest {
    pub fn empty(device_id: DeviceId) -> Self {
        Self {
            version: SYNC_MANIFEST_VERSION,
            last_sync: 0,
            device_id,
            sessions: Vec::new(),
            tombstones: Vec::new(),
        }
    }

    pub fn session_meta(&self, id: &SessionId) -> Option<&SyncSessionMeta> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn tombstone(&self, id: &SessionId) -> Option<&SyncTombstone> {
        self.tombstones.iter().find(|t| &t.id == id)
    }

    /// Upserts `meta`, keyed by session id, and drops any tombstone for
    /// the same id. A session id never appears in both lists at once.
    pub fn upsert_session(&mut self, meta: SyncSessionMeta) {
        self.tombstones.retain(|t| t.id != meta.id);
        match self.sessions.iter_mut().find(|s| s.id == meta.id) {
            Some(slot) => *slot = meta,
            None => self.sessions.push(meta),
        }
    }

    /// Removes the session's manifest entry and records a tombstone,
    /// deduplicated by id. A session id never appears in both lists at once.
    pub fn tombstone_session(&mut self, id: SessionId, deleted_at: i64) {
        self.sessions.retain(|s| s.id != id);
        self.tombstones.retain(|t| t.id != id);
        self.tombstones.push(SyncTombstone { id, deleted_at });
    }

    /// Drops tombstones older than [`TOMBSTONE_TTL_MS`] relative to `now`.
    pub fn prune_expired_tombstones(&mut self, now: i64) {
        self.tombstones
            .retain(|t| now.saturating_sub(t.deleted_at) < TOMBSTONE_TTL_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, updated_at: i64) -> SyncSessionMeta {
        SyncSessionMeta {
            id: SessionId::from(id),
            name: "Session".to_string(),
            updated_at,
            tab_count: 1,
            checksum: "deadbeef".to_string(),
        }
    }

    #[test]
    fn upsert_replaces_existing_entry_and_clears_tombstone() {
        let mut manifest = SyncManifest::empty(DeviceId::from("device-1"));
        manifest.tombstone_session(SessionId::from("s1"), 1);
        assert_eq!(manifest.tombstones.len(), 1);

        manifest.upsert_session(meta("s1", 10));
        assert!(manifest.tombstones.is_empty());
        assert_eq!(manifest.sessions.len(), 1);
        assert_eq!(manifest.sessions[0].updated_at, 10);

        manifest.upsert_session(meta("s1", 20));
        assert_eq!(manifest.sessions.len(), 1);
        assert_eq!(manifest.sessions[0].updated_at, 20);
    }

    #[test]
    fn session_id_appears_in_exactly_one_list() {
        let mut manifest = SyncManifest::empty(DeviceId::from("device-1"));
        manifest.upsert_session(meta("s1", 1));
        manifest.tombstone_session(SessionId::from("s1"), 2);

        assert!(manifest.sessions.is_empty());
        assert_eq!(manifest.tombstones.len(), 1);
    }

    #[test]
    fn expired_tombstones_are_pruned() {
        let mut manifest = SyncManifest::empty(DeviceId::from("device-1"));
        manifest.tombstone_session(SessionId::from("old"), 0);
        manifest.tombstone_session(SessionId::from("new"), 100);

        manifest.prune_expired_tombstones(TOMBSTONE_TTL_MS + 50);

        assert_eq!(manifest.tombstones.len(), 1);
        assert_eq!(manifest.tombstones[0].id, SessionId::from("new"));
    }
}

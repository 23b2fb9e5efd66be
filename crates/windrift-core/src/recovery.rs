//! The recovery-snapshot data model (spec §3 `RecoverySnapshot`). Capture,
//! rotation, and restore live in `windrift-store::recovery`.

use serde::{Deserialize, Serialize};

use crate::model::Window;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStats {
    pub window_count: u32,
    pub tab_count: u32,
    pub group_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecoverySnapshot {
    pub id: String,
    pub timestamp: i64,
    pub windows: Vec<Window>,
    pub stats: RecoveryStats,
}

impl RecoverySnapshot {
    /// `recovery:<timestamp>`, per spec §3.
    pub fn id_for_timestamp(timestamp_ms: i64) -> String {
        format!("recovery:{timestamp_ms}")
    }

    pub fn new(timestamp_ms: i64, windows: Vec<Window>) -> Self {
        let window_count = windows.len() as u32;
        let tab_count = windows.iter().map(|w| w.tabs.len() as u32).sum();
        let group_count = windows.iter().map(|w| w.groups.len() as u32).sum();
        Self {
            id: Self::id_for_timestamp(timestamp_ms),
            timestamp: timestamp_ms,
            windows,
            stats: RecoveryStats {
                window_count,
                tab_count,
                group_count,
            },
        }
    }
}

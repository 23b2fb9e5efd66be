//! Device identifier lifecycle: generate once per install, persist it,
//! and read it back on every manifest upload. Adapted from the teacher's
//! `doc_id.rs` generate/save/load/clear shape, swapped from
//! `gloo_storage::LocalStorage` onto the shared [`KeyValueStore`].

use std::sync::Arc;

use windrift_core::DeviceId;

use crate::storage::KeyValueStore;

const DEVICE_ID_KEY: &str = "device_id";

pub async fn load_or_create_device_id(store: &Arc<dyn KeyValueStore>) -> DeviceId {
    if let Some(bytes) = store.load(DEVICE_ID_KEY).await
        && let Ok(id) = String::from_utf8(bytes)
    {
        return DeviceId::from(id);
    }
    let id = DeviceId::new();
    store.put(DEVICE_ID_KEY, id.as_str().as_bytes().to_vec()).await;
    id
}

pub async fn clear_device_id(store: &Arc<dyn KeyValueStore>) {
    store.delete(DEVICE_ID_KEY).await;
}

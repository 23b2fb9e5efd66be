//! The key-value storage abstraction every persistent piece of the store
//! builds on: [`SessionLocalStore`](crate::session_store), [`QueueStore`](crate::queue),
//! [`SyncStateStore`](crate::sync_state), and the recovery codec's own
//! key space. Generalized from the teacher's `samod_storage::LocalStorage`
//! trait, which played the same role for samod's automerge documents.

use std::collections::HashMap;

#[cfg(not(target_arch = "wasm32"))]
use std::sync::{Arc, Mutex};

#[cfg(not(target_arch = "wasm32"))]
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn load(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, value: Vec<u8>);
    async fn delete(&self, key: &str);
    /// All entries whose key starts with `prefix`.
    async fn load_range(&self, prefix: &str) -> HashMap<String, Vec<u8>>;
}

#[cfg(target_arch = "wasm32")]
#[async_trait::async_trait(?Send)]
pub trait KeyValueStore {
    async fn load(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, value: Vec<u8>);
    async fn delete(&self, key: &str);
    async fn load_range(&self, prefix: &str) -> HashMap<String, Vec<u8>>;
}

/// In-memory store used off `wasm32` and in tests everywhere. Nothing
/// survives a process restart; production installs use
/// [`IndexedDbStore`] instead.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

#[cfg(not(target_arch = "wasm32"))]
impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait::async_trait]
impl KeyValueStore for InMemoryStore {
    async fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(key).cloned()
    }

    async fn put(&self, key: &str, value: Vec<u8>) {
        self.data.lock().unwrap().insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) {
        self.data.lock().unwrap().remove(key);
    }

    async fn load_range(&self, prefix: &str) -> HashMap<String, Vec<u8>> {
        self.data
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// IndexedDB-backed store for the browser extension build. One object
/// store holding opaque byte blobs keyed by string, same shape as the
/// teacher's `SamodStorage` wasm implementation.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Debug)]
pub struct IndexedDbStore {
    db_name: String,
    store_name: String,
}

#[cfg(target_arch = "wasm32")]
impl IndexedDbStore {
    pub fn new(db_name: &str, store_name: &str) -> Self {
        Self {
            db_name: db_name.to_string(),
            store_name: store_name.to_string(),
        }
    }

    async fn get_db(&self) -> anyhow::Result<rexie::Rexie> {
        rexie::Rexie::builder(&self.db_name)
            .version(1)
            .add_object_store(rexie::ObjectStore::new(&self.store_name))
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("failed to open IndexedDB: {:?}", e))
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait::async_trait(?Send)]
impl KeyValueStore for IndexedDbStore {
    async fn load(&self, key: &str) -> Option<Vec<u8>> {
        let db = self.get_db().await.inspect_err(|e| tracing::error!("{e:?}")).ok()?;
        let tx = db
            .transaction(&[&self.store_name], rexie::TransactionMode::ReadOnly)
            .inspect_err(|e| tracing::error!("{e:?}"))
            .ok()?;

        let run = async {
            let store = tx
                .store(&self.store_name)
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            let val = store
                .get(wasm_bindgen::JsValue::from_str(key))
                .await
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            match val {
                Some(v) if !v.is_undefined() && !v.is_null() => {
                    let bytes: Vec<u8> = serde_wasm_bindgen::from_value(v)
                        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
                    Ok::<_, anyhow::Error>(Some(bytes))
                }
                _ => Ok(None),
            }
        };

        match run.await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("storage load failed: {e:?}");
                None
            }
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) {
        let Ok(db) = self.get_db().await.inspect_err(|e| tracing::error!("{e:?}")) else {
            return;
        };
        let db = scopeguard::guard(db, |db| db.close());
        let Ok(tx) = db
            .transaction(&[&self.store_name], rexie::TransactionMode::ReadWrite)
            .inspect_err(|e| tracing::error!("{e:?}"))
        else {
            return;
        };

        let run = async {
            let store = tx
                .store(&self.store_name)
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            let js_key = wasm_bindgen::JsValue::from_str(key);
            let js_val = serde_wasm_bindgen::to_value(&value).map_err(|e| anyhow::anyhow!("{e:?}"))?;
            store
                .put(&js_val, Some(&js_key))
                .await
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            tx.done().await.map_err(|e| anyhow::anyhow!("{e:?}"))?;
            Ok::<(), anyhow::Error>(())
        };
        if let Err(e) = run.await {
            tracing::error!("storage put failed: {e:?}");
        }
    }

    async fn delete(&self, key: &str) {
        let Ok(db) = self.get_db().await.inspect_err(|e| tracing::error!("{e:?}")) else {
            return;
        };
        let db = scopeguard::guard(db, |db| db.close());
        let Ok(tx) = db
            .transaction(&[&self.store_name], rexie::TransactionMode::ReadWrite)
            .inspect_err(|e| tracing::error!("{e:?}"))
        else {
            return;
        };

        let run = async {
            let store = tx
                .store(&self.store_name)
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            store
                .delete(wasm_bindgen::JsValue::from_str(key))
                .await
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            tx.done().await.map_err(|e| anyhow::anyhow!("{e:?}"))?;
            Ok::<(), anyhow::Error>(())
        };
        if let Err(e) = run.await {
            tracing::error!("storage delete failed: {e:?}");
        }
    }

    async fn load_range(&self, prefix: &str) -> HashMap<String, Vec<u8>> {
        let mut results = HashMap::new();
        let Ok(db) = self.get_db().await.inspect_err(|e| tracing::error!("{e:?}")) else {
            return results;
        };
        let db = scopeguard::guard(db, |db| db.close());
        let Ok(tx) = db
            .transaction(&[&self.store_name], rexie::TransactionMode::ReadOnly)
            .inspect_err(|e| tracing::error!("{e:?}"))
        else {
            return results;
        };

        let run = async {
            let store = tx
                .store(&self.store_name)
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            let keys = store
                .get_all_keys(None, None)
                .await
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            for key_val in keys {
                let Some(key_str) = key_val.as_string() else {
                    continue;
                };
                if !key_str.starts_with(prefix) {
                    continue;
                }
                if let Some(v) = store.get(key_val).await.map_err(|e| anyhow::anyhow!("{e:?}"))?
                    && !v.is_undefined()
                    && !v.is_null()
                {
                    let bytes: Vec<u8> =
                        serde_wasm_bindgen::from_value(v).map_err(|e| anyhow::anyhow!("{e:?}"))?;
                    results.insert(key_str, bytes);
                }
            }
            Ok::<_, anyhow::Error>(())
        };
        if let Err(e) = run.await {
            tracing::error!("storage load_range failed: {e:?}");
        }
        results
    }
}

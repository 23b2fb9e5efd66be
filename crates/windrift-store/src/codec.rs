//! `ChunkedBlobCodec`: fits an arbitrarily large serializable value into a
//! key-value store that enforces a hard per-item byte ceiling (spec
//! §4.2). Used today only by [`crate::recovery`] for the single remote
//! backup slot, against a `KeyValueStore` local-sync instance — never
//! against `RemoteStore` directly.

use std::io::{Read, Write};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::storage::KeyValueStore;

pub const DEFAULT_MAX_ITEM_BYTES: usize = 8 * 1024;
pub const DEFAULT_MAX_CHUNKS: usize = 100;

#[derive(Debug, Clone, Serialize, serde::Deserialize)]
struct ChunkMeta {
    chunk_count: usize,
    timestamp: i64,
    tab_count: u32,
}

pub struct ChunkedBlobCodec {
    store: Arc<dyn KeyValueStore>,
    max_item_bytes: usize,
    max_chunks: usize,
}

fn compress(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("in-memory write cannot fail");
    encoder.finish().expect("in-memory finish cannot fail")
}

fn decompress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

impl ChunkedBlobCodec {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_limits(store, DEFAULT_MAX_ITEM_BYTES, DEFAULT_MAX_CHUNKS)
    }

    pub fn with_limits(store: Arc<dyn KeyValueStore>, max_item_bytes: usize, max_chunks: usize) -> Self {
        Self {
            store,
            max_item_bytes,
            max_chunks,
        }
    }

    fn chunk_key(key_space: &str, i: usize) -> String {
        format!("{key_space}/chunk-{i}")
    }

    fn meta_key(key_space: &str) -> String {
        format!("{key_space}/meta")
    }

    /// Worst-case payload length a chunk can hold once JSON-quoting and
    /// key overhead (computed against the longest possible chunk index)
    /// are subtracted, per spec §4.2 step 1.
    fn max_payload_len(&self, key_space: &str) -> usize {
        let worst_case_key = Self::chunk_key(key_space, self.max_chunks.saturating_sub(1));
        let quoting_overhead = 2; // two JSON string quote characters
        self.max_item_bytes
            .saturating_sub(worst_case_key.len())
            .saturating_sub(quoting_overhead)
    }

    /// Compresses and chunks `value`, replacing any prior data under
    /// `key_space`. `tab_count` is carried through to the chunk metadata
    /// record for diagnostic purposes only (spec §4.2 step 4).
    pub async fn save<T: Serialize>(
        &self,
        key_space: &str,
        value: &T,
        tab_count: u32,
        now_ms: i64,
    ) -> Result<(), CodecError> {
        let json = serde_json::to_string(value).map_err(|e| CodecError::Serialize(e.to_string()))?;
        let compressed = compress(json.as_bytes());
        let encoded = B64.encode(compressed);

        let max_payload = self.max_payload_len(key_space);
        if max_payload == 0 {
            return Err(CodecError::TooLarge);
        }

        let chunks: Vec<&[u8]> = if encoded.is_empty() {
            vec![&[][..]]
        } else {
            encoded.as_bytes().chunks(max_payload).collect()
        };

        if chunks.len() > self.max_chunks {
            return Err(CodecError::TooLarge);
        }

        self.clear(key_space).await;

        for (i, chunk) in chunks.iter().enumerate() {
            self.store.put(&Self::chunk_key(key_space, i), chunk.to_vec()).await;
        }

        let meta = ChunkMeta {
            chunk_count: chunks.len(),
            timestamp: now_ms,
            tab_count,
        };
        let meta_bytes = serde_json::to_vec(&meta).map_err(|e| CodecError::Serialize(e.to_string()))?;
        self.store.put(&Self::meta_key(key_space), meta_bytes).await;
        Ok(())
    }

    /// Reads all chunks for `key_space`; any missing chunk or decode
    /// failure yields `None`, never a corrupted value (spec §4.2 step 2-3
    /// and the atomicity note).
    pub async fn load<T: DeserializeOwned>(&self, key_space: &str) -> Option<T> {
        let Some(meta_bytes) = self.store.load(&Self::meta_key(key_space)).await else {
            return self.load_legacy(key_space).await;
        };
        let meta: ChunkMeta = serde_json::from_slice(&meta_bytes).ok()?;

        let mut encoded = String::new();
        for i in 0..meta.chunk_count {
            let chunk_bytes = self.store.load(&Self::chunk_key(key_space, i)).await?;
            encoded.push_str(&String::from_utf8(chunk_bytes).ok()?);
        }

        let compressed = B64.decode(&encoded).ok()?;
        let json_bytes = decompress(&compressed).ok()?;
        serde_json::from_slice(&json_bytes).ok()
    }

    /// A single item at `key_space` may hold either the compressed bytes
    /// of the value (old format) or the raw JSON object (older format).
    /// Attempted in that order; `None` on both failures (spec §4.2
    /// "Legacy path").
    async fn load_legacy<T: DeserializeOwned>(&self, key_space: &str) -> Option<T> {
        let bytes = self.store.load(key_space).await?;
        if let Ok(decompressed) = decompress(&bytes)
            && let Ok(value) = serde_json::from_slice(&decompressed)
        {
            return Some(value);
        }
        serde_json::from_slice(&bytes).ok()
    }

    /// Removes the meta record, every chunk it references, and the
    /// legacy single-blob key, in one call.
    pub async fn clear(&self, key_space: &str) {
        if let Some(meta_bytes) = self.store.load(&Self::meta_key(key_space)).await
            && let Ok(meta) = serde_json::from_slice::<ChunkMeta>(&meta_bytes)
        {
            for i in 0..meta.chunk_count {
                self.store.delete(&Self::chunk_key(key_space, i)).await;
            }
        }
        self.store.delete(&Self::meta_key(key_space)).await;
        self.store.delete(key_space).await;
    }
}

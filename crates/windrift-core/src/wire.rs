//! Bit-exact wire types shared by the crypto layer, the remote store, and
//! the manifest. See spec §6 "External interfaces" — these shapes are a
//! contract, not an implementation detail: any field rename breaks every
//! device that has already synced.

use serde::{Deserialize, Serialize};

/// `{"v":1,"iv":"<base64 12 bytes>","ct":"<base64 ciphertext+tag>"}`
///
/// A version other than 1 is a hard decode error, never treated as
/// plaintext or as a different-but-compatible shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub v: u32,
    pub iv: String,
    pub ct: String,
}

pub const ENCRYPTED_PAYLOAD_VERSION: u32 = 1;

impl EncryptedPayload {
    pub fn is_supported_version(&self) -> bool {
        self.v == ENCRYPTED_PAYLOAD_VERSION
    }
}

/// `{"salt":"<base64 32 bytes>","verificationHash":"<hex 32 chars>"}`
///
/// `recoveryKey` must never appear here; the recovery key is returned to
/// the caller exactly once at setup time and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyData {
    pub salt: String,
    pub verification_hash: String,
}

//! Error taxonomy for the crypto primitives (spec §4.1 / §7).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported payload version")]
    UnsupportedVersion,
    #[error("decryption failed: wrong key or tampered ciphertext")]
    DecryptFailed,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

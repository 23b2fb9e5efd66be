//! Error taxonomy for everything that touches storage, the clock, or the
//! network (spec §7).

use thiserror::Error;
use windrift_core::CryptoError;

/// Errors surfaced by [`crate::codec::ChunkedBlobCodec::save`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The value would require more than `MAX_CHUNKS` chunks to store.
    #[error("value requires more than the configured chunk ceiling")]
    TooLarge,
    #[error("failed to serialize value: {0}")]
    Serialize(String),
}

/// The error taxonomy a `RemoteStore` implementation surfaces to the
/// engine (spec §4.3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteStoreError {
    #[error("auth token expired")]
    AuthExpired,
    #[error("rate limited")]
    RateLimited,
    #[error("access denied")]
    AccessDenied,
    #[error("not found")]
    NotFound,
    #[error("transient error: {0}")]
    Transient(String),
    #[error("{0}")]
    Other(String),
}

/// Errors the [`crate::engine::SyncEngine`] surfaces from its public
/// operations (spec §7), beyond the structured `SyncReport` it returns
/// from a full sync.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("not configured: no stored key data")]
    NotConfigured,
    #[error("token refresh failed")]
    AuthFailed,
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteStoreError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("internal invariant violation: {0}")]
    Fatal(String),
}

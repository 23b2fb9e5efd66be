//! Pure domain types and cryptographic primitives for the sync core.
//!
//! Nothing in this crate touches storage, the clock, or the network —
//! those concerns live in `windrift-store`. This crate is the vocabulary
//! both the extension and the store build on: the session/window/tab
//! model, the wire shapes, the manifest, and the crypto that keeps all
//! of it opaque at rest and in transit.

pub mod crypto;
pub mod error;
pub mod ids;
pub mod manifest;
pub mod model;
pub mod protected_urls;
pub mod queue_item;
pub mod recovery;
pub mod wire;

pub use crypto::{Key, SetupResult};
pub use error::CryptoError;
pub use ids::{DeviceId, QueueItemId, SessionId};
pub use manifest::{SyncManifest, SyncSessionMeta, SyncTombstone, TOMBSTONE_TTL_MS};
pub use model::{
    GroupColor, ModelError, Session, SessionProvenance, Tab, TabGroup, Window, WindowState,
    GROUP_COLOR_PALETTE,
};
pub use protected_urls::{is_protected_url, PROTECTED_URL_PREFIXES};
pub use queue_item::{QueueItem, QueueItemKind};
pub use recovery::{RecoverySnapshot, RecoveryStats};
pub use wire::{EncryptedPayload, KeyData, ENCRYPTED_PAYLOAD_VERSION};

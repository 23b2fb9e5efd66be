//! Everything that touches storage, the clock, or the network: the
//! storage abstraction, the durable queue, the sync engine, and the
//! recovery-snapshot service. `windrift-core` supplies the pure domain
//! types and crypto this crate moves around.

pub mod clock;
pub mod codec;
pub mod device_id;
pub mod engine;
pub mod error;
pub mod queue;
pub mod recovery;
pub mod remote;
pub mod session_store;
pub mod storage;
pub mod sync_state;

pub use clock::{Clock, Debouncer, SystemClock};
pub use codec::{ChunkedBlobCodec, DEFAULT_MAX_CHUNKS, DEFAULT_MAX_ITEM_BYTES};
pub use device_id::{clear_device_id, load_or_create_device_id};
pub use engine::{EngineState, StaticTokenRefresher, SyncEngine, SyncReport, TokenRefresher};
pub use error::{CodecError, EngineError, RemoteStoreError};
pub use queue::{BackoffConfig, QueueStore};
pub use recovery::{DEFAULT_DEBOUNCE_MS, RecoverySnapshotService, RestoreReport, WindowRestorer, WindowSource};
pub use remote::{InMemoryRemoteStore, RemoteFileInfo, RemoteStore, StorageInfo};
pub use session_store::SessionLocalStore;
pub use storage::{InMemoryStore, KeyValueStore};
pub use sync_state::{SyncState, SyncStateStore};

#[cfg(target_arch = "wasm32")]
pub use storage::IndexedDbStore;

//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! Mount:
//!     persister.rs restore_client (storage.rs get_item)
//!     → client.rs restore: drop malformed / wrong buster / expired snapshots
//!     → QueryClient::hydrate
//!
//! After every successful update:
//!     cache watch fires → client.rs persist_client
//!     → snapshot.rs PersistedClient { buster, timestamp, clientState }
//!     → storage.rs set_item under OFFLINE_CACHE_KEY
//! ```
//!
//! # Design Decisions
//! - Restore failures are logged and recovered locally, never surfaced
//! - Storage is string-typed; JSON encoding belongs to the persister
//! - One snapshot document per storage key

pub mod client;
pub mod error;
pub mod persister;
pub mod snapshot;
pub mod storage;

pub use client::{
    persist_client, restore_client, restore_or_discard, spawn_persist_subscription,
    PersistSubscription,
};
pub use error::{PersistError, RestoreError};
pub use persister::{Persister, StoragePersister};
pub use snapshot::{DehydratedClient, PersistedClient, OFFLINE_CACHE_KEY};
pub use storage::{FileStorage, MemoryStorage, Storage};

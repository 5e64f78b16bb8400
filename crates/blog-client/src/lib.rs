//! Derived-address CRUD client for blog entries.
//!
//! [`RecordClient`] lists, reads, creates, updates and deletes blog entries
//! stored as accounts on a remote ledger. Every record lives at an address
//! derived from `(owner, title)`, so no index is needed to find it. Reads go
//! through a [`QueryCache`]; successful writes invalidate and refetch exactly
//! the cache keys they affect and publish [`CacheEvent`]s so presentation
//! code can re-render.
//!
//! The client holds no global state: endpoint, program id and signer are all
//! passed in at construction.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;

pub use cache::{
    CacheEvent, CacheEventKind, CacheFilter, CacheSubscription, CachedEntry, CachedValue,
    ProgramPresence, QueryCache, QueryKey,
};
pub use client::RecordClient;
pub use config::{ClientConfig, Cluster, BLOG_PROGRAM_ID};
pub use error::{ClientError, ClientResult};

// Re-export the types callers need to drive the client.
pub use blog_crypto::{AddressResolver, KeypairSigner, Signer, SigningKey};
pub use blog_store::{Confirmation, InMemoryLedger, RemoteStore};
pub use blog_types::{LogicalKey, ProgramId, PublicIdentity, RecordState, StorageAddress};

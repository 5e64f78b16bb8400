//! Remote store boundary for the blog ledger client.
//!
//! The client never talks to a ledger directly; it goes through the
//! [`RemoteStore`] trait, submitting signed transactions and reading raw
//! account bytes that a [`Codec`] turns into records.
//!
//! # Wire Types
//!
//! - [`BlogInstruction`] -- create, update or delete one blog entry
//! - [`UnsignedTransaction`] / [`SignedTransaction`] -- what gets signed and submitted
//! - [`Confirmation`] -- the ledger's acknowledgement of an included transaction
//!
//! # Backends
//!
//! - [`InMemoryLedger`] -- executes the blog program locally; used by tests
//!   and by the CLI (with JSON snapshots on disk)
//!
//! # Design Rules
//!
//! 1. The ledger is the single source of truth; nothing here caches.
//! 2. At most one live account exists per derived address.
//! 3. Every instruction re-derives its record address and checks the owner's
//!    signature before touching state.
//! 4. Failures carry a native [`ErrorCode`] so callers can classify them.

pub mod codec;
pub mod error;
pub mod instruction;
pub mod memory;
pub mod traits;

pub use codec::{BincodeCodec, Codec, ACCOUNT_TYPE_NAME};
pub use error::{ErrorCode, StoreError, StoreResult};
pub use instruction::{
    BlogInstruction, Confirmation, EntryAccounts, Instruction, SignedTransaction,
    UnsignedTransaction,
};
pub use memory::{InMemoryLedger, LedgerSnapshot};
pub use traits::RemoteStore;

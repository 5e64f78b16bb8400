//! Foundation types for the blog ledger client.
//!
//! Every other crate in the workspace depends on `blog-types`.
//!
//! # Key Types
//!
//! - [`PublicIdentity`]: 32-byte ed25519 public key of an account owner
//! - [`ProgramId`]: identifier of the program that owns the blog namespace
//! - [`StorageAddress`]: derived address of a single record account
//! - [`LogicalKey`]: `(owner, title)`, the key a record is addressed by
//! - [`RecordState`]: the persisted blog entry
//! - [`TxSignature`]: signature identifying a submitted transaction

pub mod address;
pub mod error;
pub mod identity;
pub mod record;
pub mod signature;

pub use address::{ProgramId, StorageAddress};
pub use error::TypeError;
pub use identity::PublicIdentity;
pub use record::{
    validate_description, validate_title, LogicalKey, RecordState, MAX_DESCRIPTION_LEN,
    MAX_SEED_LEN, MAX_TITLE_LEN, NAMESPACE_TAG,
};
pub use signature::TxSignature;

/// Decode a 64-character hex string into 32 bytes.
pub(crate) fn decode_hex32(s: &str) -> Result<[u8; 32], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(TypeError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

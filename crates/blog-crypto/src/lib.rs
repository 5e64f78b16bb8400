//! Cryptographic primitives for the blog ledger client.
//!
//! Provides derived record addresses, domain-separated type discriminators,
//! and Ed25519 signing behind an async [`Signer`] capability.
//!
//! All crypto operations wrap established libraries.

pub mod address;
pub mod discriminator;
pub mod error;
pub mod signer;

pub use address::AddressResolver;
pub use discriminator::Discriminator;
pub use error::{ResolveError, SignatureError, SignerError};
pub use signer::{KeypairSigner, Signature, Signer, SigningKey, VerifyingKey};

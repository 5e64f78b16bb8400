use blog_types::{PublicIdentity, TypeError};

/// Errors from address derivation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A seed failed validation. Raised before any network access.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),

    #[error("too many seeds: {count} (max {max})")]
    TooManySeeds { count: usize, max: usize },

    /// Every bump produced a point on the curve.
    #[error("no viable bump seed for derived address")]
    NoViableBump,
}

/// Errors from signature verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
}

/// Errors from a [`Signer`](crate::Signer).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignerError {
    /// The signer declined to sign for this identity.
    #[error("signing rejected for {identity}: {reason}")]
    Rejected {
        identity: PublicIdentity,
        reason: String,
    },
}

use blog_crypto::{ResolveError, SignerError};
use blog_store::{ErrorCode, StoreError};
use blog_types::{StorageAddress, TypeError};
use thiserror::Error;

/// Errors returned by [`RecordClient`](crate::RecordClient).
///
/// `InvalidKey` and `KeyMismatch` are raised before any network access.
/// Everything the ledger reports is mapped into one of the other variants.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A title or description failed validation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// No record exists at the address. Expected and recoverable.
    #[error("no record at {0}")]
    NotFound(StorageAddress),

    /// A record already lives at the address for this key.
    #[error("record already exists at {0}")]
    AlreadyExists(StorageAddress),

    /// The address passed in is not the derived address of `(owner, title)`.
    #[error("address {actual} does not match derived address {expected}")]
    KeyMismatch {
        expected: StorageAddress,
        actual: StorageAddress,
    },

    /// The ledger refused to let the acting identity touch the record.
    #[error("unauthorized: {message} ({code})")]
    Unauthorized { code: ErrorCode, message: String },

    /// The signer declined to sign.
    #[error("signing rejected: {0}")]
    Rejected(String),

    /// The transaction was not confirmed. Possibly transient; never retried
    /// automatically.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    /// A read could not be answered by the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Map a failed submission for the record at `address`.
    pub(crate) fn from_submission(err: StoreError, address: StorageAddress) -> Self {
        match err {
            StoreError::Program { code, message } => match code {
                ErrorCode::AccountAlreadyInUse => Self::AlreadyExists(address),
                ErrorCode::AccountNotInitialized => Self::NotFound(address),
                ErrorCode::ConstraintSigner
                | ErrorCode::ConstraintSeeds
                | ErrorCode::ConstraintHasOne
                | ErrorCode::SignatureVerificationFailed => Self::Unauthorized { code, message },
                _ => Self::SubmissionFailed(format!("{code}: {message}")),
            },
            other => Self::SubmissionFailed(other.to_string()),
        }
    }

    /// Returns `true` for errors raised before anything was sent.
    pub fn is_client_side(&self) -> bool {
        matches!(self, Self::InvalidKey(_) | Self::KeyMismatch { .. })
    }
}

impl From<TypeError> for ClientError {
    fn from(err: TypeError) -> Self {
        Self::InvalidKey(err.to_string())
    }
}

impl From<ResolveError> for ClientError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidKey(e) => Self::InvalidKey(e.to_string()),
            other => Self::InvalidKey(other.to_string()),
        }
    }
}

impl From<SignerError> for ClientError {
    fn from(err: SignerError) -> Self {
        Self::Rejected(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> StorageAddress {
        StorageAddress::from_bytes([1; 32])
    }

    fn program(code: ErrorCode) -> StoreError {
        StoreError::Program {
            code,
            message: "m".into(),
        }
    }

    #[test]
    fn native_codes_map_into_taxonomy() {
        assert!(matches!(
            ClientError::from_submission(program(ErrorCode::AccountAlreadyInUse), addr()),
            ClientError::AlreadyExists(a) if a == addr()
        ));
        assert!(matches!(
            ClientError::from_submission(program(ErrorCode::AccountNotInitialized), addr()),
            ClientError::NotFound(_)
        ));
        assert!(matches!(
            ClientError::from_submission(program(ErrorCode::SignatureVerificationFailed), addr()),
            ClientError::Unauthorized {
                code: ErrorCode::SignatureVerificationFailed,
                ..
            }
        ));
        assert!(matches!(
            ClientError::from_submission(program(ErrorCode::DescriptionTooLong), addr()),
            ClientError::SubmissionFailed(_)
        ));
    }

    #[test]
    fn transport_failures_are_submission_failures() {
        assert!(matches!(
            ClientError::from_submission(StoreError::Timeout(5), addr()),
            ClientError::SubmissionFailed(_)
        ));
        assert!(matches!(
            ClientError::from_submission(StoreError::Transport("down".into()), addr()),
            ClientError::SubmissionFailed(_)
        ));
    }

    #[test]
    fn client_side_errors() {
        assert!(ClientError::from(TypeError::EmptyTitle).is_client_side());
        assert!(ClientError::KeyMismatch {
            expected: addr(),
            actual: addr()
        }
        .is_client_side());
        assert!(!ClientError::NotFound(addr()).is_client_side());
    }
}

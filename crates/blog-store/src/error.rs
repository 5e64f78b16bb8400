use std::fmt;

use blog_types::StorageAddress;
use serde::{Deserialize, Serialize};

/// Native error codes reported by the ledger when it rejects a transaction.
///
/// Codes below 6000 are framework and runtime errors; 6000 and above belong
/// to the blog program itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    /// An account already lives at the target address.
    AccountAlreadyInUse = 0,
    /// The instruction data could not be decoded.
    InstructionDidNotDeserialize = 102,
    /// The instruction discriminator names no known instruction.
    InstructionFallbackNotFound = 101,
    /// A required signer did not sign.
    ConstraintSigner = 2002,
    /// The record account does not match the derivation seeds.
    ConstraintSeeds = 2006,
    /// The stored owner differs from the signing owner.
    ConstraintHasOne = 2001,
    /// Stored bytes are not a blog entry.
    AccountDiscriminatorMismatch = 3002,
    /// No account exists at the target address.
    AccountNotInitialized = 3012,
    /// A seed is longer than the per-seed limit.
    MaxSeedLengthExceeded = 3100,
    /// A signature did not verify against its key.
    SignatureVerificationFailed = 3200,
    /// The transaction was already processed.
    AlreadyProcessed = 3300,
    /// The target program is not deployed.
    ProgramNotFound = 3400,
    /// The description exceeds its stored length.
    DescriptionTooLong = 6000,
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:#x})", self, self.code())
    }
}

/// Errors from remote store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The ledger executed the transaction and rejected it.
    #[error("transaction rejected: {code}: {message}")]
    Program { code: ErrorCode, message: String },

    /// The store could not be reached or dropped the request.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transaction was sent but not confirmed in time.
    #[error("confirmation timed out after {0} ms")]
    Timeout(u64),

    /// Stored bytes could not be decoded.
    #[error("corrupt account {address}: {reason}")]
    CorruptAccount {
        address: StorageAddress,
        reason: String,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn program(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Program {
            code,
            message: message.into(),
        }
    }

    /// The native code, if the ledger rejected the transaction.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Program { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hex_code() {
        assert_eq!(
            ErrorCode::AccountNotInitialized.to_string(),
            "AccountNotInitialized (0xbc4)"
        );
    }

    #[test]
    fn code_only_for_program_errors() {
        let err = StoreError::program(ErrorCode::ConstraintSigner, "owner did not sign");
        assert_eq!(err.code(), Some(ErrorCode::ConstraintSigner));
        assert_eq!(StoreError::Timeout(10).code(), None);
    }
}

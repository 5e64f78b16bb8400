use blog_crypto::{Signature, VerifyingKey};
use blog_types::{ProgramId, PublicIdentity, StorageAddress, TxSignature};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, StoreError, StoreResult};

/// Instructions understood by the blog program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlogInstruction {
    CreateBlog { title: String, description: String },
    UpdateBlog { title: String, new_description: String },
    DeleteBlog { title: String },
}

impl BlogInstruction {
    /// Instruction name, used for its discriminator and in program logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateBlog { .. } => "create_blog",
            Self::UpdateBlog { .. } => "update_blog",
            Self::DeleteBlog { .. } => "delete_blog",
        }
    }

    /// The title seed the instruction addresses.
    pub fn title(&self) -> &str {
        match self {
            Self::CreateBlog { title, .. }
            | Self::UpdateBlog { title, .. }
            | Self::DeleteBlog { title } => title,
        }
    }
}

/// Accounts every blog instruction touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAccounts {
    /// The record account at its derived address.
    pub blog_entry: StorageAddress,
    /// The acting identity. It must sign, and it is a derivation seed.
    pub owner: PublicIdentity,
}

/// A single encoded program invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: ProgramId,
    pub accounts: EntryAccounts,
    /// Discriminator followed by encoded arguments (see [`Codec`](crate::Codec)).
    pub data: Vec<u8>,
}

/// A transaction ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub fee_payer: PublicIdentity,
    pub instruction: Instruction,
    /// Makes otherwise identical transactions distinct.
    pub nonce: u64,
}

impl UnsignedTransaction {
    /// New transaction paid for by the instruction's owner.
    pub fn new(instruction: Instruction) -> Self {
        Self {
            fee_payer: instruction.accounts.owner,
            instruction,
            nonce: rand::random(),
        }
    }

    /// The exact bytes every signer signs.
    pub fn message_bytes(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Identities that must sign: the fee payer and the owner.
    pub fn required_signers(&self) -> Vec<PublicIdentity> {
        let mut signers = vec![self.fee_payer];
        if self.instruction.accounts.owner != self.fee_payer {
            signers.push(self.instruction.accounts.owner);
        }
        signers
    }

    /// Attach signatures produced over [`message_bytes`](Self::message_bytes).
    pub fn into_signed(self, signatures: Vec<(PublicIdentity, Signature)>) -> SignedTransaction {
        SignedTransaction {
            message: self,
            signatures,
        }
    }
}

/// A transaction with its signatures attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub message: UnsignedTransaction,
    pub signatures: Vec<(PublicIdentity, Signature)>,
}

impl SignedTransaction {
    /// Transaction id: the first signature.
    pub fn signature(&self) -> Option<TxSignature> {
        self.signatures.first().map(|(_, sig)| sig.to_tx_signature())
    }

    /// Check that every required signer signed the message.
    pub fn verify(&self) -> StoreResult<()> {
        let message = self.message.message_bytes()?;
        for signer in self.message.required_signers() {
            let (_, signature) = self
                .signatures
                .iter()
                .find(|(id, _)| *id == signer)
                .ok_or_else(|| {
                    StoreError::program(
                        ErrorCode::ConstraintSigner,
                        format!("missing signature for {signer}"),
                    )
                })?;
            VerifyingKey::from_identity(&signer)
                .and_then(|key| key.verify(&message, signature))
                .map_err(|_| {
                    StoreError::program(
                        ErrorCode::SignatureVerificationFailed,
                        format!("signature for {signer} does not verify"),
                    )
                })?;
        }
        Ok(())
    }
}

/// The ledger's acknowledgement that a transaction was included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub signature: TxSignature,
    pub slot: u64,
    /// Program log lines emitted while executing the transaction.
    pub logs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_crypto::SigningKey;

    fn unsigned(owner: PublicIdentity) -> UnsignedTransaction {
        UnsignedTransaction::new(Instruction {
            program_id: ProgramId::from_bytes([1; 32]),
            accounts: EntryAccounts {
                blog_entry: StorageAddress::from_bytes([2; 32]),
                owner,
            },
            data: vec![0; 8],
        })
    }

    #[test]
    fn owner_pays_and_signs() {
        let owner = PublicIdentity::from_bytes([3; 32]);
        let tx = unsigned(owner);
        assert_eq!(tx.fee_payer, owner);
        assert_eq!(tx.required_signers(), vec![owner]);
    }

    #[test]
    fn verify_accepts_owner_signature() {
        let key = SigningKey::generate();
        let tx = unsigned(key.identity());
        let sig = key.sign(&tx.message_bytes().unwrap());
        let signed = tx.into_signed(vec![(key.identity(), sig.clone())]);
        signed.verify().unwrap();
        assert_eq!(signed.signature(), Some(sig.to_tx_signature()));
    }

    #[test]
    fn verify_rejects_missing_signature() {
        let key = SigningKey::generate();
        let signed = unsigned(key.identity()).into_signed(vec![]);
        assert_eq!(
            signed.verify().unwrap_err().code(),
            Some(ErrorCode::ConstraintSigner)
        );
        assert_eq!(signed.signature(), None);
    }

    #[test]
    fn verify_rejects_signature_by_another_key() {
        let owner = SigningKey::generate();
        let intruder = SigningKey::generate();
        let tx = unsigned(owner.identity());
        let sig = intruder.sign(&tx.message_bytes().unwrap());
        let signed = tx.into_signed(vec![(owner.identity(), sig)]);
        assert_eq!(
            signed.verify().unwrap_err().code(),
            Some(ErrorCode::SignatureVerificationFailed)
        );
    }

    #[test]
    fn nonce_distinguishes_transactions() {
        let owner = PublicIdentity::from_bytes([3; 32]);
        let a = unsigned(owner);
        let b = unsigned(owner);
        assert_ne!(a.message_bytes().unwrap(), b.message_bytes().unwrap());
    }

    #[test]
    fn instruction_names() {
        let ix = BlogInstruction::DeleteBlog { title: "t".into() };
        assert_eq!(ix.name(), "delete_blog");
        assert_eq!(ix.title(), "t");
    }
}

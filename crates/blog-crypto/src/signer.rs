use async_trait::async_trait;
use blog_types::{PublicIdentity, TxSignature};
use ed25519_dalek::{Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};

use crate::error::{SignatureError, SignerError};

/// Secret half of an identity keypair. Never printed.
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Public half of an identity keypair.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Signature over a transaction message. Serialized as the hex of its
/// 64 bytes, the same form as [`TxSignature`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TxSignature", from = "TxSignature")]
pub struct Signature(ed25519_dalek::Signature);

impl SigningKey {
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&secret))
    }

    /// Parse the contents of a keypair file: 64 hex digits, surrounding
    /// whitespace ignored.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        hex::decode(s.trim())
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .map(Self::from_bytes)
            .ok_or(SignatureError::InvalidKey)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// The identity records signed with this key are owned by.
    pub fn identity(&self) -> PublicIdentity {
        self.verifying_key().to_identity()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Keypair file contents.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl VerifyingKey {
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    pub fn to_identity(&self) -> PublicIdentity {
        PublicIdentity::from_bytes(self.as_bytes())
    }

    /// Interpret an identity as a verifying key. Fails for identities that
    /// are not curve points, such as derived addresses.
    pub fn from_identity(identity: &PublicIdentity) -> Result<Self, SignatureError> {
        Self::from_bytes(*identity.as_bytes())
    }

    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| SignatureError::InvalidKey)
    }
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(&bytes))
    }

    /// The transaction id this signature stands for when it is the first
    /// signature of a transaction.
    pub fn to_tx_signature(&self) -> TxSignature {
        TxSignature::from_bytes(self.to_bytes())
    }
}

impl From<Signature> for TxSignature {
    fn from(signature: Signature) -> Self {
        signature.to_tx_signature()
    }
}

impl From<TxSignature> for Signature {
    fn from(signature: TxSignature) -> Self {
        Self::from_bytes(*signature.as_bytes())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey({}, secret hidden)", self.identity().short_id())
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", self.to_identity())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tx = self.to_tx_signature().to_hex();
        write!(f, "Signature({}..)", &tx[..16])
    }
}

/// Signing capability of a connected wallet.
///
/// The caller names the identity it acts as; a signer that holds no key for
/// that identity, or whose user declines, returns
/// [`SignerError::Rejected`]. Signing may suspend (e.g. on a user prompt).
#[async_trait]
pub trait Signer: Send + Sync {
    /// Identities this signer can sign for.
    fn identities(&self) -> Vec<PublicIdentity>;

    /// Sign `message` as `identity`.
    async fn sign(
        &self,
        identity: &PublicIdentity,
        message: &[u8],
    ) -> Result<Signature, SignerError>;
}

/// [`Signer`] backed by a single in-process keypair.
#[derive(Debug)]
pub struct KeypairSigner {
    key: SigningKey,
}

impl KeypairSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Signer with a freshly generated key.
    pub fn generate() -> Self {
        Self::new(SigningKey::generate())
    }

    pub fn identity(&self) -> PublicIdentity {
        self.key.identity()
    }
}

#[async_trait]
impl Signer for KeypairSigner {
    fn identities(&self) -> Vec<PublicIdentity> {
        vec![self.identity()]
    }

    async fn sign(
        &self,
        identity: &PublicIdentity,
        message: &[u8],
    ) -> Result<Signature, SignerError> {
        if *identity != self.identity() {
            return Err(SignerError::Rejected {
                identity: *identity,
                reason: "no key held for identity".into(),
            });
        }
        Ok(self.key.sign(message))
    }
}

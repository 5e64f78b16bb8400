use blog_crypto::Discriminator;
use blog_types::{RecordState, StorageAddress};

use crate::error::{ErrorCode, StoreError, StoreResult};
use crate::instruction::BlogInstruction;

/// Account type name blog entries are stored under.
pub const ACCOUNT_TYPE_NAME: &str = "BlogEntryState";

/// Translates between records/instructions and the ledger's byte layout.
///
/// The layout is fixed by the on-ledger program; the client and the ledger
/// must use the same codec.
pub trait Codec: Send + Sync {
    /// Tag at the start of every blog entry account.
    fn account_discriminator(&self) -> Discriminator;

    fn encode_record(&self, record: &RecordState) -> StoreResult<Vec<u8>>;

    /// Decode account bytes fetched from `address`.
    fn decode_record(&self, address: &StorageAddress, data: &[u8]) -> StoreResult<RecordState>;

    fn encode_instruction(&self, instruction: &BlogInstruction) -> StoreResult<Vec<u8>>;

    /// Decode instruction data. Failures carry the native code the ledger
    /// reports for them.
    fn decode_instruction(&self, data: &[u8]) -> StoreResult<BlogInstruction>;
}

/// Layout: `[8-byte discriminator][bincode payload]`.
///
/// Records are encoded as `(owner, title, description)`; instruction
/// arguments as a tuple in declaration order.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    fn tagged<T: serde::Serialize>(tag: Discriminator, value: &T) -> StoreResult<Vec<u8>> {
        let payload =
            bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut buf = Vec::with_capacity(Discriminator::LEN + payload.len());
        buf.extend_from_slice(tag.as_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    fn args<'a, T: serde::Deserialize<'a>>(payload: &'a [u8]) -> StoreResult<T> {
        bincode::deserialize(payload).map_err(|e| {
            StoreError::program(ErrorCode::InstructionDidNotDeserialize, e.to_string())
        })
    }
}

impl Codec for BincodeCodec {
    fn account_discriminator(&self) -> Discriminator {
        Discriminator::account(ACCOUNT_TYPE_NAME)
    }

    fn encode_record(&self, record: &RecordState) -> StoreResult<Vec<u8>> {
        Self::tagged(self.account_discriminator(), record)
    }

    fn decode_record(&self, address: &StorageAddress, data: &[u8]) -> StoreResult<RecordState> {
        if !self.account_discriminator().matches(data) {
            return Err(StoreError::CorruptAccount {
                address: *address,
                reason: "account discriminator mismatch".into(),
            });
        }
        bincode::deserialize(&data[Discriminator::LEN..]).map_err(|e| {
            StoreError::CorruptAccount {
                address: *address,
                reason: e.to_string(),
            }
        })
    }

    fn encode_instruction(&self, instruction: &BlogInstruction) -> StoreResult<Vec<u8>> {
        let tag = Discriminator::instruction(instruction.name());
        match instruction {
            BlogInstruction::CreateBlog { title, description } => {
                Self::tagged(tag, &(title, description))
            }
            BlogInstruction::UpdateBlog {
                title,
                new_description,
            } => Self::tagged(tag, &(title, new_description)),
            BlogInstruction::DeleteBlog { title } => Self::tagged(tag, &(title,)),
        }
    }

    fn decode_instruction(&self, data: &[u8]) -> StoreResult<BlogInstruction> {
        if data.len() < Discriminator::LEN {
            return Err(StoreError::program(
                ErrorCode::InstructionFallbackNotFound,
                "instruction data shorter than discriminator",
            ));
        }
        let (tag, payload) = data.split_at(Discriminator::LEN);
        if tag == Discriminator::instruction("create_blog").as_bytes() {
            let (title, description): (String, String) = Self::args(payload)?;
            Ok(BlogInstruction::CreateBlog { title, description })
        } else if tag == Discriminator::instruction("update_blog").as_bytes() {
            let (title, new_description): (String, String) = Self::args(payload)?;
            Ok(BlogInstruction::UpdateBlog {
                title,
                new_description,
            })
        } else if tag == Discriminator::instruction("delete_blog").as_bytes() {
            let (title,): (String,) = Self::args(payload)?;
            Ok(BlogInstruction::DeleteBlog { title })
        } else {
            Err(StoreError::program(
                ErrorCode::InstructionFallbackNotFound,
                "unknown instruction discriminator",
            ))
        }
    }
}

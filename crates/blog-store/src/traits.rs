use async_trait::async_trait;
use blog_crypto::Discriminator;
use blog_types::{ProgramId, StorageAddress};

use crate::error::StoreResult;
use crate::instruction::{Confirmation, SignedTransaction};

/// Connection to the ledger holding blog accounts.
///
/// Implementations must satisfy these rules:
/// - `submit` returns only once the transaction is confirmed, or with the
///   reason it never will be. A transaction handed to `submit` cannot be
///   recalled, even if the caller stops waiting.
/// - A missing account is `Ok(None)`, never an error; errors mean the
///   store could not answer.
/// - Reads never observe a partially applied transaction.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human-readable endpoint this store talks to, e.g. an RPC URL.
    fn endpoint(&self) -> String;

    /// Submit a signed transaction and wait for confirmation.
    async fn submit(&self, transaction: &SignedTransaction) -> StoreResult<Confirmation>;

    /// Raw bytes of the account at `address`, if one exists.
    async fn fetch_account(&self, address: &StorageAddress) -> StoreResult<Option<Vec<u8>>>;

    /// Every account owned by `program_id` whose data starts with `type_tag`,
    /// in the store's natural order.
    async fn fetch_all_by_type(
        &self,
        program_id: &ProgramId,
        type_tag: &Discriminator,
    ) -> StoreResult<Vec<(StorageAddress, Vec<u8>)>>;

    /// Whether `program_id` is deployed on this store.
    async fn program_exists(&self, program_id: &ProgramId) -> StoreResult<bool>;
}

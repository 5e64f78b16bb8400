use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use blog_crypto::{AddressResolver, Discriminator, ResolveError};
use blog_types::{
    ProgramId, PublicIdentity, RecordState, StorageAddress, TxSignature, MAX_DESCRIPTION_LEN,
    NAMESPACE_TAG,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{BincodeCodec, Codec};
use crate::error::{ErrorCode, StoreError, StoreResult};
use crate::instruction::{BlogInstruction, Confirmation, EntryAccounts, SignedTransaction};
use crate::traits::RemoteStore;

/// An account as the ledger stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    /// Program that owns (and alone may modify) the account.
    pub program_id: ProgramId,
    pub data: Vec<u8>,
}

/// Serializable image of an [`InMemoryLedger`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub slot: u64,
    pub programs: Vec<ProgramId>,
    pub accounts: Vec<(StorageAddress, StoredAccount)>,
    /// Signatures of every executed transaction, so a reloaded ledger still
    /// refuses replays.
    #[serde(default)]
    pub processed: Vec<TxSignature>,
}

#[derive(Default)]
struct LedgerState {
    slot: u64,
    programs: BTreeSet<ProgramId>,
    accounts: BTreeMap<StorageAddress, StoredAccount>,
    processed: HashSet<TxSignature>,
}

/// Local ledger that executes the blog program in memory.
///
/// Transactions are applied atomically under a single write lock: every check
/// runs before any state changes, so a rejected transaction leaves no trace.
/// Confirmation is immediate. Accounts are returned in address order.
pub struct InMemoryLedger {
    endpoint: String,
    state: RwLock<LedgerState>,
    codec: BincodeCodec,
}

impl InMemoryLedger {
    /// Create an empty ledger with no programs deployed.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: RwLock::new(LedgerState::default()),
            codec: BincodeCodec,
        }
    }

    /// Builder-style [`deploy`](Self::deploy).
    pub fn with_program(self, program_id: ProgramId) -> Self {
        self.deploy(program_id);
        self
    }

    /// Deploy the blog program under `program_id`.
    pub fn deploy(&self, program_id: ProgramId) {
        let mut state = self.state.write().expect("lock poisoned");
        if state.programs.insert(program_id) {
            info!(program = %program_id, endpoint = %self.endpoint, "program deployed");
        }
    }

    /// Number of live accounts.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot of the most recently confirmed transaction.
    pub fn slot(&self) -> u64 {
        self.state.read().expect("lock poisoned").slot
    }

    /// Execute a signed transaction and return its confirmation.
    pub fn process(&self, transaction: &SignedTransaction) -> StoreResult<Confirmation> {
        let signature = transaction.signature().ok_or_else(|| {
            StoreError::program(ErrorCode::ConstraintSigner, "transaction carries no signatures")
        })?;
        let instruction = &transaction.message.instruction;
        let program_id = instruction.program_id;

        let mut state = self.state.write().expect("lock poisoned");
        if state.processed.contains(&signature) {
            return Err(StoreError::program(
                ErrorCode::AlreadyProcessed,
                format!("transaction {signature} already processed"),
            ));
        }
        if !state.programs.contains(&program_id) {
            return Err(StoreError::program(
                ErrorCode::ProgramNotFound,
                format!("program {program_id} is not deployed"),
            ));
        }
        transaction.verify()?;
        let ix = self.codec.decode_instruction(&instruction.data)?;
        check_seeds(&program_id, &instruction.accounts, ix.title())?;

        let mut logs = vec![
            format!("Program {program_id} invoke"),
            format!("Instruction: {}", ix.name()),
        ];
        self.execute(&mut state, &program_id, &instruction.accounts, &ix, &mut logs)?;

        state.slot += 1;
        state.processed.insert(signature);
        logs.push(format!("Program {program_id} success"));
        debug!(
            signature = %signature,
            slot = state.slot,
            instruction = ix.name(),
            address = %instruction.accounts.blog_entry,
            "transaction confirmed"
        );
        Ok(Confirmation {
            signature,
            slot: state.slot,
            logs,
        })
    }

    fn execute(
        &self,
        state: &mut LedgerState,
        program_id: &ProgramId,
        accounts: &EntryAccounts,
        ix: &BlogInstruction,
        logs: &mut Vec<String>,
    ) -> StoreResult<()> {
        let address = accounts.blog_entry;
        match ix {
            BlogInstruction::CreateBlog { title, description } => {
                check_description(description)?;
                if state.accounts.contains_key(&address) {
                    return Err(StoreError::program(
                        ErrorCode::AccountAlreadyInUse,
                        format!("account {address} already in use"),
                    ));
                }
                let record = RecordState::new(accounts.owner, title.clone(), description.clone());
                let data = self.codec.encode_record(&record)?;
                state.accounts.insert(
                    address,
                    StoredAccount {
                        program_id: *program_id,
                        data,
                    },
                );
                logs.push(format!("Title: {title}"));
                logs.push(format!("Description: {description}"));
            }
            BlogInstruction::UpdateBlog {
                title,
                new_description,
            } => {
                check_description(new_description)?;
                let mut record = self.load_owned(state, program_id, &address, &accounts.owner)?;
                record.description = new_description.clone();
                let data = self.codec.encode_record(&record)?;
                if let Some(account) = state.accounts.get_mut(&address) {
                    account.data = data;
                }
                logs.push(format!("Updated entry: {title}"));
                logs.push(format!("New description: {new_description}"));
            }
            BlogInstruction::DeleteBlog { title } => {
                self.load_owned(state, program_id, &address, &accounts.owner)?;
                state.accounts.remove(&address);
                logs.push(format!("Deleted entry: {title}"));
            }
        }
        Ok(())
    }

    /// Decode the record at `address`, checking program and owner.
    fn load_owned(
        &self,
        state: &LedgerState,
        program_id: &ProgramId,
        address: &StorageAddress,
        owner: &PublicIdentity,
    ) -> StoreResult<RecordState> {
        let account = state
            .accounts
            .get(address)
            .filter(|a| a.program_id == *program_id)
            .ok_or_else(|| {
                StoreError::program(
                    ErrorCode::AccountNotInitialized,
                    format!("no blog entry at {address}"),
                )
            })?;
        let record = self
            .codec
            .decode_record(address, &account.data)
            .map_err(|e| StoreError::program(ErrorCode::AccountDiscriminatorMismatch, e.to_string()))?;
        if record.owner != *owner {
            return Err(StoreError::program(
                ErrorCode::ConstraintHasOne,
                format!("entry {address} is not owned by {owner}"),
            ));
        }
        Ok(record)
    }

    /// Capture the current state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().expect("lock poisoned");
        LedgerSnapshot {
            slot: state.slot,
            programs: state.programs.iter().copied().collect(),
            accounts: state
                .accounts
                .iter()
                .map(|(addr, account)| (*addr, account.clone()))
                .collect(),
            processed: {
                let mut processed: Vec<_> = state.processed.iter().copied().collect();
                processed.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
                processed
            },
        }
    }

    /// Rebuild a ledger from a snapshot.
    pub fn from_snapshot(endpoint: impl Into<String>, snapshot: LedgerSnapshot) -> Self {
        let ledger = Self::new(endpoint);
        {
            let mut state = ledger.state.write().expect("lock poisoned");
            state.slot = snapshot.slot;
            state.programs = snapshot.programs.into_iter().collect();
            state.accounts = snapshot.accounts.into_iter().collect();
            state.processed = snapshot.processed.into_iter().collect();
        }
        ledger
    }

    /// Write the current state to `path` as JSON.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(&self.snapshot())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "ledger snapshot saved");
        Ok(())
    }

    /// Load a ledger previously written by [`save`](Self::save).
    pub fn load(endpoint: impl Into<String>, path: &Path) -> StoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self::from_snapshot(endpoint, snapshot))
    }
}

fn check_seeds(program_id: &ProgramId, accounts: &EntryAccounts, title: &str) -> StoreResult<()> {
    let (derived, _) = AddressResolver::find_program_address(
        &[
            NAMESPACE_TAG.as_bytes(),
            &accounts.owner.as_bytes()[..],
            title.as_bytes(),
        ],
        program_id,
    )
    .map_err(|e| match e {
        ResolveError::InvalidKey(_) => {
            StoreError::program(ErrorCode::MaxSeedLengthExceeded, e.to_string())
        }
        other => StoreError::program(ErrorCode::ConstraintSeeds, other.to_string()),
    })?;
    if derived != accounts.blog_entry {
        return Err(StoreError::program(
            ErrorCode::ConstraintSeeds,
            format!(
                "account {} does not match seeds (expected {derived})",
                accounts.blog_entry
            ),
        ));
    }
    Ok(())
}

fn check_description(description: &str) -> StoreResult<()> {
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(StoreError::program(
            ErrorCode::DescriptionTooLong,
            format!(
                "description is {} bytes, limit is {MAX_DESCRIPTION_LEN}",
                description.len()
            ),
        ));
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for InMemoryLedger {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn submit(&self, transaction: &SignedTransaction) -> StoreResult<Confirmation> {
        self.process(transaction)
    }

    async fn fetch_account(&self, address: &StorageAddress) -> StoreResult<Option<Vec<u8>>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.accounts.get(address).map(|a| a.data.clone()))
    }

    async fn fetch_all_by_type(
        &self,
        program_id: &ProgramId,
        type_tag: &Discriminator,
    ) -> StoreResult<Vec<(StorageAddress, Vec<u8>)>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .accounts
            .iter()
            .filter(|(_, a)| a.program_id == *program_id && type_tag.matches(&a.data))
            .map(|(addr, a)| (*addr, a.data.clone()))
            .collect())
    }

    async fn program_exists(&self, program_id: &ProgramId) -> StoreResult<bool> {
        Ok(self
            .state
            .read()
            .expect("lock poisoned")
            .programs
            .contains(program_id))
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("endpoint", &self.endpoint)
            .field("account_count", &self.len())
            .field("slot", &self.slot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Instruction, UnsignedTransaction};
    use blog_crypto::SigningKey;

    const PROGRAM: ProgramId = ProgramId::from_bytes([9; 32]);

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new("memory://test").with_program(PROGRAM)
    }

    fn address(owner: &PublicIdentity, title: &str) -> StorageAddress {
        AddressResolver::new(PROGRAM)
            .resolve(NAMESPACE_TAG, owner, title)
            .unwrap()
    }

    fn signed_as(
        key: &SigningKey,
        owner: PublicIdentity,
        blog_entry: StorageAddress,
        ix: &BlogInstruction,
    ) -> SignedTransaction {
        let tx = UnsignedTransaction::new(Instruction {
            program_id: PROGRAM,
            accounts: EntryAccounts { blog_entry, owner },
            data: BincodeCodec.encode_instruction(ix).unwrap(),
        });
        let sig = key.sign(&tx.message_bytes().unwrap());
        tx.into_signed(vec![(owner, sig)])
    }

    fn signed(key: &SigningKey, ix: BlogInstruction) -> SignedTransaction {
        let owner = key.identity();
        signed_as(key, owner, address(&owner, ix.title()), &ix)
    }

    fn create(title: &str, description: &str) -> BlogInstruction {
        BlogInstruction::CreateBlog {
            title: title.into(),
            description: description.into(),
        }
    }

    fn stored(ledger: &InMemoryLedger, addr: &StorageAddress) -> Option<RecordState> {
        let state = ledger.state.read().unwrap();
        state
            .accounts
            .get(addr)
            .map(|a| BincodeCodec.decode_record(addr, &a.data).unwrap())
    }

    #[test]
    fn create_stores_record_at_derived_address() {
        let ledger = ledger();
        let key = SigningKey::generate();
        let confirmation = ledger.process(&signed(&key, create("Hello", "First post"))).unwrap();
        assert_eq!(confirmation.slot, 1);
        assert!(confirmation.logs.iter().any(|l| l == "Title: Hello"));

        let record = stored(&ledger, &address(&key.identity(), "Hello")).unwrap();
        assert_eq!(record, RecordState::new(key.identity(), "Hello", "First post"));
    }

    #[test]
    fn duplicate_create_is_rejected_without_changes() {
        let ledger = ledger();
        let key = SigningKey::generate();
        ledger.process(&signed(&key, create("Hello", "First post"))).unwrap();
        let before = ledger.snapshot();

        let err = ledger.process(&signed(&key, create("Hello", "Other"))).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AccountAlreadyInUse));
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn update_changes_description_only() {
        let ledger = ledger();
        let key = SigningKey::generate();
        ledger.process(&signed(&key, create("Hello", "First post"))).unwrap();
        ledger
            .process(&signed(
                &key,
                BlogInstruction::UpdateBlog {
                    title: "Hello".into(),
                    new_description: "Edited".into(),
                },
            ))
            .unwrap();
        let record = stored(&ledger, &address(&key.identity(), "Hello")).unwrap();
        assert_eq!(record.title, "Hello");
        assert_eq!(record.description, "Edited");
        assert_eq!(record.owner, key.identity());
    }

    #[test]
    fn update_missing_entry_is_not_initialized() {
        let ledger = ledger();
        let key = SigningKey::generate();
        let err = ledger
            .process(&signed(
                &key,
                BlogInstruction::UpdateBlog {
                    title: "Nope".into(),
                    new_description: "x".into(),
                },
            ))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AccountNotInitialized));
    }

    #[test]
    fn delete_closes_account_and_allows_recreate() {
        let ledger = ledger();
        let key = SigningKey::generate();
        ledger.process(&signed(&key, create("Hello", "First post"))).unwrap();
        ledger
            .process(&signed(&key, BlogInstruction::DeleteBlog { title: "Hello".into() }))
            .unwrap();
        assert!(ledger.is_empty());
        ledger.process(&signed(&key, create("Hello", "Second life"))).unwrap();
        let record = stored(&ledger, &address(&key.identity(), "Hello")).unwrap();
        assert_eq!(record.description, "Second life");
    }

    #[test]
    fn forged_owner_fails_signature_check() {
        let ledger = ledger();
        let alice = SigningKey::generate();
        let mallory = SigningKey::generate();
        ledger.process(&signed(&alice, create("Hello", "First post"))).unwrap();

        let ix = BlogInstruction::UpdateBlog {
            title: "Hello".into(),
            new_description: "pwned".into(),
        };
        let owner = alice.identity();
        let tx = signed_as(&mallory, owner, address(&owner, "Hello"), &ix);
        let err = ledger.process(&tx).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::SignatureVerificationFailed));
        assert_eq!(
            stored(&ledger, &address(&owner, "Hello")).unwrap().description,
            "First post"
        );
    }

    #[test]
    fn wrong_address_fails_seed_check() {
        let ledger = ledger();
        let key = SigningKey::generate();
        let ix = create("Hello", "First post");
        let tx = signed_as(&key, key.identity(), address(&key.identity(), "Other"), &ix);
        assert_eq!(
            ledger.process(&tx).unwrap_err().code(),
            Some(ErrorCode::ConstraintSeeds)
        );
    }

    #[test]
    fn oversized_fields_are_rejected() {
        let ledger = ledger();
        let key = SigningKey::generate();
        let owner = key.identity();
        let long_title = "t".repeat(40);
        let tx = signed_as(
            &key,
            owner,
            StorageAddress::from_bytes([0; 32]),
            &create(&long_title, "d"),
        );
        assert_eq!(
            ledger.process(&tx).unwrap_err().code(),
            Some(ErrorCode::MaxSeedLengthExceeded)
        );

        let tx = signed(&key, create("Hello", &"d".repeat(MAX_DESCRIPTION_LEN + 1)));
        assert_eq!(
            ledger.process(&tx).unwrap_err().code(),
            Some(ErrorCode::DescriptionTooLong)
        );
    }

    #[test]
    fn replayed_transaction_is_rejected() {
        let ledger = ledger();
        let key = SigningKey::generate();
        let tx = signed(&key, create("Hello", "First post"));
        ledger.process(&tx).unwrap();
        ledger
            .process(&signed(&key, BlogInstruction::DeleteBlog { title: "Hello".into() }))
            .unwrap();
        assert_eq!(
            ledger.process(&tx).unwrap_err().code(),
            Some(ErrorCode::AlreadyProcessed)
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn missing_program_rejects_transactions() {
        let ledger = InMemoryLedger::new("memory://empty");
        let key = SigningKey::generate();
        assert_eq!(
            ledger
                .process(&signed(&key, create("Hello", "x")))
                .unwrap_err()
                .code(),
            Some(ErrorCode::ProgramNotFound)
        );
    }

    #[tokio::test]
    async fn fetch_all_filters_by_program_and_type() {
        let ledger = ledger();
        let key = SigningKey::generate();
        ledger.process(&signed(&key, create("One", "1"))).unwrap();
        ledger.process(&signed(&key, create("Two", "2"))).unwrap();
        {
            let mut state = ledger.state.write().unwrap();
            state.accounts.insert(
                StorageAddress::from_bytes([1; 32]),
                StoredAccount {
                    program_id: PROGRAM,
                    data: Discriminator::account("Other").as_bytes().to_vec(),
                },
            );
            state.accounts.insert(
                StorageAddress::from_bytes([2; 32]),
                StoredAccount {
                    program_id: ProgramId::from_bytes([1; 32]),
                    data: BincodeCodec
                        .encode_record(&RecordState::new(key.identity(), "x", "y"))
                        .unwrap(),
                },
            );
        }
        let all = ledger
            .fetch_all_by_type(&PROGRAM, &BincodeCodec.account_discriminator())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(ledger.program_exists(&PROGRAM).await.unwrap());
        assert!(!ledger
            .program_exists(&ProgramId::from_bytes([0; 32]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn fetch_missing_account_is_none() {
        let ledger = ledger();
        assert_eq!(
            ledger
                .fetch_account(&StorageAddress::from_bytes([5; 32]))
                .await
                .unwrap(),
            None
        );
    }

    #[test]
    fn snapshot_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = ledger();
        let key = SigningKey::generate();
        ledger.process(&signed(&key, create("Hello", "First post"))).unwrap();
        ledger.save(&path).unwrap();

        let reloaded = InMemoryLedger::load("memory://test", &path).unwrap();
        assert_eq!(reloaded.snapshot(), ledger.snapshot());
        assert_eq!(reloaded.slot(), 1);
    }

    #[test]
    fn reloaded_ledger_still_rejects_replays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = ledger();
        let key = SigningKey::generate();
        let tx = signed(&key, create("Hello", "First post"));
        ledger.process(&tx).unwrap();
        ledger
            .process(&signed(&key, BlogInstruction::DeleteBlog { title: "Hello".into() }))
            .unwrap();
        ledger.save(&path).unwrap();

        let reloaded = InMemoryLedger::load("memory://test", &path).unwrap();
        assert_eq!(reloaded.snapshot().processed.len(), 2);
        assert_eq!(
            reloaded.process(&tx).unwrap_err().code(),
            Some(ErrorCode::AlreadyProcessed)
        );
        assert!(reloaded.is_empty());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = InMemoryLedger::load("memory://x", &dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}

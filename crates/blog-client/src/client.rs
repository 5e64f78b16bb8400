use std::sync::Arc;
use std::time::Duration;

use blog_crypto::{AddressResolver, Signer};
use blog_store::{
    BincodeCodec, BlogInstruction, Codec, Confirmation, EntryAccounts, Instruction, RemoteStore,
    UnsignedTransaction,
};
use blog_types::{
    validate_description, validate_title, ProgramId, PublicIdentity, RecordState,
    StorageAddress, NAMESPACE_TAG,
};
use tracing::{debug, info, warn};

use crate::cache::{
    CacheFilter, CacheSubscription, CachedValue, ProgramPresence, QueryCache, QueryKey,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// CRUD façade for blog entries on one ledger endpoint.
///
/// Reads are served from the [`QueryCache`] when a fresh entry exists and
/// fetched from the store otherwise. Writes run resolve → build → sign →
/// submit → confirm, and only after confirmation invalidate and refetch the
/// `All` key and the record's own key. A failed write leaves the cache
/// exactly as it was.
///
/// Several operations may be in flight on one client at once. Once a
/// transaction has been handed to the store it cannot be recalled: dropping
/// the future of a pending write abandons the wait, not the write. Nothing is
/// retried implicitly.
pub struct RecordClient {
    config: ClientConfig,
    program_id: ProgramId,
    resolver: AddressResolver,
    endpoint: String,
    store: Arc<dyn RemoteStore>,
    signer: Arc<dyn Signer>,
    codec: Arc<dyn Codec>,
    cache: QueryCache,
}

impl RecordClient {
    /// Build a client for `store`, signing with `signer`.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn RemoteStore>,
        signer: Arc<dyn Signer>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let program_id = config.program_id()?;
        let endpoint = store.endpoint();
        info!(
            endpoint = %endpoint,
            program = %program_id,
            cluster = config.cluster.name(),
            "record client ready"
        );
        Ok(Self {
            program_id,
            resolver: AddressResolver::new(program_id),
            endpoint,
            store,
            signer,
            codec: Arc::new(BincodeCodec),
            cache: QueryCache::new(config.channel_capacity),
            config,
        })
    }

    /// Replace the account codec.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn program_id(&self) -> &ProgramId {
        &self.program_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// The identity writes act as when the caller names none: the first
    /// identity the signer holds a key for.
    pub fn default_owner(&self) -> Option<PublicIdentity> {
        self.signer.identities().first().copied()
    }

    // ---- Cache keys ----

    pub fn all_key(&self) -> QueryKey {
        QueryKey::All {
            endpoint: self.endpoint.clone(),
        }
    }

    pub fn record_key(&self, address: StorageAddress) -> QueryKey {
        QueryKey::Record {
            endpoint: self.endpoint.clone(),
            address,
        }
    }

    pub fn presence_key(&self) -> QueryKey {
        QueryKey::ProgramPresence {
            endpoint: self.endpoint.clone(),
        }
    }

    /// Derived address of `(owner, title)`. Pure; no network access.
    pub fn address_of(&self, owner: &PublicIdentity, title: &str) -> ClientResult<StorageAddress> {
        Ok(self.resolver.resolve(NAMESPACE_TAG, owner, title)?)
    }

    // ---- Reads ----

    /// Every live blog entry, in the store's order. Empty, not an error, when
    /// there are none.
    pub async fn list_all(&self) -> ClientResult<Vec<(StorageAddress, RecordState)>> {
        let key = self.all_key();
        if let Some(CachedValue::All(records)) = self.cache.get_fresh(&key) {
            return Ok(records);
        }
        self.fetch_all(&key).await
    }

    /// The entry at `address`, or [`ClientError::NotFound`].
    pub async fn get_one(&self, address: &StorageAddress) -> ClientResult<RecordState> {
        let key = self.record_key(*address);
        if let Some(CachedValue::Record(record)) = self.cache.get_fresh(&key) {
            return Ok(record);
        }
        self.fetch_one(&key, address).await
    }

    /// Whether the blog program is deployed on this endpoint. Check this
    /// before reading meaning into an empty [`list_all`](Self::list_all).
    pub async fn program_presence(&self) -> ClientResult<ProgramPresence> {
        let key = self.presence_key();
        if let Some(CachedValue::Presence(presence)) = self.cache.get_fresh(&key) {
            return Ok(presence);
        }
        self.fetch_presence(&key).await
    }

    async fn fetch_all(&self, key: &QueryKey) -> ClientResult<Vec<(StorageAddress, RecordState)>> {
        let generation = self.cache.begin_fetch(key);
        match self.load_all().await {
            Ok(records) => {
                debug!(count = records.len(), endpoint = %self.endpoint, "fetched all records");
                self.cache
                    .complete_fetch(key, generation, CachedValue::All(records.clone()));
                Ok(records)
            }
            Err(err) => {
                self.cache.abandon_fetch(key, generation);
                Err(err)
            }
        }
    }

    async fn load_all(&self) -> ClientResult<Vec<(StorageAddress, RecordState)>> {
        let raw = self
            .store
            .fetch_all_by_type(&self.program_id, &self.codec.account_discriminator())
            .await?;
        Ok(raw
            .into_iter()
            .map(|(address, data)| {
                self.codec
                    .decode_record(&address, &data)
                    .map(|record| (address, record))
            })
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn fetch_one(&self, key: &QueryKey, address: &StorageAddress) -> ClientResult<RecordState> {
        let generation = self.cache.begin_fetch(key);
        match self.load_one(address).await {
            Ok(Some(record)) => {
                self.cache
                    .complete_fetch(key, generation, CachedValue::Record(record.clone()));
                Ok(record)
            }
            Ok(None) => {
                self.cache.remove_if_current(key, generation);
                Err(ClientError::NotFound(*address))
            }
            Err(err) => {
                self.cache.abandon_fetch(key, generation);
                Err(err)
            }
        }
    }

    async fn load_one(&self, address: &StorageAddress) -> ClientResult<Option<RecordState>> {
        match self.store.fetch_account(address).await? {
            Some(data) => Ok(Some(self.codec.decode_record(address, &data)?)),
            None => Ok(None),
        }
    }

    async fn fetch_presence(&self, key: &QueryKey) -> ClientResult<ProgramPresence> {
        let generation = self.cache.begin_fetch(key);
        let exists = match self.store.program_exists(&self.program_id).await {
            Ok(exists) => exists,
            Err(err) => {
                self.cache.abandon_fetch(key, generation);
                return Err(err.into());
            }
        };
        let presence = if exists {
            ProgramPresence::Present
        } else {
            ProgramPresence::Absent
        };
        self.cache
            .complete_fetch(key, generation, CachedValue::Presence(presence));
        Ok(presence)
    }

    // ---- Writes ----

    /// Create the entry `(owner, title)`. Fails with
    /// [`ClientError::AlreadyExists`] if it is already live.
    pub async fn create(
        &self,
        title: &str,
        description: &str,
        owner: &PublicIdentity,
    ) -> ClientResult<Confirmation> {
        validate_title(title)?;
        validate_description(description)?;
        let address = self.address_of(owner, title)?;
        let ix = BlogInstruction::CreateBlog {
            title: title.to_string(),
            description: description.to_string(),
        };
        let confirmation = self.submit(owner, address, &ix).await?;
        self.after_write(address).await;
        Ok(confirmation)
    }

    /// Replace the description of the entry at `address`.
    ///
    /// `address` must be the derived address of `(owner, title)`; a stale or
    /// forged address is rejected with [`ClientError::KeyMismatch`] before
    /// anything is signed.
    pub async fn update(
        &self,
        address: &StorageAddress,
        title: &str,
        new_description: &str,
        owner: &PublicIdentity,
    ) -> ClientResult<Confirmation> {
        validate_title(title)?;
        validate_description(new_description)?;
        let expected = self.address_of(owner, title)?;
        if expected != *address {
            return Err(ClientError::KeyMismatch {
                expected,
                actual: *address,
            });
        }
        let ix = BlogInstruction::UpdateBlog {
            title: title.to_string(),
            new_description: new_description.to_string(),
        };
        let confirmation = self.submit(owner, expected, &ix).await?;
        self.after_write(expected).await;
        Ok(confirmation)
    }

    /// Close the entry `(owner, title)`. Its key may be created again later.
    pub async fn delete(&self, title: &str, owner: &PublicIdentity) -> ClientResult<Confirmation> {
        validate_title(title)?;
        let address = self.address_of(owner, title)?;
        let ix = BlogInstruction::DeleteBlog {
            title: title.to_string(),
        };
        let confirmation = self.submit(owner, address, &ix).await?;
        self.after_write(address).await;
        Ok(confirmation)
    }

    /// Build, sign and submit `ix`, waiting for confirmation.
    async fn submit(
        &self,
        owner: &PublicIdentity,
        address: StorageAddress,
        ix: &BlogInstruction,
    ) -> ClientResult<Confirmation> {
        let data = self
            .codec
            .encode_instruction(ix)
            .map_err(|e| ClientError::SubmissionFailed(e.to_string()))?;
        let tx = UnsignedTransaction::new(Instruction {
            program_id: self.program_id,
            accounts: EntryAccounts {
                blog_entry: address,
                owner: *owner,
            },
            data,
        });
        let message = tx
            .message_bytes()
            .map_err(|e| ClientError::SubmissionFailed(e.to_string()))?;

        let mut signatures = Vec::new();
        for identity in tx.required_signers() {
            let signature = self.signer.sign(&identity, &message).await?;
            signatures.push((identity, signature));
        }
        let signed = tx.into_signed(signatures);

        debug!(instruction = ix.name(), address = %address, "submitting transaction");
        let timeout_ms = self.config.confirm_timeout_ms;
        let confirmation =
            match tokio::time::timeout(Duration::from_millis(timeout_ms), self.store.submit(&signed))
                .await
            {
                Ok(Ok(confirmation)) => confirmation,
                Ok(Err(err)) => {
                    warn!(instruction = ix.name(), address = %address, error = %err, "transaction failed");
                    return Err(ClientError::from_submission(err, address));
                }
                Err(_) => {
                    warn!(instruction = ix.name(), address = %address, timeout_ms, "confirmation timed out");
                    return Err(ClientError::SubmissionFailed(format!(
                        "confirmation timed out after {timeout_ms} ms"
                    )));
                }
            };
        info!(
            signature = %confirmation.signature,
            slot = confirmation.slot,
            instruction = ix.name(),
            "transaction confirmed"
        );
        Ok(confirmation)
    }

    /// Invalidate and refetch the views a confirmed write to `address` may
    /// have changed. A failed refetch leaves the entry stale; the write
    /// itself already succeeded.
    async fn after_write(&self, address: StorageAddress) {
        let all = self.all_key();
        let one = self.record_key(address);
        self.cache.invalidate(&all);
        self.cache.invalidate(&one);

        if let Err(err) = self.fetch_all(&all).await {
            warn!(key = %all, error = %err, "refetch after write failed");
        }
        match self.fetch_one(&one, &address).await {
            Ok(_) | Err(ClientError::NotFound(_)) => {}
            Err(err) => warn!(key = %one, error = %err, "refetch after write failed"),
        }
    }

    // ---- Subscriptions ----

    /// Subscribe to cache changes. Presentation code refetches or re-reads
    /// when it sees an event for a key it displays.
    pub fn subscribe(&self, filter: CacheFilter) -> CacheSubscription {
        self.cache.subscribe(filter)
    }

    /// Refetch `key` from the store regardless of its cached state.
    pub async fn refetch(&self, key: &QueryKey) -> ClientResult<()> {
        if key.endpoint() != self.endpoint {
            return Err(ClientError::Config(format!(
                "key {key} belongs to another endpoint than {}",
                self.endpoint
            )));
        }
        match key {
            QueryKey::All { .. } => self.fetch_all(key).await.map(|_| ()),
            QueryKey::Record { address, .. } => match self.fetch_one(key, address).await {
                Ok(_) | Err(ClientError::NotFound(_)) => Ok(()),
                Err(err) => Err(err),
            },
            QueryKey::ProgramPresence { .. } => self.fetch_presence(key).await.map(|_| ()),
        }
    }
}

impl std::fmt::Debug for RecordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordClient")
            .field("endpoint", &self.endpoint)
            .field("program_id", &self.program_id)
            .field("cache", &self.cache)
            .finish()
    }
}

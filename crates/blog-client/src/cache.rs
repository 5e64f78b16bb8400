use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use blog_types::{RecordState, StorageAddress};
use tokio::sync::broadcast;
use tracing::debug;

/// Whether the blog program is deployed on an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramPresence {
    Present,
    Absent,
}

/// Identifies one cached query. Every key carries the endpoint it was
/// answered by, so data from one cluster is never served for another.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Every live record.
    All { endpoint: String },
    /// One record by address.
    Record {
        endpoint: String,
        address: StorageAddress,
    },
    /// Whether the program is deployed.
    ProgramPresence { endpoint: String },
}

impl QueryKey {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::All { endpoint }
            | Self::Record { endpoint, .. }
            | Self::ProgramPresence { endpoint } => endpoint,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All { endpoint } => write!(f, "blog/all@{endpoint}"),
            Self::Record { endpoint, address } => {
                write!(f, "blog/{}@{endpoint}", address.short_hex())
            }
            Self::ProgramPresence { endpoint } => write!(f, "program@{endpoint}"),
        }
    }
}

/// A cached query result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CachedValue {
    All(Vec<(StorageAddress, RecordState)>),
    Record(RecordState),
    Presence(ProgramPresence),
}

/// A cache entry with its staleness flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedEntry {
    pub value: CachedValue,
    /// Set by invalidation; cleared when a fresh value is stored.
    pub stale: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheEventKind {
    /// The entry was marked stale; subscribers should refetch.
    Invalidated,
    /// A fresh value was stored.
    Updated,
    /// The entry was dropped (e.g. the record no longer exists).
    Removed,
}

/// Published whenever a cache entry changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: QueryKey,
    pub kind: CacheEventKind,
}

/// Filter for subscribing to a subset of cache events.
#[derive(Clone, Debug, Default)]
pub struct CacheFilter {
    /// If set, only events for keys on this endpoint are delivered.
    pub endpoint: Option<String>,
    /// If set, only events for these keys are delivered.
    pub keys: Option<Vec<QueryKey>>,
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<CacheEventKind>>,
}

impl CacheFilter {
    /// Only events for `key`.
    pub fn key(key: QueryKey) -> Self {
        Self {
            keys: Some(vec![key]),
            ..Default::default()
        }
    }

    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &CacheEvent) -> bool {
        if let Some(ref endpoint) = self.endpoint {
            if event.key.endpoint() != endpoint {
                return false;
            }
        }
        if let Some(ref keys) = self.keys {
            if !keys.contains(&event.key) {
                return false;
            }
        }
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for cache events.
pub type CacheSubscription = broadcast::Receiver<CacheEvent>;

struct Subscriber {
    filter: CacheFilter,
    sender: broadcast::Sender<CacheEvent>,
}

struct Slot {
    entry: Option<CachedEntry>,
    /// Renewed on every fetch start, invalidation and store. A fetch that
    /// started under an older generation may not overwrite the entry.
    /// Generations come from one cache-wide counter, so a slot that is
    /// dropped and recreated never reuses one.
    generation: u64,
}

/// Client-side cache of query results with change notifications.
///
/// The cache is never authoritative. Entries are created by queries, marked
/// stale by invalidation, and refreshed by refetching. Locks are held only
/// for the duration of a map operation, never across an await.
pub struct QueryCache {
    slots: RwLock<HashMap<QueryKey, Slot>>,
    subscribers: RwLock<Vec<Subscriber>>,
    channel_capacity: usize,
    generations: AtomicU64,
}

impl QueryCache {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
            channel_capacity,
            generations: AtomicU64::new(0),
        }
    }

    /// Current entry for `key`, stale or not.
    pub fn get(&self, key: &QueryKey) -> Option<CachedEntry> {
        self.slots
            .read()
            .expect("cache lock poisoned")
            .get(key)
            .and_then(|slot| slot.entry.clone())
    }

    /// Current entry for `key` if it is not stale.
    pub fn get_fresh(&self, key: &QueryKey) -> Option<CachedValue> {
        self.get(key).filter(|e| !e.stale).map(|e| e.value)
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.get(key).map(|e| e.stale).unwrap_or(false)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record that a fetch for `key` is starting. Pass the returned
    /// generation to [`complete_fetch`](Self::complete_fetch),
    /// [`remove_if_current`](Self::remove_if_current) or
    /// [`abandon_fetch`](Self::abandon_fetch); any later fetch, write or
    /// invalidation of `key` supersedes it.
    pub fn begin_fetch(&self, key: &QueryKey) -> u64 {
        let generation = self.next_generation();
        let mut slots = self.slots.write().expect("cache lock poisoned");
        slots
            .entry(key.clone())
            .or_insert(Slot {
                entry: None,
                generation,
            })
            .generation = generation;
        generation
    }

    /// Store a fetched value unless the key changed since `generation`.
    /// Returns `true` if the value was stored.
    pub fn complete_fetch(&self, key: &QueryKey, generation: u64, value: CachedValue) -> bool {
        {
            let mut slots = self.slots.write().expect("cache lock poisoned");
            match slots.get_mut(key) {
                Some(slot) if slot.generation == generation => {
                    slot.generation = self.next_generation();
                    slot.entry = Some(CachedEntry {
                        value,
                        stale: false,
                    });
                }
                _ => {
                    debug!(key = %key, "discarding result of superseded fetch");
                    return false;
                }
            }
        }
        self.publish(key, CacheEventKind::Updated);
        true
    }

    /// Store a value unconditionally.
    pub fn put(&self, key: &QueryKey, value: CachedValue) {
        let generation = self.next_generation();
        self.slots.write().expect("cache lock poisoned").insert(
            key.clone(),
            Slot {
                entry: Some(CachedEntry {
                    value,
                    stale: false,
                }),
                generation,
            },
        );
        self.publish(key, CacheEventKind::Updated);
    }

    /// Mark `key` stale. Idempotent; subscribers are notified each time.
    pub fn invalidate(&self, key: &QueryKey) {
        {
            let mut slots = self.slots.write().expect("cache lock poisoned");
            if let Some(slot) = slots.get_mut(key) {
                slot.generation = self.next_generation();
                if let Some(entry) = slot.entry.as_mut() {
                    entry.stale = true;
                }
            }
        }
        debug!(key = %key, "cache key invalidated");
        self.publish(key, CacheEventKind::Invalidated);
    }

    /// Forget `key` entirely, unless it changed since `generation`.
    /// Subscribers hear `Removed` only if an entry was dropped.
    pub fn remove_if_current(&self, key: &QueryKey, generation: u64) -> bool {
        let removed = {
            let mut slots = self.slots.write().expect("cache lock poisoned");
            match slots.get(key) {
                Some(slot) if slot.generation == generation => {
                    slots.remove(key).and_then(|slot| slot.entry).is_some()
                }
                Some(_) => return false,
                None => return true,
            }
        };
        if removed {
            self.publish(key, CacheEventKind::Removed);
        }
        true
    }

    /// A fetch begun at `generation` failed. Drops the slot it created if
    /// nothing has been stored there since; an existing entry is kept.
    pub fn abandon_fetch(&self, key: &QueryKey, generation: u64) {
        let mut slots = self.slots.write().expect("cache lock poisoned");
        if slots
            .get(key)
            .is_some_and(|slot| slot.generation == generation && slot.entry.is_none())
        {
            slots.remove(key);
        }
    }

    /// Drop every entry. Subscribers are kept.
    pub fn clear(&self) {
        self.slots.write().expect("cache lock poisoned").clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .expect("cache lock poisoned")
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with any state, including fetches in flight.
    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.slots.read().expect("cache lock poisoned").len()
    }

    /// Subscribe to cache events matching `filter`.
    pub fn subscribe(&self, filter: CacheFilter) -> CacheSubscription {
        let (tx, rx) = broadcast::channel(self.channel_capacity);
        self.subscribers
            .write()
            .expect("cache lock poisoned")
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("cache lock poisoned").len()
    }

    /// Route an event to matching subscribers, pruning closed channels.
    fn publish(&self, key: &QueryKey, kind: CacheEventKind) {
        let event = CacheEvent {
            key: key.clone(),
            kind,
        };
        let mut subs = self.subscribers.write().expect("cache lock poisoned");
        subs.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(64)
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

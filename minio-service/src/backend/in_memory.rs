//! Bounded in-memory backend.
//!
//! Objects live in a map guarded by a mutex. The total payload size is capped at a configured
//! capacity: inserting evicts the least recently used objects until the new one fits. With an
//! expiration, objects that have not been written or read for that long are dropped, both lazily
//! on access and by a periodic sweeper task.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use bytesize::ByteSize;
use tokio::time::Instant;

use super::common::{Backend, GetResponse, ObjectInfo};
use crate::error::{Result, ServiceError};
use crate::path::ObjectPath;
use crate::{PayloadStream, stream};

/// Upper bound for the interval between two expiration sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Entry {
    data: Bytes,
    /// Position of this entry in [`BoundedStore::recency`].
    tick: u64,
    accessed_at: Instant,
}

impl Entry {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn is_expired(&self, expiration: Option<Duration>, now: Instant) -> bool {
        expiration.is_some_and(|ttl| now.saturating_duration_since(self.accessed_at) >= ttl)
    }
}

/// Size-bounded map with least-recently-used eviction and time-to-idle expiration.
///
/// The store never reads the clock itself, all timestamps are passed in by the caller.
#[derive(Debug)]
pub(crate) struct BoundedStore {
    capacity: u64,
    expiration: Option<Duration>,
    used: u64,
    next_tick: u64,
    entries: HashMap<ObjectPath, Entry>,
    /// Objects ordered from least to most recently accessed.
    ///
    /// Every access moves an object to the back, so this is also the expiration order.
    recency: BTreeMap<u64, ObjectPath>,
}

impl BoundedStore {
    pub fn new(capacity: u64, expiration: Option<Duration>) -> Self {
        Self {
            capacity,
            expiration: expiration.filter(|ttl| !ttl.is_zero()),
            used: 0,
            next_tick: 0,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
        }
    }

    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    pub fn insert(&mut self, path: ObjectPath, data: Bytes, now: Instant) -> Result<()> {
        let size = data.len() as u64;
        if size > self.capacity {
            return Err(ServiceError::TooLarge {
                size: ByteSize(size),
                capacity: ByteSize(self.capacity),
            });
        }

        self.remove(&path);
        while self.used + size > self.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.used -= entry.size();
                tracing::debug!(path = %oldest, "evicted object to free capacity");
            }
        }

        let tick = self.tick();
        self.recency.insert(tick, path.clone());
        self.entries.insert(
            path,
            Entry {
                data,
                tick,
                accessed_at: now,
            },
        );
        self.used += size;

        Ok(())
    }

    pub fn get(&mut self, path: &ObjectPath, now: Instant) -> Option<Bytes> {
        if self.entries.get(path)?.is_expired(self.expiration, now) {
            self.remove(path);
            return None;
        }

        let tick = self.tick();
        let entry = self.entries.get_mut(path)?;
        self.recency.remove(&entry.tick);
        self.recency.insert(tick, path.clone());
        entry.tick = tick;
        entry.accessed_at = now;

        Some(entry.data.clone())
    }

    pub fn remove(&mut self, path: &ObjectPath) -> bool {
        let Some(entry) = self.entries.remove(path) else {
            return false;
        };
        self.recency.remove(&entry.tick);
        self.used -= entry.size();
        true
    }

    /// Removes all expired objects and returns how many were dropped.
    pub fn collect_garbage(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some((_, path)) = self.recency.first_key_value() {
            if !self.entries[path].is_expired(self.expiration, now) {
                break;
            }
            let path = path.clone();
            self.remove(&path);
            removed += 1;
        }
        removed
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A [`Backend`] holding all objects in volatile memory, capped at a byte capacity.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    capacity: u64,
    store: Arc<Mutex<BoundedStore>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    ///
    /// If objects expire, this spawns a sweeper onto the current tokio runtime. The sweeper stops
    /// once the last handle to the backend is dropped.
    pub fn new(capacity: u64, expiration: Option<Duration>) -> Self {
        let store = BoundedStore::new(capacity, expiration);
        let sweep_interval = store.expiration.map(|ttl| ttl.min(MAX_SWEEP_INTERVAL));
        let store = Arc::new(Mutex::new(store));

        if let Some(interval) = sweep_interval {
            tokio::spawn(sweep(Arc::downgrade(&store), interval));
        }

        Self { capacity, store }
    }

    fn lock(&self) -> MutexGuard<'_, BoundedStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of payload bytes currently held.
    pub fn used(&self) -> u64 {
        self.lock().used()
    }
}

async fn sweep(store: Weak<Mutex<BoundedStore>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };

        let removed = store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collect_garbage(Instant::now());
        if removed > 0 {
            tracing::debug!(removed, "removed expired objects");
        }
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put_object(&self, path: &ObjectPath, stream: PayloadStream) -> Result<ObjectInfo> {
        let data = stream::collect_bounded(stream, self.capacity).await?;
        let size = data.len() as u64;
        self.lock().insert(path.clone(), data, Instant::now())?;
        Ok(ObjectInfo { size })
    }

    async fn get_object(&self, path: &ObjectPath) -> Result<GetResponse> {
        let data = self.lock().get(path, Instant::now());
        Ok(data.map(|data| {
            let info = ObjectInfo {
                size: data.len() as u64,
            };
            (info, stream::from_bytes(data))
        }))
    }

    async fn delete_object(&self, path: &ObjectPath) -> Result<()> {
        self.lock().remove(path);
        Ok(())
    }
}

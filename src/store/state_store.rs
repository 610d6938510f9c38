use crate::Result;
#[cfg(feature = "rocksdb")]
use crate::store::rocksdb_store::RocksDBStore;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
#[cfg(feature = "rocksdb")]
use std::path::Path;

// In-memory state store; contents are lost on restart
pub struct StateStore<K, V> {
    data: Arc<DashMap<K, V>>,
}

impl<K, V> StateStore<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    pub fn put(&self, key: K, value: V) {
        self.data.insert(key, value);
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entries whose key satisfies `filter`, in no particular order.
    pub fn collect_where<F>(&self, filter: F) -> Vec<(K, V)>
    where
        F: Fn(&K) -> bool,
    {
        self.data
            .iter()
            .filter(|entry| filter(entry.key()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl<K, V> Default for StateStore<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for StateStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

/// A set of writes applied together by [`StateStoreBackend::commit`].
#[derive(Debug, Default)]
pub struct StoreBatch {
    puts: Vec<(String, Vec<u8>)>,
}

impl StoreBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(&mut self, key: String, value: &T) -> Result<()> {
        self.puts.push((key, serde_json::to_vec(value)?));
        Ok(())
    }

    pub fn into_puts(self) -> Vec<(String, Vec<u8>)> {
        self.puts
    }
}

// JSON document store over either in-memory or RocksDB storage
pub enum StateStoreBackend {
    InMemory(StateStore<String, Vec<u8>>),
    #[cfg(feature = "rocksdb")]
    RocksDB(Arc<RocksDBStore>),
}

impl StateStoreBackend {
    pub fn new_in_memory() -> Self {
        Self::InMemory(StateStore::new())
    }

    #[cfg(feature = "rocksdb")]
    pub fn new_rocksdb<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = RocksDBStore::new(path)?;
        Ok(Self::RocksDB(Arc::new(store)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "memory",
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(_) => "rocksdb",
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let bytes = match self {
            Self::InMemory(store) => store.get(&key.to_string()),
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(store) => store.get_bytes(key)?,
        };
        bytes.map(|b| decode(&b)).transpose()
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        match self {
            Self::InMemory(store) => {
                store.put(key.to_string(), bytes);
                Ok(())
            }
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(store) => store.put_bytes(key, bytes),
        }
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        match self {
            Self::InMemory(store) => Ok(store.contains_key(&key.to_string())),
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(store) => Ok(store.get_bytes(key)?.is_some()),
        }
    }

    /// All values under `prefix`, ordered by key.
    pub fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let values: Vec<Vec<u8>> = match self {
            Self::InMemory(store) => {
                let mut entries = store.collect_where(|key| key.starts_with(prefix));
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries.into_iter().map(|(_, bytes)| bytes).collect()
            }
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(store) => store.scan_prefix(prefix)?,
        };
        values.iter().map(|bytes| decode(bytes)).collect()
    }

    /// Applies every write in `batch`. RocksDB applies it atomically.
    pub fn commit(&self, batch: StoreBatch) -> Result<()> {
        match self {
            Self::InMemory(store) => {
                for (key, value) in batch.into_puts() {
                    store.put(key, value);
                }
                Ok(())
            }
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(store) => store.write_all(batch.into_puts()),
        }
    }

    pub fn flush(&self) -> Result<()> {
        match self {
            Self::InMemory(_) => Ok(()),
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(store) => store.flush(),
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

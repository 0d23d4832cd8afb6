//! Explicit memoization for dataset loads and fitted models
//!
//! Caches are plain owned values handed to whoever renders reports; there is
//! no process-wide state. Entries are immutable once computed and only leave
//! the cache through `invalidate` or `clear`.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::errors::Result;
use crate::forest::ForestConfig;
use crate::split::SplitConfig;

/// Hit/miss counters for a cache
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Keyed store of immutable computed values
#[derive(Debug)]
pub struct MemoCache<K, V> {
    entries: HashMap<K, Arc<V>>,
    hits: u64,
    misses: u64,
}

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Eq + Hash + Clone + Debug, V> MemoCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    /// Return the cached value or compute, store and return it
    ///
    /// A failed computation stores nothing.
    pub fn get_or_try_insert_with<F>(&mut self, key: K, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            debug!(?key, "cache hit");
            return Ok(Arc::clone(value));
        }

        self.misses += 1;
        debug!(?key, "cache miss");
        let value = Arc::new(compute()?);
        self.entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Drop one entry; returns whether it was present
    pub fn invalidate(&mut self, key: &K) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            info!(?key, "cache entry invalidated");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

/// Datasets keyed by canonical source path
#[derive(Debug, Default)]
pub struct DatasetCache {
    inner: MemoCache<PathBuf, Dataset>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a CSV once; later calls return the same dataset
    pub fn load(&mut self, path: &Path) -> Result<Arc<Dataset>> {
        let key = source_key(path)?;
        let source = key.clone();
        self.inner
            .get_or_try_insert_with(key, || Dataset::from_csv(&source))
    }

    /// Forget a source so the next `load` re-reads it
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let key = source_key(path).unwrap_or_else(|_| path.to_path_buf());
        self.inner.invalidate(&key)
    }

    /// Re-read the source and reload it if its content fingerprint changed
    ///
    /// Returns whether a reload happened.
    pub fn reload_if_changed(&mut self, path: &Path) -> Result<bool> {
        let key = source_key(path)?;
        let Some(cached) = self.inner.get(&key) else {
            self.load(path)?;
            return Ok(true);
        };

        let bytes = std::fs::read(&key)?;
        let current = hex::encode(blake3::hash(&bytes).as_bytes());
        if current == cached.fingerprint() {
            return Ok(false);
        }

        self.inner.invalidate(&key);
        self.load(path)?;
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

fn source_key(path: &Path) -> Result<PathBuf> {
    Ok(std::fs::canonicalize(path)?)
}

/// Identity of one model fit: data content plus every setting that shapes it
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ModelKey(String);

impl ModelKey {
    pub fn new<S: AsRef<str>>(
        dataset_fingerprint: &str,
        features: &[S],
        label: &str,
        split: &SplitConfig,
        forest: &ForestConfig,
    ) -> Result<Self> {
        #[derive(Serialize)]
        struct KeyMaterial<'a> {
            dataset: &'a str,
            features: Vec<&'a str>,
            label: &'a str,
            split: &'a SplitConfig,
            forest: &'a ForestConfig,
        }

        let material = KeyMaterial {
            dataset: dataset_fingerprint,
            features: features.iter().map(|f| f.as_ref()).collect(),
            label,
            split,
            forest,
        };
        let bytes = serde_json::to_vec(&material)?;
        Ok(Self(hex::encode(blake3::hash(&bytes).as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

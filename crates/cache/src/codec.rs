//! Pluggable value encoding on top of byte caches

use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use crate::traits::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Encode/decode strategy injected into a [`CodecCache`]
pub trait Codec: Send + Sync {
    type Item;

    fn encode(&self, item: &Self::Item) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Item>;
}

/// Stores bytes as they are
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Item = Vec<u8>;

    fn encode(&self, item: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(item.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Serializes any serde value with bincode
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BincodeCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BincodeCodec")
    }
}

impl<T: Serialize + DeserializeOwned> Codec for BincodeCodec<T> {
    type Item = T;

    fn encode(&self, item: &T) -> Result<Vec<u8>> {
        bincode::serialize(item).map_err(|e| CacheError::Serialization {
            key: String::new(),
            operation: SerializationOp::Encode,
            source: e,
            recovery_hint: RecoveryHint::Manual {
                instructions: "Check that the value is serializable".to_string(),
            },
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Typed view over a byte [`Cache`]
#[derive(Debug)]
pub struct CodecCache<C, K> {
    cache: C,
    codec: K,
}

impl<C: Cache, K: Codec> CodecCache<C, K> {
    pub fn new(cache: C, codec: K) -> Self {
        Self { cache, codec }
    }

    pub fn inner(&self) -> &C {
        &self.cache
    }

    pub fn into_inner(self) -> C {
        self.cache
    }

    pub fn put(&self, index: usize, item: &K::Item) -> Result<bool> {
        let bytes = self.codec.encode(item)?;
        self.cache.put(index, &bytes)
    }

    pub fn get(&self, index: usize) -> Result<Option<K::Item>> {
        match self.cache.get(index)? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Typed counterpart of [`Cache::get_and_cache`], with the same
    /// duplicate-fetch caveat
    pub fn get_and_cache<F, E>(&self, index: usize, fetch: F) -> std::result::Result<K::Item, E>
    where
        F: FnOnce(usize) -> std::result::Result<K::Item, E>,
        E: From<CacheError>,
    {
        if let Some(item) = self.get(index)? {
            return Ok(item);
        }

        let item = fetch(index)?;
        self.put(index, &item)?;
        Ok(item)
    }
}

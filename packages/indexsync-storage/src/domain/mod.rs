//! Shared cache port
//!
//! A `SharedCache` is a flat key/value store visible to every worker that
//! participates in suspension tracking. Backends only promise atomic
//! get/set per key. There is no compare-and-swap: callers that do
//! read-modify-write on a single key can lose updates under concurrent
//! writers.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::Result;

/// Key/value cache shared between workers (threads, processes or nodes)
pub trait SharedCache: Send + Sync {
    /// Read the raw value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Returns whether a value was present.
    fn delete(&self, key: &str) -> Result<bool>;
}

impl<C: SharedCache + ?Sized> SharedCache for Arc<C> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }
}

/// JSON helpers on top of any [`SharedCache`]
pub trait SharedCacheExt: SharedCache {
    /// Read and decode a JSON value, `None` when the key is absent
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode `value` as JSON and store it
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

impl<C: SharedCache + ?Sized> SharedCacheExt for C {}

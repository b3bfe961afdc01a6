use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Error, Result};

/// Key prefix shared by every entry the analyzer writes.
pub const KEY_PREFIX: &str = "sqlparser_";

/// Persistent key/value store for analysis results.
///
/// Entries are content-addressed and written once, so implementations may be
/// shared between renders and processes without coordination beyond their own
/// interior locking.
pub trait AnalysisCache: Send + Sync {
    /// Whether an entry exists for `key`.
    fn has(&self, key: &str) -> bool;

    /// Raw stored value for `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stable cache key for a statement: the key prefix plus the SHA-256 of the
/// exact statement text.
pub fn statement_key(sql: &str) -> String {
    format!("{KEY_PREFIX}{:x}", Sha256::digest(sql.as_bytes()))
}

/// Read and decode a JSON entry.
///
/// An entry that no longer decodes is reported and treated as a miss, so the
/// caller recomputes and overwrites it.
pub fn get_json<T: DeserializeOwned>(cache: &dyn AnalysisCache, key: &str) -> Result<Option<T>> {
    let Some(raw) = cache.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "discarding undecodable analysis cache entry");
            Ok(None)
        }
    }
}

/// Encode `value` as JSON and store it.
pub fn set_json<T: Serialize>(cache: &dyn AnalysisCache, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| Error::Cache(format!("Failed to encode cache entry {key}: {e}")))?;
    cache.set(key, &raw)
}

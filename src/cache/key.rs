//! Key Codec Module
//!
//! Derives stable cache keys from a logical name plus a parameter set.
//!
//! Keys look like `{namespace}:{logical_name}:{sha1-hex}`. The digest
//! covers the logical name and the canonical JSON form of the parameters,
//! so parameter maps that differ only in insertion order map to the same
//! key. The logical name is kept readable for pattern invalidation.

use serde::Serialize;
use serde_json::Value;
use sha1::{Digest, Sha1};

use crate::cache::MAX_NAME_LENGTH;
use crate::error::{CacheError, Result};

// == Key Codec ==
#[derive(Debug, Clone)]
pub struct KeyCodec {
    namespace: String,
}

impl KeyCodec {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // == Encode ==
    /// Encodes `(name, params)` into a key.
    ///
    /// `params` may be any serializable value. Unit, `null`, and empty
    /// maps or sequences all count as "no parameters".
    pub fn encode<P>(&self, name: &str, params: &P) -> Result<String>
    where
        P: Serialize + ?Sized,
    {
        validate_name(name)?;

        let canonical = canonical_params(params)?;
        let mut hasher = Sha1::new();
        hasher.update(name.as_bytes());
        if let Some(canonical) = canonical {
            hasher.update(b":");
            hasher.update(canonical.as_bytes());
        }

        Ok(format!(
            "{}:{}:{:x}",
            self.namespace,
            name,
            hasher.finalize()
        ))
    }
}

// == Pattern Matching ==
/// Returns true if `pattern` occurs in the key, ignoring its digest.
///
/// An empty pattern matches every key.
pub fn key_matches(key: &str, pattern: &str) -> bool {
    let searchable = key.rsplit_once(':').map_or(key, |(head, _)| head);
    searchable.contains(pattern)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CacheError::InvalidKey("logical name cannot be empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "logical name exceeds maximum length of {} bytes",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

/// Serializes params to canonical JSON, or `None` when they are empty.
///
/// Going through `serde_json::Value` sorts object keys recursively.
fn canonical_params<P>(params: &P) -> Result<Option<String>>
where
    P: Serialize + ?Sized,
{
    let value = serde_json::to_value(params)?;
    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&value)?))
}

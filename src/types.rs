//! Core identifiers shared across the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a persisted object: its entity name plus a store-allocated key.
///
/// Keys come from the store's id generator, so they are unique per store
/// and never reused across restarts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    entity: String,
    key: u64,
}

impl ObjectId {
    pub fn new(entity: impl Into<String>, key: u64) -> Self {
        Self {
            entity: entity.into(),
            key,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    /// Storage key: entity bytes, a NUL separator, then the big-endian key.
    ///
    /// Big-endian keeps one entity's objects contiguous and ordered under
    /// a prefix scan.
    pub fn storage_key(&self) -> Vec<u8> {
        let mut out = entity_prefix(&self.entity);
        out.extend_from_slice(&self.key.to_be_bytes());
        out
    }

    /// Inverse of [`ObjectId::storage_key`].
    pub fn from_storage_key(raw: &[u8]) -> Option<Self> {
        let split = raw.iter().position(|b| *b == 0)?;
        let (entity, rest) = raw.split_at(split);
        let key_bytes: [u8; 8] = rest.get(1..)?.try_into().ok()?;
        let entity = std::str::from_utf8(entity).ok()?;
        Some(Self::new(entity, u64::from_be_bytes(key_bytes)))
    }
}

/// Prefix shared by every storage key of one entity.
pub fn entity_prefix(entity: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(entity.len() + 9);
    out.extend_from_slice(entity.as_bytes());
    out.push(0);
    out
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity, hex::encode(self.key.to_be_bytes()))
    }
}

impl FromStr for ObjectId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (entity, key) = s
            .rsplit_once('/')
            .ok_or_else(|| format!("expected <entity>/<hex key>, got '{}'", s))?;
        if entity.is_empty() {
            return Err(format!("missing entity in object id '{}'", s));
        }
        let bytes = hex::decode(key).map_err(|e| format!("invalid key '{}': {}", key, e))?;
        let bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|_| format!("key '{}' must be 16 hex digits", key))?;
        Ok(Self::new(entity, u64::from_be_bytes(bytes)))
    }
}

/// Opaque identifier of a context in the manager's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(pub(crate) u64);

impl ContextId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Interned string identifiers for resource and stage names.
///
/// Resource lookups happen every frame, so names are hashed once into a
/// 64-bit `StringId` (FNV-1A) and compared as integers afterwards. The
/// `StringRegistry` keeps the full strings so ids can be resolved back for
/// logging and so hash collisions between distinct names are detected at
/// intern time instead of silently aliasing two resources.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::engine_error;

const FNV1A_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV1A_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1A hash of a name.
///
/// Two `StringId`s compare equal exactly when their source strings hashed
/// equally; `StringRegistry::intern` guarantees distinct strings never share
/// an id within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u64);

impl StringId {
    /// Hash of the empty string (the FNV-1A offset basis)
    pub const EMPTY: StringId = StringId(FNV1A_OFFSET_BASIS);

    /// Hash a name into its id
    pub const fn of(name: &str) -> StringId {
        let bytes = name.as_bytes();
        let mut hash = FNV1A_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(FNV1A_PRIME);
            i += 1;
        }
        StringId(hash)
    }

    /// Raw hash value
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this is the id of the empty string
    pub const fn is_empty(self) -> bool {
        self.0 == FNV1A_OFFSET_BASIS
    }
}

/// Interning registry mapping ids back to their full strings.
///
/// Collision policy: `intern` compares the full string against any previous
/// occupant of the same id and rejects the new name on mismatch. Lookups by
/// name elsewhere in the engine hash directly (`StringId::of`) without going
/// through the registry; only names that create resources are interned.
pub struct StringRegistry {
    names: FxHashMap<StringId, String>,
}

impl StringRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            names: FxHashMap::default(),
        }
    }

    /// Intern a name, returning its id
    ///
    /// Re-interning the same string is a cheap no-op returning the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if a *different* string already occupies this id
    /// (64-bit FNV-1A collision).
    pub fn intern(&mut self, name: &str) -> Result<StringId> {
        let id = StringId::of(name);
        if let Some(existing) = self.names.get(&id) {
            if existing != name {
                engine_error!("nebula3d::StringRegistry",
                    "hash collision: '{}' and '{}' both map to {:#018x}",
                    existing, name, id.value());
                return Err(Error::InvalidResource(format!(
                    "name '{}' collides with existing name '{}'", name, existing
                )));
            }
            return Ok(id);
        }
        self.names.insert(id, name.to_string());
        Ok(id)
    }

    /// Resolve an id back to its interned string
    pub fn resolve(&self, id: StringId) -> Option<&str> {
        self.names.get(&id).map(|s| s.as_str())
    }

    /// Whether a name has been interned
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(&StringId::of(name))
    }

    /// Number of interned names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names have been interned
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for StringRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "string_id_tests.rs"]
mod tests;

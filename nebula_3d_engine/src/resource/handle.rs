/// Generation-checked resource handles and the pool that issues them.
///
/// A `Handle` is an opaque (index, generation) pair into a `HandlePool`.
/// Freed slots are recycled for later insertions, but every removal bumps
/// the slot's generation, so handles obtained before the removal go stale
/// and fail lookups instead of aliasing the slot's new occupant.
///
/// Stale-handle policy: dereferencing a stale handle is a programmer error
/// and asserts in debug builds; release builds return `None`.

/// Opaque (index, generation) pair identifying a slot in a `HandlePool`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    idx: u32,
    generation: u32,
}

impl Handle {
    /// Sentinel returned by name lookups that find nothing.
    ///
    /// Never matches any pool slot; `get(NULL)` is quietly `None`.
    pub const NULL: Handle = Handle {
        idx: u32::MAX,
        generation: 0,
    };

    /// Whether this is the null sentinel
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// Slot index (meaningless for NULL)
    pub fn idx(self) -> u32 {
        self.idx
    }

    /// Slot generation at the time the handle was issued
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NULL
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Pool of generation-checked slots.
///
/// Freed slot indices are recycled on subsequent insertions (free-list, same
/// scheme as a plain slot allocator) while the bumped generation keeps old
/// handles from resolving.
pub struct HandlePool<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: u32,
}

impl<T> HandlePool<T> {
    /// Create a new empty pool
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value, returning its handle
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            debug_assert!(slot.value.is_none(), "free-list slot still occupied");
            slot.value = Some(value);
            Handle {
                idx,
                generation: slot.generation,
            }
        } else {
            let idx = self.slots.len() as u32;
            // Generations start at 1 so the NULL sentinel (generation 0)
            // can never match a live slot.
            self.slots.push(Slot {
                generation: 1,
                value: Some(value),
            });
            Handle { idx, generation: 1 }
        }
    }

    /// Look up a handle
    ///
    /// Returns `None` for the NULL sentinel. A stale handle (slot reused or
    /// freed since the handle was issued) asserts in debug builds and
    /// returns `None` in release builds.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        if handle.is_null() {
            return None;
        }
        let slot = self.slots.get(handle.idx as usize)?;
        if slot.generation != handle.generation {
            debug_assert!(false, "stale handle: idx {} generation {} (slot is at {})",
                handle.idx, handle.generation, slot.generation);
            return None;
        }
        slot.value.as_ref()
    }

    /// Look up a handle mutably (same staleness policy as `get`)
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        if handle.is_null() {
            return None;
        }
        let slot = self.slots.get_mut(handle.idx as usize)?;
        if slot.generation != handle.generation {
            debug_assert!(false, "stale handle: idx {} generation {} (slot is at {})",
                handle.idx, handle.generation, slot.generation);
            return None;
        }
        slot.value.as_mut()
    }

    /// Whether a handle currently resolves (no assert on stale handles)
    pub fn is_valid(&self, handle: Handle) -> bool {
        if handle.is_null() {
            return false;
        }
        match self.slots.get(handle.idx as usize) {
            Some(slot) => slot.generation == handle.generation && slot.value.is_some(),
            None => false,
        }
    }

    /// Remove a value, invalidating the handle and all copies of it
    ///
    /// Returns the removed value, or `None` if the handle does not resolve.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if handle.is_null() {
            return None;
        }
        let slot = self.slots.get_mut(handle.idx as usize)?;
        if slot.generation != handle.generation || slot.value.is_none() {
            return None;
        }
        let value = slot.value.take();
        // Bump the generation now so every outstanding handle goes stale
        // before the slot is recycled.
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.idx);
        self.len -= 1;
        value
    }

    /// Number of live entries
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the pool has no live entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live entries with their handles
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    Handle {
                        idx: idx as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Handles of all live entries (snapshot, safe to mutate the pool while
    /// walking the returned list)
    pub fn handles(&self) -> Vec<Handle> {
        self.iter().map(|(h, _)| h).collect()
    }
}

impl<T> Default for HandlePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;

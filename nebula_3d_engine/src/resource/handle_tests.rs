/// Tests for generation-checked handles and the handle pool

use super::*;

// ============================================================================
// Tests: Handle
// ============================================================================

#[test]
fn test_null_handle() {
    assert!(Handle::NULL.is_null());
    assert!(Handle::default().is_null());
}

#[test]
fn test_null_lookup_is_quietly_none() {
    let pool: HandlePool<u32> = HandlePool::new();
    assert!(pool.get(Handle::NULL).is_none());
    assert!(!pool.is_valid(Handle::NULL));
}

// ============================================================================
// Tests: Insert / Get
// ============================================================================

#[test]
fn test_insert_and_get() {
    let mut pool = HandlePool::new();
    let h = pool.insert(42u32);
    assert!(!h.is_null());
    assert_eq!(pool.get(h), Some(&42));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_get_mut() {
    let mut pool = HandlePool::new();
    let h = pool.insert(1u32);
    *pool.get_mut(h).unwrap() = 7;
    assert_eq!(pool.get(h), Some(&7));
}

#[test]
fn test_handle_stays_valid_until_removed() {
    let mut pool = HandlePool::new();
    let a = pool.insert("a");
    let b = pool.insert("b");
    pool.remove(b);
    assert_eq!(pool.get(a), Some(&"a"));
    assert!(pool.is_valid(a));
}

// ============================================================================
// Tests: Remove / Staleness
// ============================================================================

#[test]
fn test_remove_returns_value() {
    let mut pool = HandlePool::new();
    let h = pool.insert(9u32);
    assert_eq!(pool.remove(h), Some(9));
    assert_eq!(pool.len(), 0);
    assert!(pool.is_empty());
}

#[test]
fn test_removed_handle_is_stale() {
    let mut pool = HandlePool::new();
    let h = pool.insert(1u32);
    pool.remove(h);
    assert!(!pool.is_valid(h));
    assert_eq!(pool.remove(h), None);
}

#[test]
fn test_recycled_slot_does_not_alias_old_handle() {
    let mut pool = HandlePool::new();
    let old = pool.insert(1u32);
    pool.remove(old);

    // The freed slot is recycled for the new entry...
    let new = pool.insert(2u32);
    assert_eq!(new.idx(), old.idx());
    // ...but the generation differs, so the old handle must not resolve.
    assert_ne!(new.generation(), old.generation());
    assert!(!pool.is_valid(old));
    assert_eq!(pool.get(new), Some(&2));
}

#[test]
#[should_panic(expected = "stale handle")]
#[cfg(debug_assertions)]
fn test_stale_get_asserts_in_debug() {
    let mut pool = HandlePool::new();
    let h = pool.insert(1u32);
    pool.remove(h);
    pool.insert(2u32);
    let _ = pool.get(h);
}

// ============================================================================
// Tests: Iteration
// ============================================================================

#[test]
fn test_iter_skips_freed_slots() {
    let mut pool = HandlePool::new();
    let a = pool.insert(1u32);
    let b = pool.insert(2u32);
    let c = pool.insert(3u32);
    pool.remove(b);

    let live: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
    assert_eq!(live, vec![1, 3]);

    let handles = pool.handles();
    assert_eq!(handles, vec![a, c]);
}

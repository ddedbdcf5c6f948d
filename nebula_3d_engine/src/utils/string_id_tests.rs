/// Tests for StringId hashing and the interning registry

use super::*;

// ============================================================================
// Tests: StringId
// ============================================================================

#[test]
fn test_empty_string_hash_is_offset_basis() {
    assert_eq!(StringId::of("").value(), 0xcbf2_9ce4_8422_2325);
    assert_eq!(StringId::of(""), StringId::EMPTY);
    assert!(StringId::of("").is_empty());
}

#[test]
fn test_known_fnv1a_vectors() {
    // Reference values for 64-bit FNV-1A.
    assert_eq!(StringId::of("a").value(), 0xaf63_dc4c_8601_ec8c);
    assert_eq!(StringId::of("foobar").value(), 0x85dd_5a24_a42e_59f4);
}

#[test]
fn test_hash_is_deterministic() {
    assert_eq!(StringId::of("camera_cb"), StringId::of("camera_cb"));
}

#[test]
fn test_distinct_names_hash_differently() {
    assert_ne!(StringId::of("shadow_map"), StringId::of("gbuffer"));
    assert!(!StringId::of("shadow_map").is_empty());
}

#[test]
fn test_hash_is_const_evaluable() {
    const ID: StringId = StringId::of("forward_pass");
    assert_eq!(ID, StringId::of("forward_pass"));
}

// ============================================================================
// Tests: StringRegistry
// ============================================================================

#[test]
fn test_intern_and_resolve() {
    let mut reg = StringRegistry::new();
    let id = reg.intern("camera_cb").unwrap();
    assert_eq!(reg.resolve(id), Some("camera_cb"));
    assert!(reg.contains("camera_cb"));
    assert_eq!(reg.len(), 1);
}

#[test]
fn test_reintern_same_string_is_noop() {
    let mut reg = StringRegistry::new();
    let a = reg.intern("gbuffer").unwrap();
    let b = reg.intern("gbuffer").unwrap();
    assert_eq!(a, b);
    assert_eq!(reg.len(), 1);
}

#[test]
fn test_resolve_unknown_id_is_none() {
    let reg = StringRegistry::new();
    assert!(reg.resolve(StringId::of("never_interned")).is_none());
    assert!(reg.is_empty());
}

#[test]
fn test_intern_empty_string() {
    let mut reg = StringRegistry::new();
    let id = reg.intern("").unwrap();
    assert_eq!(id, StringId::EMPTY);
    assert_eq!(reg.resolve(StringId::EMPTY), Some(""));
}

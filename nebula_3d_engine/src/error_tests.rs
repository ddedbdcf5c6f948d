/// Tests for engine error types and error macros

use super::*;

// ============================================================================
// Tests: Display
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("device lost".to_string());
    assert_eq!(err.to_string(), "Backend error: device lost");
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(Error::OutOfMemory.to_string(), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("bad extent".to_string());
    assert_eq!(err.to_string(), "Invalid resource: bad extent");
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("no backend".to_string());
    assert_eq!(err.to_string(), "Initialization failed: no backend");
}

#[test]
fn test_version_mismatch_display() {
    let err = Error::VersionMismatch { expected: 3, found: 2 };
    let msg = err.to_string();
    assert!(msg.contains("expected 3"));
    assert!(msg.contains("found 2"));
}

// ============================================================================
// Tests: Macros
// ============================================================================

#[test]
fn test_engine_err_builds_backend_error() {
    let err = crate::engine_err!("nebula3d::test", "slot {} taken", 7);
    match err {
        Error::BackendError(msg) => assert_eq!(msg, "slot 7 taken"),
        other => panic!("expected BackendError, got {:?}", other),
    }
}

#[test]
fn test_engine_bail_returns_early() {
    fn failing() -> Result<u32> {
        crate::engine_bail!("nebula3d::test", "always fails");
    }
    assert!(failing().is_err());
}

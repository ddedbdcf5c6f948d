//! Error types for the Nebula3D engine
//!
//! This module defines the error types used throughout the engine,
//! including backend loading, GPU allocation, and resource management.

use std::fmt;

/// Result type for Nebula3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nebula3D engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (headless, Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory. Recoverable: callers may free resources or grow
    /// a heap and retry.
    OutOfMemory,

    /// Invalid resource (buffer, texture, mesh, name, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, backend, subsystems)
    InitializationFailed(String),

    /// Backend interface version does not match the compiled-in expected
    /// version. Fatal at load time.
    VersionMismatch { expected: u32, found: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::VersionMismatch { expected, found } => write!(
                f,
                "Backend interface version mismatch: expected {}, found {}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Build a `BackendError` from a format string, logging it as an ERROR
///
/// # Example
///
/// ```ignore
/// let err = engine_err!("nebula3d::ResourceTable", "buffer '{}' not found", name);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::engine_error!($source, "{}", msg);
        $crate::nebula3d::Error::BackendError(msg)
    }};
}

/// Return early with a `BackendError` built from a format string
///
/// # Example
///
/// ```ignore
/// if table.contains(name) {
///     engine_bail!("nebula3d::ResourceTable", "buffer '{}' already exists", name);
/// }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

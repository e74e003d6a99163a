//! Error types for the virtual file system.
//!
//! Recoverable file conditions (missing file, unknown descriptor) stay
//! in-band as negative or zero return values, mirroring the syscall surface
//! the guest sees. The errors here are the fatal tier: they mean the
//! guest/runtime contract was violated, and the current run should abort.

use thiserror::Error;

/// Fatal virtual file system conditions.
#[derive(Debug, Error)]
pub enum VfsError {
    /// The guest passed an open-flag combination the shim does not produce.
    #[error("unsupported open flags: {0:#x}")]
    UnsupportedFlags(u32),
}

/// Result type alias for VFS operations.
pub type Result<T> = std::result::Result<T, VfsError>;

//! Error types for the process runtime.
//!
//! Three tiers, kept deliberately distinct:
//!
//! - syscall-level failures never appear here at all - they stay in-band as
//!   negative/zero return values the guest can recover from;
//! - fatal runtime conditions (out-of-bounds guest access, contract
//!   violations) are [`ProcError`] values that abort the current run;
//! - guest-initiated termination travels as [`ExitCalled`] through the
//!   wasmtime trap path and is converted back to a successful
//!   `Termination::Exited` at the run boundary, so callers can treat it as
//!   status, not fault.

use thiserror::Error;

use wasmbox_vfs::VfsError;

/// Fatal conditions that abort a guest run.
#[derive(Debug, Error)]
pub enum ProcError {
    /// The guest trapped or the engine failed (compile, instantiate, call).
    #[error("guest fault: {0}")]
    Wasm(wasmtime::Error),

    /// The guest handed the shim an offset/length pair outside linear memory.
    #[error("guest memory access out of bounds: offset {offset:#x}, len {len}")]
    OutOfBounds {
        /// Guest-supplied offset into linear memory.
        offset: u64,
        /// Requested length in bytes.
        len: u64,
    },

    /// A fatal virtual file system condition.
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// Linear memory could not grow far enough to hold the argument image.
    #[error("linear memory exhausted while marshalling arguments")]
    MemoryExhausted,

    /// The guest binary does not expose a required export.
    #[error("guest export not found: {0}")]
    MissingExport(String),

    /// An operation that needs a loaded guest was called before `load`.
    #[error("no guest binary loaded")]
    NotLoaded,

    /// Fetching the guest binary failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<wasmtime::Error> for ProcError {
    fn from(err: wasmtime::Error) -> Self {
        ProcError::Wasm(err)
    }
}

/// Marker error thrown by the `exit` host function.
///
/// It unwinds past any in-progress host call back to the top-level run
/// invocation, where it is downcast and turned into a terminal status.
#[derive(Debug, Error)]
#[error("process exited with code {0}")]
pub struct ExitCalled(pub i32);

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, ProcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_marker_survives_an_error_chain() {
        let err = wasmtime::Error::new(ExitCalled(7));
        let exit = err.downcast::<ExitCalled>().unwrap();
        assert_eq!(exit.0, 7);
    }

    #[test]
    fn vfs_errors_convert() {
        let err: ProcError = VfsError::UnsupportedFlags(0x42).into();
        assert!(matches!(err, ProcError::Vfs(_)));
    }

    #[test]
    fn display_names_the_condition() {
        let err = ProcError::OutOfBounds { offset: 0x100, len: 8 };
        let text = err.to_string();
        assert!(text.contains("out of bounds"));
        assert!(text.contains("0x100"));
    }
}

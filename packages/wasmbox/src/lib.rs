//! wasmbox: a sandboxed WASM process host with a virtual file system.
//!
//! Three layers, leaves first:
//!
//! - [`ByteStore`] - an associative mapping from absolute paths to
//!   immutable byte buffers; the persistence substrate for "files".
//! - [`Vfs`] - a table of open file descriptors over the store,
//!   implementing open/close/read/write/lseek with buffered, commit-on-close
//!   write semantics.
//! - [`WasmProc`] - the process runtime: owns one guest's linear memory and
//!   break pointer, marshals argv, exposes the POSIX-like syscall shim, and
//!   drives the guest from load through exit.
//!
//! The intended shape of an embedding: create one shared [`ByteStore`],
//! then a fresh [`WasmProc`] per guest run, carrying files between runs
//! through the store - for instance running a wasm-compiled C compiler and
//! then the binary it produced.

pub use wasmbox_store::{ByteStore, SharedStore};

pub use wasmbox_vfs::{
    CaptureConsole, Console, NullConsole, OpenFlags, Vfs, VfsError, Whence, O_CREAT, O_RDONLY,
    O_RDWR, O_TRUNC, O_WRONLY,
};

pub use wasmbox_proc::{
    BinaryProvider, BytesProvider, DisplaySink, ExitCalled, FileProvider, ProcConfig, ProcError,
    ProcId, ProcState, Termination, WasmProc, PAGE_SIZE,
};

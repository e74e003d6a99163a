//! Virtual file system for guest processes.
//!
//! Manages a table of open file descriptors over a shared [`ByteStore`],
//! implementing open/close/read/write/lseek semantics the way a compiled C
//! program expects them: small-integer descriptors allocated into the lowest
//! free slot, descriptors 0/1/2 reserved for stdin/stdout/stderr, and
//! buffered writes that only become visible to readers at a commit point
//! (`close` or `lseek`).
//!
//! Return values follow the syscall convention the guest's libc was built
//! against: negative means error, non-negative means success or a byte
//! count. Errors that indicate a broken guest/runtime contract (an open-flag
//! combination the shim never produces) are a separate, fatal [`VfsError`]
//! rather than an in-band `-1`.
//!
//! [`ByteStore`]: wasmbox_store::ByteStore

pub mod console;
pub mod descriptor;
pub mod error;
pub mod flags;
pub mod vfs;

pub use console::{CaptureConsole, Console, NullConsole};
pub use descriptor::Descriptor;
pub use error::{Result, VfsError};
pub use flags::{OpenFlags, Whence, O_CREAT, O_RDONLY, O_RDWR, O_TRUNC, O_WRONLY};
pub use vfs::Vfs;

//! Open flags and seek origins, as the guest's libc encodes them.

use crate::error::{Result, VfsError};

/// Open for reading only.
pub const O_RDONLY: u32 = 0o0;
/// Open for writing only.
pub const O_WRONLY: u32 = 0o1;
/// Open for reading and writing.
pub const O_RDWR: u32 = 0o2;
/// Create the file if it does not exist.
pub const O_CREAT: u32 = 0o400;
/// Truncate the file on open.
pub const O_TRUNC: u32 = 0o1000;

/// Access-mode mask over the low flag bits.
const ACCMODE: u32 = 0o3;

/// The raw `flags` argument of `open`, with the accessors the VFS needs.
///
/// Only the combinations the guest toolchain actually emits are supported:
/// `O_RDONLY`, `O_WRONLY`, `O_RDWR`, and `O_WRONLY | O_CREAT | O_TRUNC`.
/// Anything else is rejected as a fatal contract violation via
/// [`OpenFlags::check_supported`], not as a recoverable `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(pub u32);

impl OpenFlags {
    /// The access mode bits (`O_RDONLY` / `O_WRONLY` / `O_RDWR`).
    pub fn access_mode(self) -> u32 {
        self.0 & ACCMODE
    }

    /// Whether the descriptor is opened with write intent.
    ///
    /// Write intent also implies the file may be created: the toolchain
    /// opens output files with `O_WRONLY` whether or not they exist yet.
    pub fn wants_write(self) -> bool {
        self.access_mode() != O_RDONLY
    }

    /// Reject flag combinations the shim never produces.
    pub fn check_supported(self) -> Result<()> {
        match self.0 {
            O_RDONLY | O_WRONLY | O_RDWR => Ok(()),
            f if f == (O_WRONLY | O_CREAT | O_TRUNC) => Ok(()),
            other => Err(VfsError::UnsupportedFlags(other)),
        }
    }
}

impl From<u32> for OpenFlags {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Seek origin for `lseek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute position.
    Set = 0,
    /// Relative to the current cursor.
    Cur = 1,
    /// Relative to the end of the backing data.
    End = 2,
}

impl Whence {
    /// Decode the raw `whence` argument; `None` for values the guest's
    /// libc does not define.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Whence::Set),
            1 => Some(Whence::Cur),
            2 => Some(Whence::End),
            _ => None,
        }
    }
}

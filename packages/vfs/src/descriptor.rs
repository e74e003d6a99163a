//! Open-descriptor state.

use bytes::Bytes;

/// Pending writes on a descriptor opened with write intent.
///
/// Chunks accumulate in arrival order and are flattened into one buffer of
/// `total` bytes at a commit point. There is no partial commit: either the
/// whole sequence is captured, or nothing changes.
#[derive(Debug, Default)]
pub struct PendingWrites {
    chunks: Vec<Bytes>,
    total: usize,
}

impl PendingWrites {
    /// Append a private copy of `buf`.
    pub fn push(&mut self, buf: &[u8]) {
        self.chunks.push(Bytes::copy_from_slice(buf));
        self.total += buf.len();
    }

    /// Whether any writes are pending.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total pending bytes.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Flatten all pending chunks into one buffer and clear the sequence.
    pub fn take_flattened(&mut self) -> Bytes {
        let mut out = Vec::with_capacity(self.total);
        for chunk in self.chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        self.total = 0;
        Bytes::from(out)
    }
}

/// One open file descriptor.
///
/// Path-backed descriptors read from (and commit to) the byte store;
/// anonymous descriptors created by `tmpfile` read from their own committed
/// buffer instead.
#[derive(Debug)]
pub struct Descriptor {
    /// Absolute path, or `None` for anonymous temporary files.
    pub path: Option<String>,
    /// Read cursor, in bytes from the start of the backing data.
    pub cursor: usize,
    /// Present only for descriptors opened with write intent.
    pub pending: Option<PendingWrites>,
    /// Committed data of an anonymous descriptor.
    pub committed: Option<Bytes>,
}

impl Descriptor {
    /// Descriptor backed by a stored file.
    pub fn path_backed(path: String, write_intent: bool) -> Self {
        Self {
            path: Some(path),
            cursor: 0,
            pending: write_intent.then(PendingWrites::default),
            committed: None,
        }
    }

    /// Anonymous descriptor with no backing path.
    pub fn anonymous() -> Self {
        Self {
            path: None,
            cursor: 0,
            pending: Some(PendingWrites::default()),
            committed: None,
        }
    }
}

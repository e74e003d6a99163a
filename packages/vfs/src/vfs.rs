//! The descriptor table and its syscall-shaped operations.

use bytes::Bytes;
use tracing::debug;

use wasmbox_store::SharedStore;

use crate::console::Console;
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::flags::{OpenFlags, Whence};

/// One slot in the descriptor table.
#[derive(Debug)]
enum Slot {
    /// Vacated by `close`, available for reuse.
    Free,
    /// Reserved no-op input source.
    Stdin,
    /// Reserved, forwards to the console.
    Stdout,
    /// Reserved, forwards to the console.
    Stderr,
    /// An open file descriptor.
    Open(Descriptor),
}

/// Virtual file system over a shared byte store.
///
/// Owns the descriptor table for one guest run. Descriptors 0/1/2 are
/// permanently reserved; user descriptors start at 3 and reuse the lowest
/// freed slot.
pub struct Vfs {
    store: SharedStore,
    slots: Vec<Slot>,
    console: Box<dyn Console>,
}

impl Vfs {
    /// Create a VFS over `store`, forwarding stdout/stderr to `console`.
    pub fn new(store: SharedStore, console: Box<dyn Console>) -> Self {
        Self {
            store,
            slots: vec![Slot::Stdin, Slot::Stdout, Slot::Stderr],
            console,
        }
    }

    /// Open `path` (already resolved to an absolute path) with `flags`.
    ///
    /// Returns `-1` for an empty path, and for a read-only open of a path
    /// with no stored file. Write intent creates the file on commit, so
    /// missing files are not an error there. Flag combinations the shim
    /// never produces are a fatal [`VfsError`], not `-1`.
    ///
    /// The `-1` paths never allocate a descriptor slot.
    ///
    /// [`VfsError`]: crate::error::VfsError
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<i32> {
        if path.is_empty() {
            return Ok(-1);
        }
        flags.check_supported()?;
        if !flags.wants_write() && !self.store.lock().unwrap().contains(path) {
            return Ok(-1);
        }

        let fd = self.alloc_slot();
        self.slots[fd as usize] = Slot::Open(Descriptor::path_backed(
            path.to_string(),
            flags.wants_write(),
        ));
        debug!(fd, path, flags = flags.0, "open");
        Ok(fd)
    }

    /// Close `fd`, committing any pending writes first.
    ///
    /// Returns `0` on success, `-1` if `fd` does not name an open user
    /// descriptor. The reserved descriptors cannot be closed.
    pub fn close(&mut self, fd: i32) -> i32 {
        let Some(slot) = self.user_slot_mut(fd) else {
            return -1;
        };
        let Slot::Open(_) = slot else { return -1 };

        self.commit(fd);
        self.slots[fd as usize] = Slot::Free;
        debug!(fd, "close");
        0
    }

    /// Copy up to `buf.len()` bytes from the descriptor's backing data into
    /// `buf`, starting at the read cursor.
    ///
    /// Returns the number of bytes copied and advances the cursor by that
    /// amount; `0` at or past end-of-data. A bad, closed, or reserved `fd`
    /// also reads `0` - end-of-stream, not a fault.
    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> usize {
        let backing = match self.slot(fd) {
            Some(Slot::Open(desc)) => match &desc.path {
                Some(path) => self.store.lock().unwrap().get(path),
                None => desc.committed.clone(),
            },
            _ => return 0,
        };
        let Some(data) = backing else { return 0 };

        let Some(Slot::Open(desc)) = self.slot_mut(fd) else {
            return 0;
        };
        if desc.cursor >= data.len() {
            return 0;
        }
        let end = data.len().min(desc.cursor + buf.len());
        let n = end - desc.cursor;
        buf[..n].copy_from_slice(&data[desc.cursor..end]);
        desc.cursor = end;
        n
    }

    /// Write `buf` through `fd`.
    ///
    /// Descriptors 1/2 forward the UTF-8 decoding of `buf` to the console;
    /// descriptor 0 swallows the bytes. Both report `buf.len()`. An unknown
    /// or closed `fd` returns `0`. Otherwise `buf` is copied onto the
    /// descriptor's pending-write sequence - it is not visible to `read`
    /// until a commit (`lseek` or `close`).
    pub fn write(&mut self, fd: i32, buf: &[u8]) -> usize {
        match self.slot_mut(fd) {
            Some(Slot::Stdout) | Some(Slot::Stderr) => {
                let text = String::from_utf8_lossy(buf).into_owned();
                self.console.print(&text);
                buf.len()
            }
            Some(Slot::Stdin) => buf.len(),
            Some(Slot::Open(desc)) => match desc.pending.as_mut() {
                Some(pending) => {
                    pending.push(buf);
                    buf.len()
                }
                // No write intent on this descriptor.
                None => 0,
            },
            _ => 0,
        }
    }

    /// Reposition the read cursor of `fd`.
    ///
    /// Pending writes are always committed first, so a file written through
    /// this descriptor becomes readable before the cursor moves. `Set` is
    /// absolute, `Cur` is relative to the current cursor, and `End` is
    /// relative to the length of the backing data. Returns the new cursor,
    /// or `-1` for an unknown descriptor, an undefined `whence`, or a
    /// resulting position before the start of the data.
    pub fn lseek(&mut self, fd: i32, offset: i64, whence: i32) -> i64 {
        let Some(Slot::Open(_)) = self.slot(fd) else {
            return -1;
        };
        let Some(whence) = Whence::from_raw(whence) else {
            return -1;
        };

        self.commit(fd);

        let Some(Slot::Open(desc)) = self.slot(fd) else {
            return -1;
        };
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => desc.cursor as i64,
            Whence::End => match &desc.path {
                Some(path) => self
                    .store
                    .lock()
                    .unwrap()
                    .get(path)
                    .map_or(0, |data| data.len() as i64),
                None => desc.committed.as_ref().map_or(0, |data| data.len() as i64),
            },
        };
        let pos = base + offset;
        if pos < 0 {
            return -1;
        }

        if let Some(Slot::Open(desc)) = self.slot_mut(fd) {
            desc.cursor = pos as usize;
        }
        pos
    }

    /// Allocate an anonymous descriptor with no backing path.
    ///
    /// Its data becomes visible to `read` only once a commit replaces the
    /// descriptor's readable buffer.
    pub fn tmpfile(&mut self) -> i32 {
        let fd = self.alloc_slot();
        self.slots[fd as usize] = Slot::Open(Descriptor::anonymous());
        debug!(fd, "tmpfile");
        fd
    }

    /// Flatten the descriptor's pending writes into its backing data.
    ///
    /// Path-backed descriptors store the flattened buffer at their path
    /// (replacing any prior contents - the last committing descriptor for a
    /// path wins); anonymous descriptors replace their committed buffer.
    /// A descriptor with nothing pending is left untouched.
    fn commit(&mut self, fd: i32) {
        let Some(Slot::Open(desc)) = self.slot_mut(fd) else {
            return;
        };
        let Some(pending) = desc.pending.as_mut() else {
            return;
        };
        if pending.is_empty() {
            return;
        }

        let data: Bytes = pending.take_flattened();
        if let Some(path) = desc.path.clone() {
            debug!(fd, path, len = data.len(), "commit");
            self.store.lock().unwrap().put(path, data);
        } else {
            debug!(fd, len = data.len(), "commit anonymous");
            desc.committed = Some(data);
        }
    }

    /// Lowest free slot index, extending the table if none is free.
    fn alloc_slot(&mut self) -> i32 {
        for (i, slot) in self.slots.iter().enumerate() {
            if matches!(slot, Slot::Free) {
                return i as i32;
            }
        }
        self.slots.push(Slot::Free);
        (self.slots.len() - 1) as i32
    }

    fn slot(&self, fd: i32) -> Option<&Slot> {
        usize::try_from(fd).ok().and_then(|i| self.slots.get(i))
    }

    fn slot_mut(&mut self, fd: i32) -> Option<&mut Slot> {
        usize::try_from(fd)
            .ok()
            .and_then(|i| self.slots.get_mut(i))
    }

    /// Mutable slot access that refuses the reserved descriptors.
    fn user_slot_mut(&mut self, fd: i32) -> Option<&mut Slot> {
        if fd < 3 {
            return None;
        }
        self.slot_mut(fd)
    }

    /// Store a complete file at an absolute path, bypassing descriptors.
    ///
    /// Used by the embedder to seed inputs before a run and by the runtime's
    /// convenience helpers; commits from open descriptors use the same
    /// store, so the two views never diverge.
    pub fn save_file(&mut self, path: &str, bytes: Bytes) {
        self.store.lock().unwrap().put(path, bytes);
    }

    /// Fetch the committed contents of an absolute path.
    pub fn load_file(&self, path: &str) -> Option<Bytes> {
        self.store.lock().unwrap().get(path)
    }

    /// Number of currently open user descriptors.
    pub fn open_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Open(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::CaptureConsole;
    use crate::flags::{O_CREAT, O_RDONLY, O_RDWR, O_TRUNC, O_WRONLY};
    use wasmbox_store::ByteStore;

    const WRITE_CREATE: OpenFlags = OpenFlags(O_WRONLY | O_CREAT | O_TRUNC);

    fn vfs() -> (Vfs, CaptureConsole) {
        let console = CaptureConsole::new();
        let vfs = Vfs::new(ByteStore::shared(), Box::new(console.clone()));
        (vfs, console)
    }

    #[test]
    fn write_commit_read_roundtrip() {
        let (mut vfs, _) = vfs();

        let fd = vfs.open("/x", WRITE_CREATE).unwrap();
        assert_eq!(fd, 3);
        assert_eq!(vfs.write(fd, b"hi"), 2);
        assert_eq!(vfs.close(fd), 0);

        let fd = vfs.open("/x", OpenFlags(O_RDONLY)).unwrap();
        assert_eq!(fd, 3, "slot is reused");
        let mut buf = [0u8; 4];
        assert_eq!(vfs.read(fd, &mut buf), 2);
        assert_eq!(&buf[..2], b"hi");
    }

    #[test]
    fn open_missing_without_write_intent_fails_and_allocates_nothing() {
        let (mut vfs, _) = vfs();

        assert_eq!(vfs.open("/missing", OpenFlags(O_RDONLY)).unwrap(), -1);
        assert_eq!(vfs.open("", WRITE_CREATE).unwrap(), -1);
        assert_eq!(vfs.open_count(), 0);

        // The next open still gets the first user slot.
        assert_eq!(vfs.open("/x", WRITE_CREATE).unwrap(), 3);
    }

    #[test]
    fn unsupported_flags_are_fatal_not_minus_one() {
        let (mut vfs, _) = vfs();
        assert!(vfs.open("/x", OpenFlags(O_RDWR | O_CREAT)).is_err());
    }

    #[test]
    fn slot_reuse_picks_lowest_free() {
        let (mut vfs, _) = vfs();

        let a = vfs.open("/a", WRITE_CREATE).unwrap();
        let b = vfs.open("/b", WRITE_CREATE).unwrap();
        assert_eq!((a, b), (3, 4));

        assert_eq!(vfs.close(a), 0);
        assert_eq!(vfs.open("/c", WRITE_CREATE).unwrap(), 3);
        assert_eq!(vfs.open("/d", WRITE_CREATE).unwrap(), 5);
    }

    #[test]
    fn writes_are_buffered_until_commit() {
        let (mut vfs, _) = vfs();

        let fd = vfs.open("/x", WRITE_CREATE).unwrap();
        assert_eq!(vfs.write(fd, b"pending"), 7);

        // Nothing committed yet: a second descriptor sees no file.
        assert_eq!(vfs.open("/x", OpenFlags(O_RDONLY)).unwrap(), -1);

        assert_eq!(vfs.close(fd), 0);
        assert_eq!(vfs.open("/x", OpenFlags(O_RDONLY)).unwrap(), 3);
    }

    #[test]
    fn last_committer_wins() {
        let (mut vfs, _) = vfs();

        let first = vfs.open("/x", WRITE_CREATE).unwrap();
        let second = vfs.open("/x", WRITE_CREATE).unwrap();
        vfs.write(first, b"first");
        vfs.write(second, b"second");
        vfs.close(first);
        vfs.close(second);

        let fd = vfs.open("/x", OpenFlags(O_RDONLY)).unwrap();
        let mut buf = [0u8; 16];
        let n = vfs.read(fd, &mut buf);
        assert_eq!(&buf[..n], b"second");
    }

    #[test]
    fn read_past_end_returns_zero_without_moving_cursor() {
        let (mut vfs, _) = vfs();

        let fd = vfs.open("/x", WRITE_CREATE).unwrap();
        vfs.write(fd, b"abc");
        vfs.close(fd);

        let fd = vfs.open("/x", OpenFlags(O_RDONLY)).unwrap();
        assert_eq!(vfs.lseek(fd, 10, Whence::Set as i32), 10);
        let mut buf = [0u8; 4];
        assert_eq!(vfs.read(fd, &mut buf), 0);
        // Cursor unchanged: seeking back by the same relative amount lands on 10.
        assert_eq!(vfs.lseek(fd, 0, Whence::Cur as i32), 10);
    }

    #[test]
    fn tmpfile_readback_after_lseek_commit() {
        let (mut vfs, _) = vfs();

        let fd = vfs.tmpfile();
        assert_eq!(fd, 3);
        assert_eq!(vfs.write(fd, b"ab"), 2);
        assert_eq!(vfs.lseek(fd, 0, Whence::Set as i32), 0);

        let mut buf = [0u8; 2];
        assert_eq!(vfs.read(fd, &mut buf), 2);
        assert_eq!(&buf, b"ab");
    }

    #[test]
    fn tmpfile_is_unreadable_before_commit() {
        let (mut vfs, _) = vfs();

        let fd = vfs.tmpfile();
        vfs.write(fd, b"ab");
        let mut buf = [0u8; 2];
        assert_eq!(vfs.read(fd, &mut buf), 0);
    }

    #[test]
    fn lseek_end_is_relative_to_backing_length() {
        let (mut vfs, _) = vfs();

        let fd = vfs.open("/x", WRITE_CREATE).unwrap();
        vfs.write(fd, b"hello");
        // lseek commits first, so END already sees the five bytes.
        assert_eq!(vfs.lseek(fd, 0, Whence::End as i32), 5);
        assert_eq!(vfs.lseek(fd, -2, Whence::End as i32), 3);
    }

    #[test]
    fn lseek_rejects_bad_descriptor_whence_and_negative_positions() {
        let (mut vfs, _) = vfs();

        assert_eq!(vfs.lseek(9, 0, Whence::Set as i32), -1);
        assert_eq!(vfs.lseek(1, 0, Whence::Set as i32), -1, "reserved fd");

        let fd = vfs.open("/x", WRITE_CREATE).unwrap();
        assert_eq!(vfs.lseek(fd, 0, 7), -1);
        assert_eq!(vfs.lseek(fd, -1, Whence::Set as i32), -1);
    }

    #[test]
    fn stdout_and_stderr_forward_to_console() {
        let (mut vfs, console) = vfs();

        assert_eq!(vfs.write(1, b"out "), 4);
        assert_eq!(vfs.write(2, b"err"), 3);
        assert_eq!(console.contents(), "out err");
    }

    #[test]
    fn stdin_swallows_writes_and_reads_nothing() {
        let (mut vfs, console) = vfs();

        assert_eq!(vfs.write(0, b"gone"), 4);
        assert_eq!(console.contents(), "");

        let mut buf = [0u8; 4];
        assert_eq!(vfs.read(0, &mut buf), 0);
    }

    #[test]
    fn bad_descriptors_read_and_write_zero() {
        let (mut vfs, _) = vfs();

        let mut buf = [0u8; 4];
        assert_eq!(vfs.read(99, &mut buf), 0);
        assert_eq!(vfs.read(-1, &mut buf), 0);
        assert_eq!(vfs.write(99, b"x"), 0);
        assert_eq!(vfs.write(-1, b"x"), 0);
        assert_eq!(vfs.close(99), -1);
        assert_eq!(vfs.close(1), -1, "reserved fd");
    }

    #[test]
    fn write_without_write_intent_returns_zero() {
        let (mut vfs, _) = vfs();

        let fd = vfs.open("/x", WRITE_CREATE).unwrap();
        vfs.write(fd, b"data");
        vfs.close(fd);

        let fd = vfs.open("/x", OpenFlags(O_RDONLY)).unwrap();
        assert_eq!(vfs.write(fd, b"nope"), 0);
    }

    #[test]
    fn partial_reads_advance_the_cursor() {
        let (mut vfs, _) = vfs();

        let fd = vfs.open("/x", WRITE_CREATE).unwrap();
        vfs.write(fd, b"abcdef");
        vfs.close(fd);

        let fd = vfs.open("/x", OpenFlags(O_RDONLY)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(vfs.read(fd, &mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(vfs.read(fd, &mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(vfs.read(fd, &mut buf), 0);
    }
}

//! The syscall shim: host functions the guest may call.
//!
//! Every binding lives in the import module `"c"`, matching the guest
//! toolchain's import names. Bindings that touch linear memory validate the
//! guest-supplied offset/length pair against the current buffer size before
//! dereferencing anything - guest pointers are untrusted offsets, nothing
//! more. Out-of-bounds access is a fatal [`ProcError::OutOfBounds`] that
//! aborts the run; ordinary file conditions stay in-band as the negative
//! and zero returns the guest's libc expects.

use tracing::warn;
use wasmtime::{Caller, Linker, Memory};

use wasmbox_vfs::OpenFlags;

use crate::error::{ExitCalled, ProcError};
use crate::proc::{sys_brk, HostState};

/// `getcwd` result when the guest buffer is too small (negated ERANGE).
const ERANGE: i32 = -34;

fn oob(offset: u32, len: u32) -> wasmtime::Error {
    wasmtime::Error::new(ProcError::OutOfBounds {
        offset: offset.into(),
        len: len.into(),
    })
}

/// The guest's linear memory, which `load` installs before instantiation.
fn host_memory(caller: &Caller<'_, HostState>) -> wasmtime::Result<Memory> {
    caller
        .data()
        .memory
        .ok_or_else(|| wasmtime::Error::new(ProcError::NotLoaded))
}

/// Validate `offset..offset+len` against the current memory size.
fn checked_range(
    data: &[u8],
    offset: u32,
    len: u32,
) -> wasmtime::Result<std::ops::Range<usize>> {
    let start = offset as usize;
    let end = start
        .checked_add(len as usize)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| oob(offset, len))?;
    Ok(start..end)
}

/// Read a NUL-terminated UTF-8 string from linear memory.
///
/// An unterminated string runs off the end of memory, which is the same
/// contract violation as any other out-of-bounds access.
fn read_cstr(data: &[u8], offset: u32) -> wasmtime::Result<String> {
    let start = offset as usize;
    if start >= data.len() {
        return Err(oob(offset, 1));
    }
    let nul = data[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| oob(offset, (data.len() - start) as u32))?;
    Ok(String::from_utf8_lossy(&data[start..start + nul]).into_owned())
}

/// Register the full host-function table on `linker`.
pub(crate) fn add_to_linker(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(
        "c",
        "read",
        |mut caller: Caller<'_, HostState>, fd: i32, buf: u32, len: u32| -> wasmtime::Result<i32> {
            let memory = host_memory(&caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            let range = checked_range(data, buf, len)?;
            Ok(state.vfs.read(fd, &mut data[range]) as i32)
        },
    )?;

    linker.func_wrap(
        "c",
        "write",
        |mut caller: Caller<'_, HostState>, fd: i32, buf: u32, len: u32| -> wasmtime::Result<i32> {
            let memory = host_memory(&caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            let range = checked_range(data, buf, len)?;
            Ok(state.vfs.write(fd, &data[range]) as i32)
        },
    )?;

    linker.func_wrap(
        "c",
        "open",
        |mut caller: Caller<'_, HostState>,
         path: u32,
         flags: u32,
         _mode: u32|
         -> wasmtime::Result<i32> {
            if path == 0 {
                return Ok(-1);
            }
            let memory = host_memory(&caller)?;
            let rel = read_cstr(memory.data(&caller), path)?;
            if rel.is_empty() {
                return Ok(-1);
            }
            let abs = caller.data().abs_path(&rel);
            caller
                .data_mut()
                .vfs
                .open(&abs, OpenFlags(flags))
                .map_err(|e| wasmtime::Error::new(ProcError::Vfs(e)))
        },
    )?;

    linker.func_wrap(
        "c",
        "close",
        |mut caller: Caller<'_, HostState>, fd: i32| -> i32 { caller.data_mut().vfs.close(fd) },
    )?;

    linker.func_wrap(
        "c",
        "lseek",
        |mut caller: Caller<'_, HostState>, fd: i32, offset: i32, whence: i32| -> i32 {
            caller.data_mut().vfs.lseek(fd, offset.into(), whence) as i32
        },
    )?;

    linker.func_wrap(
        "c",
        "_tmpfile",
        |mut caller: Caller<'_, HostState>| -> i32 { caller.data_mut().vfs.tmpfile() },
    )?;

    linker.func_wrap(
        "c",
        "_brk",
        |mut caller: Caller<'_, HostState>, addr: u32| -> u32 { sys_brk(&mut caller, addr) },
    )?;

    linker.func_wrap(
        "c",
        "_getcwd",
        |mut caller: Caller<'_, HostState>, buf: u32, size: u32| -> wasmtime::Result<i32> {
            let cwd = caller.data().cwd.clone();
            let needed = cwd.len() + 1;
            if needed > size as usize {
                return Ok(ERANGE);
            }
            let memory = host_memory(&caller)?;
            let data = memory.data_mut(&mut caller);
            let range = checked_range(data, buf, needed as u32)?;
            data[range.start..range.end - 1].copy_from_slice(cwd.as_bytes());
            data[range.end - 1] = 0;
            Ok(needed as i32)
        },
    )?;

    linker.func_wrap(
        "c",
        "exit",
        |_caller: Caller<'_, HostState>, code: i32| -> wasmtime::Result<()> {
            Err(wasmtime::Error::new(ExitCalled(code)))
        },
    )?;

    linker.func_wrap(
        "c",
        "_memcpy",
        |mut caller: Caller<'_, HostState>, dst: u32, src: u32, len: u32| -> wasmtime::Result<()> {
            let memory = host_memory(&caller)?;
            let data = memory.data_mut(&mut caller);
            let src_range = checked_range(data, src, len)?;
            checked_range(data, dst, len)?;
            data.copy_within(src_range, dst as usize);
            Ok(())
        },
    )?;

    linker.func_wrap(
        "c",
        "putstr",
        |mut caller: Caller<'_, HostState>, ptr: u32| -> wasmtime::Result<()> {
            let memory = host_memory(&caller)?;
            let text = read_cstr(memory.data(&caller), ptr)?;
            caller.data_mut().vfs.write(1, text.as_bytes());
            Ok(())
        },
    )?;

    linker.func_wrap(
        "c",
        "puti",
        |mut caller: Caller<'_, HostState>, value: i32| {
            caller.data_mut().vfs.write(1, value.to_string().as_bytes());
        },
    )?;

    linker.func_wrap(
        "c",
        "showGraphic",
        |mut caller: Caller<'_, HostState>, width: u32, height: u32, ptr: u32| -> wasmtime::Result<()> {
            let len = width
                .checked_mul(height)
                .and_then(|px| px.checked_mul(4))
                .ok_or_else(|| oob(ptr, u32::MAX))?;
            let memory = host_memory(&caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            let range = checked_range(data, ptr, len)?;
            match state.display.as_mut() {
                Some(display) => display.show(width, height, &data[range]),
                None => warn!(width, height, "guest display call with no sink registered"),
            }
            Ok(())
        },
    )?;

    // Numeric helpers the guest's libm lowers to.
    linker.func_wrap("c", "sin", |x: f64| -> f64 { x.sin() })?;
    linker.func_wrap("c", "cos", |x: f64| -> f64 { x.cos() })?;
    linker.func_wrap("c", "sqrt", |x: f64| -> f64 { x.sqrt() })?;
    linker.func_wrap("c", "fabs", |x: f64| -> f64 { x.abs() })?;
    linker.func_wrap("c", "drand48", || -> f64 { rand::random::<f64>() })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_range_accepts_in_bounds() {
        let data = [0u8; 16];
        assert_eq!(checked_range(&data, 0, 16).unwrap(), 0..16);
        assert_eq!(checked_range(&data, 8, 0).unwrap(), 8..8);
    }

    #[test]
    fn checked_range_rejects_overflow_and_overrun() {
        let data = [0u8; 16];
        assert!(checked_range(&data, 8, 9).is_err());
        assert!(checked_range(&data, u32::MAX, 2).is_err());
    }

    #[test]
    fn read_cstr_stops_at_nul() {
        let data = b"abc\0de\0";
        assert_eq!(read_cstr(data, 0).unwrap(), "abc");
        assert_eq!(read_cstr(data, 4).unwrap(), "de");
    }

    #[test]
    fn read_cstr_requires_termination_in_bounds() {
        let data = b"abc";
        assert!(read_cstr(data, 0).is_err());
        assert!(read_cstr(data, 3).is_err());
    }
}

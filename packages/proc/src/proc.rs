//! The process runtime: one guest binary, one linear memory, one lifecycle.

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wasmtime::{
    AsContextMut, Engine, Instance, Linker, Memory, MemoryType, Module, Store, TypedFunc, Val,
};

use wasmbox_store::SharedStore;
use wasmbox_vfs::{Console, Vfs};

use crate::config::{ProcConfig, PAGE_SIZE};
use crate::display::DisplaySink;
use crate::error::{ExitCalled, ProcError, Result};
use crate::provider::BinaryProvider;
use crate::shim;

/// Unique identifier for a process runtime instance, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(Uuid);

impl ProcId {
    /// Create a new random ProcId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProcId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a process runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Runtime exists, no guest loaded yet.
    Created,
    /// Guest binary instantiated, entry point not yet invoked.
    Loaded,
    /// Entry point is executing.
    Running,
    /// The guest finished, by returning or by calling `exit`.
    Exited(i32),
    /// A fatal runtime condition aborted the run.
    Faulted,
}

/// How a guest run ended.
///
/// Both variants are success-with-status: `Returned` means the entry point
/// came back normally, `Exited` means the guest called `exit` and the run
/// was aborted mid-flight. Faults are `Err(ProcError)` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The entry point returned this status code.
    Returned(i32),
    /// The guest called `exit` with this status code.
    Exited(i32),
}

impl Termination {
    /// The exit status, however it was produced.
    pub fn status(self) -> i32 {
        match self {
            Termination::Returned(code) | Termination::Exited(code) => code,
        }
    }
}

/// State the syscall shim sees on every reentry from the guest.
pub(crate) struct HostState {
    pub(crate) id: ProcId,
    pub(crate) memory: Option<Memory>,
    pub(crate) vfs: Vfs,
    pub(crate) cwd: String,
    /// Start of the guest heap; `brk` requests below this are rejected.
    pub(crate) heap_start: u32,
    /// Current break pointer.
    pub(crate) brk: u32,
    pub(crate) display: Option<Box<dyn DisplaySink>>,
}

impl HostState {
    /// Resolve `path` against the current working directory.
    ///
    /// Absolute paths (leading separator) pass through unchanged.
    pub(crate) fn abs_path(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else if self.cwd == "/" {
            format!("/{path}")
        } else {
            format!("{}/{}", self.cwd, path)
        }
    }
}

/// Round `addr` up to an 8-byte boundary.
pub(crate) fn align8(addr: u32) -> u32 {
    (addr + 7) & !7
}

/// Move the break pointer to `addr`, growing linear memory if needed.
///
/// Requests below the heap start are rejected and return the unchanged
/// break. Growth happens in whole 64 KiB pages, the smallest count covering
/// the shortfall. Growth failure (the configured cap) is not a runtime
/// fault: it logs and returns the unchanged break, and the guest's `malloc`
/// sees an ordinary out-of-memory condition.
pub(crate) fn sys_brk(mut ctx: impl AsContextMut<Data = HostState>, addr: u32) -> u32 {
    let (memory, heap_start, old_brk) = {
        let state = ctx.as_context().data();
        (state.memory, state.heap_start, state.brk)
    };
    if addr < heap_start {
        return old_brk;
    }
    let Some(memory) = memory else {
        return old_brk;
    };

    let size = memory.data_size(&ctx) as u64;
    if u64::from(addr) > size {
        let shortfall = u64::from(addr) - size;
        let pages = shortfall.div_ceil(PAGE_SIZE);
        if let Err(err) = memory.grow(&mut ctx, pages) {
            warn!(%err, addr, "memory growth failed, break unchanged");
            return old_brk;
        }
        debug!(pages, addr, "grew linear memory");
    }
    ctx.as_context_mut().data_mut().brk = addr;
    addr
}

/// A process runtime hosting one guest binary.
///
/// Owns the guest's linear memory and break pointer, marshals argv into
/// that memory, exposes the syscall shim, and drives the guest from load
/// through exit. One instance hosts one run; state that must survive across
/// runs travels through the [`SharedStore`] handed to `new`.
pub struct WasmProc {
    engine: Engine,
    store: Store<HostState>,
    linker: Linker<HostState>,
    entry: Option<TypedFunc<(i32, u32), i32>>,
    state: ProcState,
    config: ProcConfig,
}

impl WasmProc {
    /// Create a runtime over `files`, with stdout/stderr going to `console`.
    pub fn new(
        files: SharedStore,
        console: Box<dyn Console>,
        config: ProcConfig,
    ) -> Result<Self> {
        let engine = Engine::default();
        let store = Store::new(
            &engine,
            HostState {
                id: ProcId::new(),
                memory: None,
                vfs: Vfs::new(files, console),
                cwd: "/".to_string(),
                heap_start: 0,
                brk: 0,
                display: None,
            },
        );
        let mut linker = Linker::new(&engine);
        shim::add_to_linker(&mut linker)?;

        Ok(Self {
            engine,
            store,
            linker,
            entry: None,
            state: ProcState::Created,
            config,
        })
    }

    /// This runtime's identifier.
    pub fn id(&self) -> ProcId {
        self.store.data().id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcState {
        self.state
    }

    /// Register the sink that receives frames from the display-show
    /// primitive. Without one, guest display calls are logged no-ops.
    pub fn register_display(&mut self, sink: Box<dyn DisplaySink>) {
        self.store.data_mut().display = Some(sink);
    }

    /// Change the current working directory used for path resolution.
    pub fn chdir(&mut self, dir: &str) {
        self.store.data_mut().cwd = dir.to_string();
    }

    /// The current working directory.
    pub fn cwd(&self) -> &str {
        &self.store.data().cwd
    }

    /// Store a file at `path` (resolved against the cwd) in the shared store.
    pub fn save_file(&mut self, path: &str, bytes: impl Into<Bytes>) {
        let abs = self.store.data().abs_path(path);
        self.store.data_mut().vfs.save_file(&abs, bytes.into());
    }

    /// Load a file at `path` (resolved against the cwd) from the shared store.
    pub fn load_file(&self, path: &str) -> Option<Bytes> {
        let abs = self.store.data().abs_path(path);
        self.store.data().vfs.load_file(&abs)
    }

    /// Fetch, compile, and instantiate the guest binary.
    ///
    /// This is the only suspension point in the runtime: the provider may
    /// await storage or network. A fresh linear memory of
    /// `config.initial_pages` (growable to `config.max_pages`) is created
    /// and handed to the guest as `env.memory`. If the guest exports the
    /// stack-pointer global `$_SP`, the heap start and break pointer are
    /// initialized just past it, rounded up to 8 bytes.
    pub async fn load(&mut self, provider: &dyn BinaryProvider) -> Result<()> {
        let bytes = provider.fetch().await?;
        let module = Module::new(&self.engine, &bytes)?;

        let ty = MemoryType::new(
            self.config.initial_pages.into(),
            Some(self.config.max_pages.into()),
        );
        let memory = Memory::new(&mut self.store, ty)?;
        self.store.data_mut().memory = Some(memory);
        self.linker.define(&self.store, "env", "memory", memory)?;

        let instance: Instance = self.linker.instantiate(&mut self.store, &module)?;

        if let Some(global) = instance.get_global(&mut self.store, "$_SP") {
            if let Val::I32(sp) = global.get(&mut self.store) {
                let start = align8(sp as u32);
                let state = self.store.data_mut();
                state.heap_start = start;
                state.brk = start;
            }
        }

        let entry = instance
            .get_typed_func::<(i32, u32), i32>(&mut self.store, "main")
            .map_err(|_| ProcError::MissingExport("main".to_string()))?;
        self.entry = Some(entry);
        self.state = ProcState::Loaded;
        debug!(id = %self.id(), heap_start = self.store.data().heap_start, "guest loaded");
        Ok(())
    }

    /// Run the guest's entry point with the given argument vector.
    ///
    /// Marshals `args` into linear memory and calls `main(argc, argv)`. The
    /// call is synchronous; the guest may reenter the runtime arbitrarily
    /// many times through host functions before it finishes. A guest `exit`
    /// short-circuits everything and surfaces as `Termination::Exited`.
    pub fn run<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Termination> {
        let entry = self.entry.clone().ok_or(ProcError::NotLoaded)?;
        let (argc, argv) = self.marshal_args(args)?;

        self.state = ProcState::Running;
        info!(id = %self.id(), argc, "running guest");

        match entry.call(&mut self.store, (argc, argv)) {
            Ok(code) => {
                self.state = ProcState::Exited(code);
                Ok(Termination::Returned(code))
            }
            Err(err) => match err.downcast::<ExitCalled>() {
                Ok(ExitCalled(code)) => {
                    self.state = ProcState::Exited(code);
                    Ok(Termination::Exited(code))
                }
                Err(err) => {
                    self.state = ProcState::Faulted;
                    match err.downcast::<ProcError>() {
                        Ok(fault) => Err(fault),
                        Err(err) => Err(ProcError::Wasm(err)),
                    }
                }
            },
        }
    }

    /// Build the argv image in linear memory.
    ///
    /// Layout: one pointer-sized (4-byte) slot per argument plus a trailing
    /// null pointer, followed immediately by the NUL-terminated UTF-8 bytes
    /// of each argument. The image starts 8-byte aligned at the current
    /// break, which is grown to fit. Returns `(argc, argv_address)`.
    pub fn marshal_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<(i32, u32)> {
        let encoded: Vec<&[u8]> = args.iter().map(|a| a.as_ref().as_bytes()).collect();
        let strings_len: usize = encoded.iter().map(|a| a.len() + 1).sum();
        let table_len = 4 * (encoded.len() + 1);

        let table_addr = align8(self.store.data().brk);
        let strings_addr = table_addr + table_len as u32;
        let new_brk = align8(strings_addr + strings_len as u32);
        if sys_brk(&mut self.store, new_brk) != new_brk {
            return Err(ProcError::MemoryExhausted);
        }

        let memory = self.store.data().memory.ok_or(ProcError::NotLoaded)?;
        let data = memory.data_mut(&mut self.store);

        let mut cursor = strings_addr;
        for (i, arg) in encoded.iter().enumerate() {
            let slot = table_addr as usize + 4 * i;
            data[slot..slot + 4].copy_from_slice(&cursor.to_le_bytes());

            let start = cursor as usize;
            data[start..start + arg.len()].copy_from_slice(arg);
            data[start + arg.len()] = 0;
            cursor += arg.len() as u32 + 1;
        }
        let null_slot = table_addr as usize + 4 * encoded.len();
        data[null_slot..null_slot + 4].copy_from_slice(&0u32.to_le_bytes());

        Ok((encoded.len() as i32, table_addr))
    }

    /// Host-side break adjustment; same semantics as the guest's `brk`.
    pub fn brk(&mut self, addr: u32) -> u32 {
        sys_brk(&mut self.store, addr)
    }

    /// The current break pointer.
    pub fn break_addr(&self) -> u32 {
        self.store.data().brk
    }

    /// Start of the guest heap.
    pub fn heap_start(&self) -> u32 {
        self.store.data().heap_start
    }

    /// Current size of linear memory in bytes.
    pub fn memory_size(&self) -> Result<usize> {
        let memory = self.store.data().memory.ok_or(ProcError::NotLoaded)?;
        Ok(memory.data_size(&self.store))
    }

    /// Copy `len` bytes of linear memory starting at `offset`.
    ///
    /// Bounds-checked like every other access the host performs on behalf
    /// of the guest.
    pub fn read_memory(&self, offset: u32, len: u32) -> Result<Vec<u8>> {
        let memory = self.store.data().memory.ok_or(ProcError::NotLoaded)?;
        let data = memory.data(&self.store);
        let start = offset as usize;
        let end = start + len as usize;
        if end > data.len() {
            return Err(ProcError::OutOfBounds {
                offset: offset.into(),
                len: len.into(),
            });
        }
        Ok(data[start..end].to_vec())
    }
}

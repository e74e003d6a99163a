//! # wasmbox-proc
//!
//! The process runtime: hosts one precompiled WASM guest binary inside a
//! sandboxed linear memory and gives it an operating-system personality -
//! heap growth, file descriptors, buffered writes, an argv image - without
//! any native process or file abstraction underneath.
//!
//! ## Lifecycle
//!
//! A [`WasmProc`] moves through `Created -> Loaded -> Running -> Exited |
//! Faulted`. [`WasmProc::load`] fetches and instantiates the guest (the
//! only asynchronous step); [`WasmProc::run`] marshals an argument vector
//! into linear memory and calls the guest's `main`. The guest reenters the
//! runtime through the syscall shim - `open`, `read`, `write`, `close`,
//! `lseek`, `tmpfile`, `brk`, `getcwd`, `exit`, plus numeric helpers and a
//! raw memory copy - all synchronous, all bounds-checked.
//!
//! ## One runtime per run
//!
//! A runtime instance owns its linear memory, descriptor table, and break
//! pointer exclusively; nothing in the core needs a lock. Sequenced runs
//! (compile a program, then execute its output) each get a fresh
//! `WasmProc`, sharing only the byte store that carries files between them:
//!
//! ```ignore
//! let files = ByteStore::shared();
//!
//! let mut cc = WasmProc::new(files.clone(), console(), ProcConfig::default())?;
//! cc.chdir("/home/wasm");
//! cc.save_file("main.c", source);
//! cc.load(&compiler_binary).await?;
//! cc.run(&["cc", "-emain", "main.c"])?;
//!
//! let mut prog = WasmProc::new(files, console(), ProcConfig::default())?;
//! prog.chdir("/home/wasm");
//! let binary = prog.load_file("a.wasm").expect("compiler output");
//! prog.load(&BytesProvider::new(binary.to_vec())).await?;
//! let status = prog.run(&["a.wasm"])?;
//! ```
//!
//! ## No timeouts
//!
//! The core enforces no execution limits: a guest that loops forever blocks
//! its caller indefinitely. Embedders that need hardening should wrap `run`
//! with their own watchdog (e.g. wasmtime fuel or epochs).

pub mod config;
pub mod display;
pub mod error;
pub mod proc;
pub mod provider;
mod shim;

pub use config::{ProcConfig, PAGE_SIZE};
pub use display::DisplaySink;
pub use error::{ExitCalled, ProcError, Result};
pub use proc::{ProcId, ProcState, Termination, WasmProc};
pub use provider::{BinaryProvider, BytesProvider, FileProvider};

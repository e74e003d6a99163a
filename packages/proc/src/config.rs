//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// WASM page granularity: memory grows in 64 KiB units.
pub const PAGE_SIZE: u64 = 64 * 1024;

/// Configuration for one process runtime instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcConfig {
    /// Pages of linear memory the guest starts with.
    pub initial_pages: u32,

    /// Hard cap on linear memory, in pages. `brk` growth beyond this fails
    /// softly (the break stays put); the cap itself is never exceeded.
    pub max_pages: u32,
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            initial_pages: 10,
            max_pages: 100,
        }
    }
}

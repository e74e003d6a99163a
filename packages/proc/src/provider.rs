//! Guest binary providers.
//!
//! Fetching the guest binary is the only asynchronous step in the whole
//! core: the bytes may come from storage, a network, or an in-memory buffer
//! the caller already holds. Everything after the fetch is synchronous.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;

/// Supplies the raw bytes of a guest binary.
#[async_trait]
pub trait BinaryProvider: Send + Sync {
    /// Fetch the complete guest binary.
    async fn fetch(&self) -> io::Result<Vec<u8>>;
}

/// Provider over a buffer the caller already holds.
#[derive(Debug, Clone)]
pub struct BytesProvider {
    bytes: Vec<u8>,
}

impl BytesProvider {
    /// Wrap an in-memory guest binary.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl BinaryProvider for BytesProvider {
    async fn fetch(&self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Provider that reads the guest binary from the host file system.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    /// Fetch from `path` on each load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BinaryProvider for FileProvider {
    async fn fetch(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

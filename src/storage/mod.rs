use std::fmt::Debug;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

pub mod disk;
pub mod memory;
pub mod page;

/// A page-granular storage device. Pages are opaque PAGE_SIZE byte blocks
/// keyed by page id; the device has no notion of allocation, a read of a
/// page that was never written yields zeroes.
///
/// The DiskManager trait is designed as `trait object` compatible so the
/// buffer pool can be composed with any backing device at runtime.
pub trait DiskManager: Debug + Send + Sync {
    /// Read the page with the given id into buf, which must be exactly
    /// PAGE_SIZE bytes long.
    fn read_page(&mut self, page_id: page::PageId, buf: &mut [u8]) -> Result<()>;

    /// Persist PAGE_SIZE bytes of data as the page with the given id,
    /// overwriting the previous contents if any.
    fn write_page(&mut self, page_id: page::PageId, data: &[u8]) -> Result<()>;

    /// Flushes any buffered writes to the underlying storage medium.
    fn flush(&self) -> Result<()>;
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Memory,
    File,
}

pub fn new_disk_manager(typ: StorageType, path: &Path) -> Result<Box<dyn DiskManager>> {
    match typ {
        StorageType::Memory => Ok(Box::new(memory::MemoryDiskManager::new())),
        StorageType::File => Ok(Box::new(disk::FileDiskManager::open(path)?)),
    }
}

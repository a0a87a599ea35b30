use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::page::{PageId, PAGE_SIZE};
use super::DiskManager;
use crate::error::{Error, Result};

/// An in-memory page device, mainly for testing and embedding. The page map
/// is behind a shared handle so a clone taken before the manager boxes the
/// device can still observe what was written back.
#[derive(Debug, Clone)]
pub struct MemoryDiskManager {
    pages: Arc<Mutex<HashMap<PageId, Vec<u8>>>>,
}

impl MemoryDiskManager {
    pub fn new() -> MemoryDiskManager {
        MemoryDiskManager { pages: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Snapshot of the stored page, None if the page was never written.
    pub fn page(&self, page_id: PageId) -> Option<Vec<u8>> {
        let pages = self.pages.lock().unwrap();
        pages.get(&page_id).cloned()
    }
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        MemoryDiskManager::new()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        if buf.len() != PAGE_SIZE {
            return Err(Error::value(format!("page buffer must be {} bytes", PAGE_SIZE)));
        }
        let pages = self.pages.lock()?;
        match pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(Error::value(format!("page buffer must be {} bytes", PAGE_SIZE)));
        }
        let mut pages = self.pages.lock()?;
        pages.insert(page_id, data.to_vec());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() -> Result<()> {
        let mut m = MemoryDiskManager::new();

        // a page that was never written reads as zeroes
        let mut buf = vec![0xff; PAGE_SIZE];
        m.read_page(3, &mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        // write & read back
        let mut data = vec![0; PAGE_SIZE];
        data[..5].copy_from_slice(b"hello");
        m.write_page(3, &data)?;
        m.read_page(3, &mut buf)?;
        assert_eq!(data, buf);

        // overwrite
        data[..5].copy_from_slice(b"world");
        m.write_page(3, &data)?;
        assert_eq!(Some(data), m.page(3));

        Ok(())
    }

    #[test]
    fn test_rejects_short_buffer() {
        let mut m = MemoryDiskManager::new();
        let mut buf = vec![0; 16];
        assert!(m.read_page(0, &mut buf).is_err());
        assert!(m.write_page(0, &buf).is_err());
    }
}

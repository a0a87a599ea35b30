use std::ops::Deref;
use std::sync::RwLock;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Reserved sentinel for a frame that holds no page.
pub const INVALID_PAGE_ID: PageId = -1;

pub type PageId = i64;

/// Index into the buffer pool's frame array, in range [0, pool_size).
pub type FrameId = usize;

/// The actual page data that include in-memory metadata
/// like dirty bit and pin count etc. and the data on storage.
pub struct PageData {
    pub id: PageId,
    pub data: Vec<u8>,
    pub is_dirty: bool,
    pub pin_count: i32,
}

impl PageData {
    fn new() -> Self {
        Self {
            id: INVALID_PAGE_ID,
            data: vec![0; PAGE_SIZE],
            is_dirty: false,
            pin_count: 0,
        }
    }

    /// Zero the buffer and drop the metadata back to the unused state.
    pub fn reset(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.is_dirty = false;
        self.pin_count = 0;
        self.data.fill(0);
    }
}

/// Page act as the container of the actual page data for
/// providing concurrent access protection.
pub struct Page {
    inner: RwLock<PageData>,
}

impl Page {
    /// Allocate a page frame in memory with the PAGE_SIZE buffer zeroed
    /// and the metadata marked unused.
    pub fn new() -> Self {
        Page { inner: RwLock::new(PageData::new()) }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl Deref for Page {
    type Target = RwLock<PageData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_reset() {
        let page = Page::new();
        let mut guard = page.write().unwrap();
        guard.id = 7;
        guard.pin_count = 2;
        guard.is_dirty = true;
        guard.data[0] = 0xab;

        guard.reset();
        assert_eq!(INVALID_PAGE_ID, guard.id);
        assert_eq!(0, guard.pin_count);
        assert!(!guard.is_dirty);
        assert_eq!(PAGE_SIZE, guard.data.len());
        assert!(guard.data.iter().all(|&b| b == 0));
    }
}

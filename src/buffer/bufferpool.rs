use std::sync::{Arc, Mutex};

use log::debug;

use crate::container::hash::{ExtendibleHashTable, DEFAULT_BUCKET_SIZE};
use crate::error::{Error, Result};
use crate::storage::page::{FrameId, Page, PageId, INVALID_PAGE_ID};
use crate::storage::DiskManager;

use super::replacer::{Replacer, SyncLRUKReplacer};

/// The buffer pool is responsible for moving physical pages back and forth
/// from main memory to disk. It allows a DBMS to support databases that are
/// larger than the amount of memory available to the system.
///
/// The buffer pool's operations are transparent to other parts of the
/// system. For example, the system asks the buffer pool for a page using its
/// unique identifier (page_id) and it does not know whether that page is
/// already in memory or whether the system has to retrieve it from disk.
struct BufferPool {
    pool_size: usize,
    /// The backing page device.
    disk: Box<dyn DiskManager>,
    /// Array of buffer pool pages. The array index is the FrameId, i.e.,
    /// the FrameId is in range [0, pool_size).
    pages: Vec<Arc<Page>>,
    /// Page table for keeping track of buffer pool pages.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// List of free frames that don't have any pages on them.
    free_list: Vec<FrameId>,
    /// Replacer to find unpinned pages for replacement.
    replacer: Arc<dyn Replacer>,
    /// The next page id to be allocated.
    next_page_id: PageId,
}

impl BufferPool {
    fn new(disk: Box<dyn DiskManager>, pool_size: usize, replacer_k: usize, bucket_size: usize) -> Self {
        let mut pages = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        let page_table = ExtendibleHashTable::new(bucket_size);
        let replacer: Arc<dyn Replacer> = Arc::new(SyncLRUKReplacer::new(replacer_k, pool_size));
        for i in 0..pool_size {
            pages.push(Arc::new(Page::new()));
            // initially, every frame is in the free list
            free_list.push(i);
        }
        BufferPool { pool_size, disk, pages, page_table, free_list, replacer, next_page_id: 0 }
    }

    /// Obtain a frame to place a page on, from the free list if one is
    /// available and by eviction otherwise. An evicted page is written back
    /// to disk first if it is dirty and its page table mapping is removed.
    /// The frame comes back reset.
    fn take_frame(&mut self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }
        let Some(frame_id) = self.replacer.evict() else {
            // every frame is pinned
            return Err(Error::BufferPoolNoAvailableFrame);
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.id != INVALID_PAGE_ID {
            if guard.is_dirty {
                debug!("writing back dirty page {} before reusing frame {}", guard.id, frame_id);
                self.disk.write_page(guard.id, &guard.data)?;
                guard.is_dirty = false;
            }
            // unlink the old page from the page table; the replacer already
            // dropped its tracking state on eviction
            self.page_table.remove(&guard.id);
        }
        guard.reset();
        Ok(frame_id)
    }

    /// Create a new page in the buffer pool, or fail with
    /// BufferPoolNoAvailableFrame if all frames are currently in use and
    /// not evictable (in other words, pinned).
    ///
    /// The replacement frame comes from either the free list or the
    /// replacer (always the free list first), then allocate_page issues the
    /// new page id. The new page starts pinned, so the replacer wouldn't
    /// evict the frame before the buffer pool "unpins" it.
    fn new_page(&mut self) -> Result<Arc<Page>> {
        let frame_id = self.take_frame()?;
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        let page_id = self.allocate_page();
        guard.id = page_id;
        guard.pin_count = 1;
        // link the new page with the frame in the page table
        self.page_table.insert(page_id, frame_id);
        // record the access and pin the frame
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        drop(guard);
        Ok(page)
    }

    /// Fetch the requested page from the buffer pool, reading it from disk
    /// on a miss. Fails with BufferPoolNoAvailableFrame if the page needs to
    /// be fetched from disk but all frames are currently in use and not
    /// evictable (in other words, pinned).
    fn fetch_page(&mut self, page_id: PageId) -> Result<Arc<Page>> {
        // check if the page table has the page id already
        if let Some(frame_id) = self.page_table.find(&page_id) {
            let page = Arc::clone(&self.pages[frame_id]);
            page.write()?.pin_count += 1;
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(page);
        }

        // page not resident, pick a replacement frame and read it from disk
        let frame_id = self.take_frame()?;
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        if let Err(err) = self.disk.read_page(page_id, &mut guard.data) {
            // the frame is reset and unmapped, give it back before bailing
            drop(guard);
            self.free_list.push(frame_id);
            return Err(err);
        }
        guard.id = page_id;
        guard.pin_count = 1;
        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        drop(guard);
        Ok(page)
    }

    /// Unpin the target page. Returns false if the page is not resident or
    /// its pin count is already zero.
    ///
    /// A true is_dirty marks the page dirty, a false one never cleans it.
    /// When the pin count reaches zero the frame becomes evictable.
    fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> bool {
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let page = &self.pages[frame_id];
        let Ok(mut guard) = page.write() else {
            return false;
        };
        if guard.pin_count <= 0 {
            return false;
        }
        guard.pin_count -= 1;
        guard.is_dirty = guard.is_dirty || is_dirty;
        if guard.pin_count == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Flush the target page to disk regardless of the dirty flag and unset
    /// the dirty flag. The pin count is left alone.
    ///
    /// Returns false if the page cannot be found in the page table, true
    /// otherwise.
    fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(false);
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        self.disk.write_page(guard.id, &guard.data)?;
        guard.is_dirty = false;
        Ok(true)
    }

    /// Flush every resident page in the buffer pool to disk.
    fn flush_all_pages(&mut self) -> Result<()> {
        debug!("flushing all resident pages");
        for frame_id in 0..self.pool_size {
            let page = Arc::clone(&self.pages[frame_id]);
            let mut guard = page.write()?;
            if guard.id == INVALID_PAGE_ID {
                continue;
            }
            self.disk.write_page(guard.id, &guard.data)?;
            guard.is_dirty = false;
        }
        Ok(())
    }

    /// Delete a page from the buffer pool. A page that is not resident is
    /// already as deleted as it gets, so that returns true. A pinned page
    /// cannot be deleted and returns false.
    ///
    /// Otherwise the page leaves the page table and the replacer, the frame
    /// is reset and goes back on the free list, and the page id is handed to
    /// the deallocator.
    fn delete_page(&mut self, page_id: PageId) -> Result<bool> {
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(true);
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.pin_count > 0 {
            debug_assert!(!self.replacer.is_evictable(frame_id));
            return Ok(false);
        }

        if guard.is_dirty {
            self.disk.write_page(guard.id, &guard.data)?;
            guard.is_dirty = false;
        }
        debug!("deleting page {} from frame {}", page_id, frame_id);
        self.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        guard.reset();
        self.free_list.push(frame_id);
        self.deallocate_page(page_id);
        Ok(true)
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }

    /// Deallocate the page on disk. The page device has no notion of
    /// allocation, so this does nothing; page ids are never reissued.
    fn deallocate_page(&mut self, _page_id: PageId) {}
}

/// Buffer pool manager wraps the buffer pool with a mutex for concurrent
/// access, basically all the heavy lifting happens in the buffer pool.
///
/// Frames are handed out as Arc<Page> handles; callers pair each successful
/// new_page/fetch_page with exactly one unpin_page, and must not touch the
/// handle once the pin is gone, since the frame can be reused for another
/// page from then on.
pub struct BufferPoolManager {
    /// The actual buffer pool, protected by one mutex latch. Disk I/O
    /// happens while holding it, which guarantees at most one concurrent
    /// load per page id.
    inner: Arc<Mutex<BufferPool>>,
}

impl BufferPoolManager {
    pub fn new(disk: Box<dyn DiskManager>, pool_size: usize, replacer_k: usize) -> Self {
        Self::with_bucket_size(disk, pool_size, replacer_k, DEFAULT_BUCKET_SIZE)
    }

    pub fn with_bucket_size(
        disk: Box<dyn DiskManager>,
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
    ) -> Self {
        let inner = BufferPool::new(disk, pool_size, replacer_k, bucket_size);
        BufferPoolManager { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Create a new page in the buffer pool, pinned once.
    pub fn new_page(&self) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.new_page()
    }

    /// Fetch the requested page with the given page id from the buffer
    /// pool, pinning it.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.fetch_page(page_id)
    }

    /// Unpin the target page, marking it dirty if is_dirty is true. Returns
    /// false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        inner.unpin_page(page_id, is_dirty)
    }

    /// Flush the target page to disk regardless of the dirty flag and unset
    /// the dirty flag.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.flush_page(page_id)
    }

    /// Flush all the resident pages in the buffer pool to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_all_pages()
    }

    /// Delete a page from the buffer pool. A non-resident page is vacuously
    /// deleted and returns true, a pinned one cannot be and returns false.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.delete_page(page_id)
    }

    /// Number of frames in the buffer pool.
    pub fn pool_size(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.pool_size
    }
}

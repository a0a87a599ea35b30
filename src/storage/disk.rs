use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::page::{PageId, PAGE_SIZE};
use super::DiskManager;
use crate::error::{Error, Result};

/// A single-file page device. Page p lives at byte offset p * PAGE_SIZE;
/// reading past the end of the file yields zeroes, which is what a page
/// that was never written looks like.
#[derive(Debug)]
pub struct FileDiskManager {
    file: File,
    path: PathBuf,
}

impl FileDiskManager {
    /// Open the database file at path, creating it if absent.
    pub fn open(path: &Path) -> Result<FileDiskManager> {
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        Ok(FileDiskManager { file, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset_of(&self, page_id: PageId) -> Result<u64> {
        let page_id = u64::try_from(page_id)
            .map_err(|_| Error::value(format!("invalid page id {}", page_id)))?;
        Ok(page_id * PAGE_SIZE as u64)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        if buf.len() != PAGE_SIZE {
            return Err(Error::value(format!("page buffer must be {} bytes", PAGE_SIZE)));
        }
        let offset = self.offset_of(page_id)?;
        self.file.seek(SeekFrom::Start(offset))?;
        // Read up to a full page; a short read means the tail of the page
        // lies past the end of the file and reads as zeroes.
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(Error::value(format!("page buffer must be {} bytes", PAGE_SIZE)));
        }
        let offset = self.offset_of(page_id)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_read_write() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pages.db");
        let mut disk = FileDiskManager::open(&path)?;

        // a page beyond the end of the file reads as zeroes
        let mut buf = vec![0xff; PAGE_SIZE];
        disk.read_page(9, &mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        // write two pages out of order and read them back
        let mut page1 = vec![0u8; PAGE_SIZE];
        page1.fill(0x11);
        let mut page0 = vec![0u8; PAGE_SIZE];
        page0.fill(0x22);
        disk.write_page(1, &page1)?;
        disk.write_page(0, &page0)?;
        disk.flush()?;

        disk.read_page(0, &mut buf)?;
        assert_eq!(page0, buf);
        disk.read_page(1, &mut buf)?;
        assert_eq!(page1, buf);

        // a negative page id is rejected
        assert!(disk.read_page(-1, &mut buf).is_err());

        Ok(())
    }

    #[test]
    fn test_reopen_preserves_pages() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pages.db");

        let mut data = vec![0u8; PAGE_SIZE];
        data[..4].copy_from_slice(b"keep");
        {
            let mut disk = FileDiskManager::open(&path)?;
            disk.write_page(5, &data)?;
            disk.flush()?;
        }

        let mut disk = FileDiskManager::open(&path)?;
        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(5, &mut buf)?;
        assert_eq!(data, buf);
        Ok(())
    }
}

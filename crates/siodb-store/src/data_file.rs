//! Uniform data file handle.
//!
//! Everything the catalog persists goes through [`DataFile`], so the
//! choice between a plain and an encrypted file is made once, when the
//! handle is created, and the rest of the engine stays oblivious.

use crate::error::{Result, StorageError};
use std::fs::OpenOptions;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

/// Unix permission bits of newly created data files.
pub const DATA_FILE_CREATION_MODE: u32 = 0o660;

/// Positioned I/O over a single data file.
///
/// Offsets and lengths are in logical (plaintext) bytes regardless of the
/// on-disk representation. The file is closed when the handle is dropped.
pub trait DataFile: Send {
    /// Reads exactly `buf.len()` bytes at `offset`.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Writes all of `buf` at `offset`, extending the file if needed.
    fn write_all_at(&mut self, buf: &[u8], offset: u64) -> Result<()>;

    /// Logical file length in bytes.
    fn len(&self) -> Result<u64>;

    /// Returns true when the file holds no logical data.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncates or extends the file to `new_len` logical bytes.
    fn set_len(&mut self, new_len: u64) -> Result<()>;

    /// Flushes file content and metadata to stable storage.
    fn sync(&self) -> Result<()>;
}

/// Owning handle to a data file.
pub type DataFileRef = Box<dyn DataFile>;

/// Unencrypted data file backed directly by the filesystem.
pub struct PlainFile {
    file: std::fs::File,
    path: PathBuf,
}

impl PlainFile {
    /// Creates a new data file, truncating any existing one, and extends
    /// it to `initial_size` bytes.
    pub fn create<P: AsRef<Path>>(path: P, initial_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(DATA_FILE_CREATION_MODE)
            .open(path.as_ref())?;
        if initial_size > 0 {
            file.set_len(initial_size)?;
        }
        Ok(PlainFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Opens an existing data file for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        Ok(PlainFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Path this file was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataFile for PlainFile {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let file_size = self.file.metadata()?.len();
        if offset + buf.len() as u64 > file_size {
            return Err(StorageError::ReadBeyondEof {
                offset,
                length: buf.len(),
                file_size,
            });
        }
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    fn write_all_at(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        self.file.write_all_at(buf, offset)?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_len(&mut self, new_len: u64) -> Result<()> {
        self.file.set_len(new_len)?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

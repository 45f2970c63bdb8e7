//! Memory-mapped database metadata record.
//!
//! Every database keeps one fixed-size record at the root of its data
//! directory. The record is mapped into memory for the lifetime of the
//! database object, so transaction id allocation is a couple of in-memory
//! stores plus an eventual flush. All fields are little-endian; the
//! record size is a constant of the format and never changes within a
//! version.
//!
//! Layout (64 bytes):
//!
//! ```text
//! offset  size  field
//!      0     4  magic "SIOM"
//!      4     4  format version
//!      8     4  super user id
//!     12     4  schema version
//!     16     8  last transaction id
//!     24    40  reserved, zero
//! ```

use crate::error::{Result, StorageError};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Size of the metadata record, in bytes.
pub const DATABASE_METADATA_SIZE: usize = 64;

/// Current metadata record format version.
pub const DATABASE_METADATA_VERSION: u32 = 1;

const METADATA_MAGIC: &[u8; 4] = b"SIOM";

const OFFSET_MAGIC: usize = 0;
const OFFSET_VERSION: usize = 4;
const OFFSET_SUPER_USER_ID: usize = 8;
const OFFSET_SCHEMA_VERSION: usize = 12;
const OFFSET_LAST_TRANSACTION_ID: usize = 16;

/// Memory-mapped view of a database metadata file.
pub struct DatabaseMetadataFile {
    mmap: MmapMut,
}

impl DatabaseMetadataFile {
    /// Creates the metadata file with an initial record and maps it.
    pub fn create<P: AsRef<Path>>(path: P, super_user_id: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(crate::data_file::DATA_FILE_CREATION_MODE)
            .open(path.as_ref())?;
        file.set_len(DATABASE_METADATA_SIZE as u64)?;
        let mmap = unsafe { MmapOptions::new().len(DATABASE_METADATA_SIZE).map_mut(&file)? };
        let mut metadata = DatabaseMetadataFile { mmap };
        metadata.mmap[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(METADATA_MAGIC);
        metadata.write_u32(OFFSET_VERSION, DATABASE_METADATA_VERSION);
        metadata.write_u32(OFFSET_SUPER_USER_ID, super_user_id);
        metadata.write_u32(OFFSET_SCHEMA_VERSION, 1);
        metadata.write_u64(OFFSET_LAST_TRANSACTION_ID, 0);
        metadata.flush()?;
        Ok(metadata)
    }

    /// Opens and maps an existing metadata file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let file_size = file.metadata()?.len();
        if file_size < DATABASE_METADATA_SIZE as u64 {
            return Err(StorageError::Corrupted {
                path: path.as_ref().display().to_string(),
                message: format!("metadata file is too short: {} bytes", file_size),
            });
        }
        let mmap = unsafe { MmapOptions::new().len(DATABASE_METADATA_SIZE).map_mut(&file)? };
        let metadata = DatabaseMetadataFile { mmap };
        if &metadata.mmap[OFFSET_MAGIC..OFFSET_MAGIC + 4] != METADATA_MAGIC {
            return Err(StorageError::Corrupted {
                path: path.as_ref().display().to_string(),
                message: "bad metadata magic".to_string(),
            });
        }
        let version = metadata.read_u32(OFFSET_VERSION);
        if version != DATABASE_METADATA_VERSION {
            return Err(StorageError::Corrupted {
                path: path.as_ref().display().to_string(),
                message: format!("unsupported metadata version {}", version),
            });
        }
        Ok(metadata)
    }

    fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.mmap[offset..offset + 4].try_into().expect("4 bytes"))
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.mmap[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn read_u64(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.mmap[offset..offset + 8].try_into().expect("8 bytes"))
    }

    fn write_u64(&mut self, offset: usize, value: u64) {
        self.mmap[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Id of the superuser recorded at database creation.
    pub fn super_user_id(&self) -> u32 {
        self.read_u32(OFFSET_SUPER_USER_ID)
    }

    /// Schema version of the database.
    pub fn schema_version(&self) -> u32 {
        self.read_u32(OFFSET_SCHEMA_VERSION)
    }

    /// Most recently allocated transaction id.
    pub fn last_transaction_id(&self) -> u64 {
        self.read_u64(OFFSET_LAST_TRANSACTION_ID)
    }

    /// Allocates and records the next transaction id.
    ///
    /// Callers must serialize invocations; the database mutex does.
    pub fn generate_next_transaction_id(&mut self) -> u64 {
        let next = self.last_transaction_id() + 1;
        self.write_u64(OFFSET_LAST_TRANSACTION_ID, next);
        next
    }

    /// Flushes the mapped record to stable storage.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata");
        let metadata = DatabaseMetadataFile::create(&path, 1).unwrap();
        assert_eq!(metadata.super_user_id(), 1);
        assert_eq!(metadata.schema_version(), 1);
        assert_eq!(metadata.last_transaction_id(), 0);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            DATABASE_METADATA_SIZE as u64
        );
    }

    #[test]
    fn test_transaction_ids_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata");
        {
            let mut metadata = DatabaseMetadataFile::create(&path, 1).unwrap();
            assert_eq!(metadata.generate_next_transaction_id(), 1);
            assert_eq!(metadata.generate_next_transaction_id(), 2);
            metadata.flush().unwrap();
        }
        let mut metadata = DatabaseMetadataFile::open(&path).unwrap();
        assert_eq!(metadata.last_transaction_id(), 2);
        assert_eq!(metadata.generate_next_transaction_id(), 3);
    }

    #[test]
    fn test_open_rejects_short_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata");
        std::fs::write(&path, b"short").unwrap();
        assert!(matches!(
            DatabaseMetadataFile::open(&path),
            Err(StorageError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata");
        std::fs::write(&path, vec![0u8; DATABASE_METADATA_SIZE]).unwrap();
        assert!(matches!(
            DatabaseMetadataFile::open(&path),
            Err(StorageError::Corrupted { .. })
        ));
    }
}

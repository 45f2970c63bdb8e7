//! Encrypted data file.
//!
//! The file is organized as a plaintext header page followed by
//! fixed-size encrypted pages. Every allocated page is stored in full;
//! the header tracks the logical (plaintext) length. Page ciphertext is
//! authenticated, and the page index participates in the nonce, so both
//! tampering and page transplantation are detected on read.

use crate::cipher::CipherContext;
use crate::data_file::{DataFile, PlainFile};
use crate::error::{Result, StorageError};
use std::path::Path;

/// Plaintext bytes per encrypted page.
const PAGE_SIZE: usize = 4096;

/// Stored bytes per encrypted page (plaintext plus authentication tag).
const STORED_PAGE_SIZE: usize = PAGE_SIZE + CipherContext::PAGE_OVERHEAD;

/// Size of the plaintext file header.
const HEADER_SIZE: usize = 64;

const HEADER_MAGIC: &[u8; 4] = b"SIOE";
const HEADER_VERSION: u32 = 1;

/// Encrypted data file with positioned plaintext I/O.
pub struct EncryptedFile {
    inner: PlainFile,
    encryption: CipherContext,
    decryption: CipherContext,
    logical_len: u64,
}

impl EncryptedFile {
    /// Creates a new encrypted file and extends it to `initial_size`
    /// logical bytes of zeros.
    pub fn create<P: AsRef<Path>>(
        path: P,
        initial_size: u64,
        encryption: CipherContext,
        decryption: CipherContext,
    ) -> Result<Self> {
        let inner = PlainFile::create(path, 0)?;
        let mut file = EncryptedFile {
            inner,
            encryption,
            decryption,
            logical_len: 0,
        };
        file.write_header()?;
        if initial_size > 0 {
            file.set_len(initial_size)?;
        }
        Ok(file)
    }

    /// Opens an existing encrypted file.
    pub fn open<P: AsRef<Path>>(
        path: P,
        encryption: CipherContext,
        decryption: CipherContext,
    ) -> Result<Self> {
        let inner = PlainFile::open(path)?;
        let mut header = [0u8; HEADER_SIZE];
        inner.read_exact_at(&mut header, 0)?;
        if &header[0..4] != HEADER_MAGIC {
            return Err(StorageError::Corrupted {
                path: inner.path().display().to_string(),
                message: "bad encrypted file magic".to_string(),
            });
        }
        let version = u32::from_le_bytes(header[4..8].try_into().expect("4 bytes"));
        if version != HEADER_VERSION {
            return Err(StorageError::Corrupted {
                path: inner.path().display().to_string(),
                message: format!("unsupported encrypted file version {}", version),
            });
        }
        let logical_len = u64::from_le_bytes(header[8..16].try_into().expect("8 bytes"));
        Ok(EncryptedFile {
            inner,
            encryption,
            decryption,
            logical_len,
        })
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(HEADER_MAGIC);
        header[4..8].copy_from_slice(&HEADER_VERSION.to_le_bytes());
        header[8..16].copy_from_slice(&self.logical_len.to_le_bytes());
        self.inner.write_all_at(&header, 0)
    }

    fn page_count(&self) -> u64 {
        self.logical_len.div_ceil(PAGE_SIZE as u64)
    }

    fn page_offset(page_index: u64) -> u64 {
        HEADER_SIZE as u64 + page_index * STORED_PAGE_SIZE as u64
    }

    fn read_page(&self, page_index: u64) -> Result<Vec<u8>> {
        let mut stored = vec![0u8; STORED_PAGE_SIZE];
        self.inner
            .read_exact_at(&mut stored, Self::page_offset(page_index))?;
        self.decryption.decrypt_page(page_index, &stored)
    }

    fn write_page(&mut self, page_index: u64, plaintext: &[u8]) -> Result<()> {
        debug_assert_eq!(plaintext.len(), PAGE_SIZE);
        let stored = self.encryption.encrypt_page(page_index, plaintext)?;
        self.inner.write_all_at(&stored, Self::page_offset(page_index))
    }
}

impl DataFile for EncryptedFile {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if offset + buf.len() as u64 > self.logical_len {
            return Err(StorageError::ReadBeyondEof {
                offset,
                length: buf.len(),
                file_size: self.logical_len,
            });
        }
        let mut copied = 0usize;
        let mut position = offset;
        while copied < buf.len() {
            let page_index = position / PAGE_SIZE as u64;
            let in_page = (position % PAGE_SIZE as u64) as usize;
            let chunk = (PAGE_SIZE - in_page).min(buf.len() - copied);
            let page = self.read_page(page_index)?;
            buf[copied..copied + chunk].copy_from_slice(&page[in_page..in_page + chunk]);
            copied += chunk;
            position += chunk as u64;
        }
        Ok(())
    }

    fn write_all_at(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        // A sparse gap between the current end and the write offset is
        // materialized as zero pages first.
        if offset > self.logical_len {
            self.set_len(offset)?;
        }
        let existing_pages = self.page_count();
        let mut written = 0usize;
        let mut position = offset;
        while written < buf.len() {
            let page_index = position / PAGE_SIZE as u64;
            let in_page = (position % PAGE_SIZE as u64) as usize;
            let chunk = (PAGE_SIZE - in_page).min(buf.len() - written);
            let mut page = if page_index < existing_pages {
                self.read_page(page_index)?
            } else {
                vec![0u8; PAGE_SIZE]
            };
            page[in_page..in_page + chunk].copy_from_slice(&buf[written..written + chunk]);
            self.write_page(page_index, &page)?;
            written += chunk;
            position += chunk as u64;
        }
        if position > self.logical_len {
            self.logical_len = position;
        }
        self.write_header()
    }

    fn len(&self) -> Result<u64> {
        Ok(self.logical_len)
    }

    fn set_len(&mut self, new_len: u64) -> Result<()> {
        if new_len > self.logical_len {
            let old_pages = self.page_count();
            let new_pages = new_len.div_ceil(PAGE_SIZE as u64);
            let zero_page = vec![0u8; PAGE_SIZE];
            for page_index in old_pages..new_pages {
                self.write_page(page_index, &zero_page)?;
            }
            self.logical_len = new_len;
        } else if new_len < self.logical_len {
            let new_pages = new_len.div_ceil(PAGE_SIZE as u64);
            // Zero the logical tail of the last remaining page.
            if new_len % PAGE_SIZE as u64 != 0 {
                let last_page = new_pages - 1;
                let keep = (new_len % PAGE_SIZE as u64) as usize;
                let mut page = self.read_page(last_page)?;
                page[keep..].fill(0);
                self.write_page(last_page, &page)?;
            }
            self.logical_len = new_len;
            self.inner
                .set_len(HEADER_SIZE as u64 + new_pages * STORED_PAGE_SIZE as u64)?;
        }
        self.write_header()
    }

    fn sync(&self) -> Result<()> {
        self.inner.sync()
    }
}

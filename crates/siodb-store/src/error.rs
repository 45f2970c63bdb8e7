//! Storage error type.

use thiserror::Error;

/// Errors produced by data files, ciphers and metadata persistence.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown cipher: {0}")]
    UnknownCipher(String),

    #[error("Invalid key length for cipher {cipher_id}: expected {expected} bytes, got {actual}")]
    InvalidCipherKey {
        cipher_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Decryption failed at page {page}: {message}")]
    DecryptionFailed { page: u64, message: String },

    #[error("Corrupted file {path}: {message}")]
    Corrupted { path: String, message: String },

    #[error("Read beyond end of file: offset {offset}, length {length}, file size {file_size}")]
    ReadBeyondEof {
        offset: u64,
        length: usize,
        file_size: u64,
    },

    #[error("Cannot lock file {path}: {message}")]
    Lock { path: String, message: String },
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

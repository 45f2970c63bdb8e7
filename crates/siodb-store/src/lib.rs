//! On-disk primitives for the Siodb engine.
//!
//! This crate provides the uniform data file handle the catalog uses for
//! everything it persists (plain or encrypted, chosen by the database
//! cipher), the cipher registry, the memory-mapped database metadata
//! record, and the instance-level lock and flag files that coordinate
//! startup between the connection server and IOMgr.

mod cipher;
mod data_file;
mod encrypted_file;
mod error;
mod instance_files;
mod metadata;

pub use cipher::{create_cipher_contexts, get_cipher, Cipher, CipherContext, NO_CIPHER_ID};
pub use data_file::{DataFile, DataFileRef, PlainFile, DATA_FILE_CREATION_MODE};
pub use encrypted_file::EncryptedFile;
pub use error::{Result, StorageError};
pub use instance_files::{
    create_iomgr_initialization_flag_file, wait_for_iomgr_initialization, InstanceLockFile,
};
pub use metadata::{DatabaseMetadataFile, DATABASE_METADATA_SIZE, DATABASE_METADATA_VERSION};

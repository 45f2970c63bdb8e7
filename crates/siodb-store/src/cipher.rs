//! Cipher registry and page encryption contexts.
//!
//! A database is encrypted with the cipher named by its cipher id. The
//! engine ships AES-128 and AES-256 in GCM mode; the id `none` disables
//! encryption. Encryption operates on whole pages, with the page index
//! bound into the nonce so pages cannot be transplanted within a file.

use crate::error::{Result, StorageError};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use std::sync::Arc;

/// Cipher id that disables encryption.
pub const NO_CIPHER_ID: &str = "none";

/// A block cipher usable for database encryption.
pub trait Cipher: Send + Sync {
    /// Identifier used in configuration and DDL (`aes128`, `aes256`).
    fn cipher_id(&self) -> &'static str;

    /// Key size in bits.
    fn key_size(&self) -> usize;

    /// Creates a page encryption/decryption context for the given key.
    ///
    /// Fails with [`StorageError::InvalidCipherKey`] when the key length
    /// does not match the cipher's key size.
    fn create_context(&self, key: &[u8]) -> Result<CipherContext>;
}

struct Aes128Cipher;
struct Aes256Cipher;

impl Cipher for Aes128Cipher {
    fn cipher_id(&self) -> &'static str {
        "aes128"
    }

    fn key_size(&self) -> usize {
        128
    }

    fn create_context(&self, key: &[u8]) -> Result<CipherContext> {
        validate_key_length(self, key)?;
        let cipher = Aes128Gcm::new_from_slice(key)
            .map_err(|_| invalid_key(self, key))?;
        Ok(CipherContext::Aes128(Box::new(cipher)))
    }
}

impl Cipher for Aes256Cipher {
    fn cipher_id(&self) -> &'static str {
        "aes256"
    }

    fn key_size(&self) -> usize {
        256
    }

    fn create_context(&self, key: &[u8]) -> Result<CipherContext> {
        validate_key_length(self, key)?;
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| invalid_key(self, key))?;
        Ok(CipherContext::Aes256(Box::new(cipher)))
    }
}

fn validate_key_length(cipher: &dyn Cipher, key: &[u8]) -> Result<()> {
    if key.len() != cipher.key_size() / 8 {
        return Err(invalid_key(cipher, key));
    }
    Ok(())
}

fn invalid_key(cipher: &dyn Cipher, key: &[u8]) -> StorageError {
    StorageError::InvalidCipherKey {
        cipher_id: cipher.cipher_id().to_string(),
        expected: cipher.key_size() / 8,
        actual: key.len(),
    }
}

/// Looks up a cipher by id.
///
/// Returns `None` for [`NO_CIPHER_ID`] and fails with
/// [`StorageError::UnknownCipher`] for unrecognized ids.
pub fn get_cipher(cipher_id: &str) -> Result<Option<Arc<dyn Cipher>>> {
    match cipher_id {
        NO_CIPHER_ID => Ok(None),
        "aes128" => Ok(Some(Arc::new(Aes128Cipher))),
        "aes256" => Ok(Some(Arc::new(Aes256Cipher))),
        other => Err(StorageError::UnknownCipher(other.to_string())),
    }
}

/// Creates the (encryption, decryption) context pair for a database.
///
/// Returns `None` when the cipher id is [`NO_CIPHER_ID`].
pub fn create_cipher_contexts(
    cipher_id: &str,
    key: &[u8],
) -> Result<Option<(CipherContext, CipherContext)>> {
    match get_cipher(cipher_id)? {
        None => Ok(None),
        Some(cipher) => {
            let encryption = cipher.create_context(key)?;
            let decryption = cipher.create_context(key)?;
            Ok(Some((encryption, decryption)))
        }
    }
}

/// Page encryption/decryption context bound to a single key.
pub enum CipherContext {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl CipherContext {
    /// Bytes of overhead a stored page carries over its plaintext (the
    /// GCM authentication tag).
    pub const PAGE_OVERHEAD: usize = 16;

    fn nonce_for_page(page_index: u64) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[..8].copy_from_slice(&page_index.to_le_bytes());
        nonce
    }

    /// Encrypts one page; output is `plaintext.len() + PAGE_OVERHEAD` bytes.
    pub fn encrypt_page(&self, page_index: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Self::nonce_for_page(page_index);
        let nonce = Nonce::from_slice(&nonce);
        let result = match self {
            CipherContext::Aes128(cipher) => cipher.encrypt(nonce, plaintext),
            CipherContext::Aes256(cipher) => cipher.encrypt(nonce, plaintext),
        };
        result.map_err(|e| StorageError::DecryptionFailed {
            page: page_index,
            message: format!("encrypt: {}", e),
        })
    }

    /// Decrypts one stored page back into its plaintext.
    pub fn decrypt_page(&self, page_index: u64, data: &[u8]) -> Result<Vec<u8>> {
        let nonce = Self::nonce_for_page(page_index);
        let nonce = Nonce::from_slice(&nonce);
        let result = match self {
            CipherContext::Aes128(cipher) => cipher.decrypt(nonce, data),
            CipherContext::Aes256(cipher) => cipher.decrypt(nonce, data),
        };
        result.map_err(|e| StorageError::DecryptionFailed {
            page: page_index,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cipher_known_ids() {
        assert!(get_cipher("aes128").unwrap().is_some());
        assert!(get_cipher("aes256").unwrap().is_some());
        assert!(get_cipher("none").unwrap().is_none());
        assert!(matches!(
            get_cipher("rot13"),
            Err(StorageError::UnknownCipher(_))
        ));
    }

    #[test]
    fn test_key_length_validation() {
        let cipher = get_cipher("aes128").unwrap().unwrap();
        assert!(cipher.create_context(&[0u8; 16]).is_ok());
        assert!(matches!(
            cipher.create_context(&[0u8; 15]),
            Err(StorageError::InvalidCipherKey { .. })
        ));

        let cipher = get_cipher("aes256").unwrap().unwrap();
        assert!(cipher.create_context(&[0u8; 32]).is_ok());
        assert!(cipher.create_context(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_page_roundtrip() {
        let (enc, dec) = create_cipher_contexts("aes128", &[7u8; 16])
            .unwrap()
            .unwrap();
        let plaintext = vec![0xabu8; 4096];
        let stored = enc.encrypt_page(3, &plaintext).unwrap();
        assert_eq!(stored.len(), plaintext.len() + CipherContext::PAGE_OVERHEAD);
        let back = dec.decrypt_page(3, &stored).unwrap();
        assert_eq!(back, plaintext);
    }

    #[test]
    fn test_page_index_is_bound_into_ciphertext() {
        let (enc, dec) = create_cipher_contexts("aes128", &[7u8; 16])
            .unwrap()
            .unwrap();
        let stored = enc.encrypt_page(3, b"payload").unwrap();
        // The same bytes presented as a different page must not decrypt.
        assert!(dec.decrypt_page(4, &stored).is_err());
    }

    #[test]
    fn test_tampered_page_rejected() {
        let (enc, dec) = create_cipher_contexts("aes256", &[9u8; 32])
            .unwrap()
            .unwrap();
        let mut stored = enc.encrypt_page(0, b"payload").unwrap();
        stored[0] ^= 1;
        assert!(dec.decrypt_page(0, &stored).is_err());
    }
}

//! Per-Stream Frame Decryption
//!
//! Encrypted fill frames carry a base64 AES-CBC ciphertext with PKCS#7
//! padding. The key and IV arrive in the stream's subscription ack as plain
//! strings whose UTF-8 bytes are the raw key/IV material; the key length
//! selects AES-128, AES-192 or AES-256.

use aes::{Aes128, Aes192, Aes256};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};

/// Why a payload could not be decrypted. Never leaves the codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// Key is not 16, 24 or 32 bytes, or IV is not 16 bytes.
    #[error("invalid key/iv length (key {key_len}, iv {iv_len})")]
    InvalidLength {
        /// Key length in bytes.
        key_len: usize,
        /// IV length in bytes.
        iv_len: usize,
    },
    /// Ciphertext is not valid base64.
    #[error("invalid base64 ciphertext")]
    Base64,
    /// Decryption or padding removal failed.
    #[error("decryption failed")]
    Decrypt,
    /// Plaintext is not UTF-8.
    #[error("plaintext is not UTF-8")]
    Utf8,
}

/// AES key/IV bound to one stream subscription for one connection.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamEncryptionContext {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl std::fmt::Debug for StreamEncryptionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEncryptionContext")
            .field("key_len", &self.key.len())
            .field("iv_len", &self.iv.len())
            .finish()
    }
}

impl StreamEncryptionContext {
    /// Build a context from the ack's key and IV strings.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidLength` if the material cannot drive
    /// AES-CBC.
    pub fn from_ack(key: &str, iv: &str) -> Result<Self, CipherError> {
        Self::new(key.as_bytes().to_vec(), iv.as_bytes().to_vec())
    }

    /// Build a context from raw key and IV bytes.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidLength` if the material cannot drive
    /// AES-CBC.
    pub fn new(key: Vec<u8>, iv: Vec<u8>) -> Result<Self, CipherError> {
        if !matches!(key.len(), 16 | 24 | 32) || iv.len() != 16 {
            return Err(CipherError::InvalidLength {
                key_len: key.len(),
                iv_len: iv.len(),
            });
        }
        Ok(Self { key, iv })
    }

    /// Decrypt a base64 ciphertext into text.
    ///
    /// # Errors
    ///
    /// Returns a `CipherError` describing the first step that failed.
    pub fn decrypt_base64(&self, ciphertext: &str) -> Result<String, CipherError> {
        let bytes = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| CipherError::Base64)?;
        let plain = self.decrypt(&bytes)?;
        String::from_utf8(plain).map_err(|_| CipherError::Utf8)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let (key, iv) = (self.key.as_slice(), self.iv.as_slice());
        let unpadded = match key.len() {
            16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map(|d| d.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
            24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
                .map(|d| d.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
            _ => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map(|d| d.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
        }
        .map_err(|_| CipherError::InvalidLength {
            key_len: key.len(),
            iv_len: iv.len(),
        })?;
        unpadded.map_err(|_| CipherError::Decrypt)
    }
}

/// Encrypt `plaintext` the way the feed does. Test support only.
#[cfg(test)]
pub(crate) fn encrypt_base64(key: &[u8], iv: &[u8], plaintext: &str) -> String {
    use cbc::cipher::BlockEncryptMut;

    let ciphertext = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
        _ => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
    };
    STANDARD.encode(ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_256: &str = "0123456789abcdef0123456789abcdef";
    const IV: &str = "fedcba9876543210";

    #[test]
    fn decrypts_aes256_round_trip() {
        let ctx = StreamEncryptionContext::from_ack(KEY_256, IV).unwrap();
        let ciphertext = encrypt_base64(KEY_256.as_bytes(), IV.as_bytes(), "005930^02^0001");
        assert_eq!(ctx.decrypt_base64(&ciphertext).unwrap(), "005930^02^0001");
    }

    #[test]
    fn decrypts_aes128() {
        let key = "0123456789abcdef";
        let ctx = StreamEncryptionContext::from_ack(key, IV).unwrap();
        let ciphertext = encrypt_base64(key.as_bytes(), IV.as_bytes(), "hello");
        assert_eq!(ctx.decrypt_base64(&ciphertext).unwrap(), "hello");
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(
            StreamEncryptionContext::from_ack("short", IV),
            Err(CipherError::InvalidLength { key_len: 5, .. })
        ));
        assert!(StreamEncryptionContext::from_ack(KEY_256, "short-iv").is_err());
    }

    #[test]
    fn rejects_invalid_base64() {
        let ctx = StreamEncryptionContext::from_ack(KEY_256, IV).unwrap();
        assert_eq!(ctx.decrypt_base64("not base64!!"), Err(CipherError::Base64));
    }

    #[test]
    fn wrong_key_does_not_yield_plaintext() {
        let ciphertext = encrypt_base64(KEY_256.as_bytes(), IV.as_bytes(), "005930^02^0001");
        let other = StreamEncryptionContext::from_ack("ffffffffffffffffffffffffffffffff", IV).unwrap();
        assert_ne!(
            other.decrypt_base64(&ciphertext).ok().as_deref(),
            Some("005930^02^0001")
        );
    }

    #[test]
    fn debug_hides_material() {
        let ctx = StreamEncryptionContext::from_ack(KEY_256, IV).unwrap();
        assert!(!format!("{ctx:?}").contains(KEY_256));
    }
}

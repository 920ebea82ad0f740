//! AES-256-GCM sealing for provider access tokens at rest.
//!
//! Sealed format: base64(nonce || ciphertext), 12-byte nonce, fresh per seal.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("Invalid sealing key: {0}")]
    InvalidKey(String),

    #[error("Malformed sealed token")]
    Malformed,

    #[error("Sealing failed")]
    Seal,

    #[error("Unsealing failed (wrong key or corrupted token)")]
    Unseal,
}

/// Seals and unseals secrets with a service-wide symmetric key.
#[derive(Clone)]
pub struct TokenSealer {
    cipher: Aes256Gcm,
}

impl TokenSealer {
    /// Build a sealer from a base64-encoded 32-byte key.
    pub fn from_base64_key(key_b64: &str) -> Result<Self, SealError> {
        let key_bytes = BASE64
            .decode(key_b64)
            .map_err(|e| SealError::InvalidKey(format!("not valid base64: {}", e)))?;

        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| {
            SealError::InvalidKey(format!("expected 32 bytes, got {}", key_bytes.len()))
        })?;

        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, SealError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SealError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    pub fn unseal(&self, sealed: &str) -> Result<String, SealError> {
        let raw = BASE64.decode(sealed).map_err(|_| SealError::Malformed)?;
        if raw.len() <= NONCE_LEN {
            return Err(SealError::Malformed);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SealError::Unseal)?;

        String::from_utf8(plaintext).map_err(|_| SealError::Malformed)
    }
}

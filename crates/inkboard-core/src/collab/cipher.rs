//! AES-256-GCM payload encryption.
//!
//! Ciphertexts travel as base64 text: a random 12-byte IV followed by the
//! sealed payload and its tag.

use super::{SyncError, SyncResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// IV length in bytes (96 bits).
pub const IV_LENGTH: usize = 12;
/// Key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// Symmetric room cipher shared by all peers of a session.
#[derive(Clone)]
pub struct SceneCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SceneCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneCipher").finish_non_exhaustive()
    }
}

impl SceneCipher {
    pub fn new(key: &[u8; KEY_LENGTH]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Build from a base64 encoded 32-byte key, e.g. taken from a room link.
    pub fn from_base64_key(key: &str) -> SyncResult<Self> {
        let bytes = STANDARD.decode(key.trim())?;
        let key: [u8; KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SyncError::KeyLength(bytes.len()))?;
        Ok(Self::new(&key))
    }

    /// Fresh random key.
    pub fn generate_key() -> [u8; KEY_LENGTH] {
        rand::random()
    }

    /// Base64 form of a key, the inverse of [`SceneCipher::from_base64_key`].
    pub fn encode_key(key: &[u8; KEY_LENGTH]) -> String {
        STANDARD.encode(key)
    }

    /// Seal `plaintext` under a fresh IV.
    pub fn encrypt(&self, plaintext: &[u8]) -> SyncResult<String> {
        let iv: [u8; IV_LENGTH] = rand::random();
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| SyncError::Encryption)?;
        let mut out = Vec::with_capacity(IV_LENGTH + sealed.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    /// Open a payload produced by [`SceneCipher::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> SyncResult<Vec<u8>> {
        let bytes = STANDARD.decode(encoded)?;
        if bytes.len() < IV_LENGTH {
            return Err(SyncError::Decryption);
        }
        let (iv, sealed) = bytes.split_at(IV_LENGTH);
        self.cipher
            .decrypt(Nonce::from_slice(iv), sealed)
            .map_err(|_| SyncError::Decryption)
    }
}

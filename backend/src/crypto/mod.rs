//! Prompt encryption.
//!
//! Workers never hand plaintext prompts to the sink. They pass every
//! prompt of an expanded seed to a [`FieldEncryptor`] in one call and get
//! back one result per prompt, in the same order.
//!
//! [`AesGcmEncryptor`] is the production implementation:
//! `base64(nonce || ciphertext || tag)` with AES-256-GCM, a fresh random
//! nonce per value and a key derived from the configured secret with SHA-256.

use std::env;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, EncryptionError, EncryptionResult};

/// Environment variable holding the encryption secret.
pub const ENCRYPTION_KEY_ENV: &str = "PRODUCTLOAD_ENCRYPTION_KEY";

/// AES-256-GCM nonce size (96 bits)
const AES_GCM_NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size
const AES_GCM_TAG_SIZE: usize = 16;

/// Encrypts sensitive fields in bulk.
///
/// Implementations must be safe to call from several workers at once.
/// The outer error means nothing could be encrypted; the inner results
/// line up one to one with `plaintexts`.
pub trait FieldEncryptor: Send + Sync {
    fn encrypt_batch(&self, plaintexts: &[String]) -> EncryptionResult<Vec<EncryptionResult<String>>>;
}

/// AES-256-GCM encryptor.
#[derive(Clone)]
pub struct AesGcmEncryptor {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmEncryptor").finish_non_exhaustive()
    }
}

impl AesGcmEncryptor {
    /// Create an encryptor from an arbitrary-length secret.
    pub fn new(secret: &[u8]) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "encryption_key",
                message: "must not be empty".to_string(),
            });
        }

        let derived_key = derive_key(secret);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived_key));
        Ok(Self { cipher })
    }

    /// Create an encryptor from `PRODUCTLOAD_ENCRYPTION_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let secret =
            env::var(ENCRYPTION_KEY_ENV).map_err(|_| ConfigError::MissingEnv(ENCRYPTION_KEY_ENV))?;
        Self::new(secret.as_bytes())
    }

    /// Encrypt one value.
    pub fn encrypt(&self, plaintext: &str) -> EncryptionResult<String> {
        let mut nonce_bytes = [0u8; AES_GCM_NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| EncryptionError::Failed {
                index: 0,
                message: e.to_string(),
            })?;

        let mut output = Vec::with_capacity(AES_GCM_NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(&output))
    }

    /// Decrypt a value produced by [`AesGcmEncryptor::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> EncryptionResult<String> {
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| EncryptionError::Decrypt(format!("invalid base64: {}", e)))?;

        if bytes.len() < AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE {
            return Err(EncryptionError::Decrypt("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = bytes.split_at(AES_GCM_NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                EncryptionError::Decrypt("wrong key or tampered ciphertext".to_string())
            })?;

        String::from_utf8(plaintext).map_err(|e| EncryptionError::Decrypt(e.to_string()))
    }
}

impl FieldEncryptor for AesGcmEncryptor {
    fn encrypt_batch(&self, plaintexts: &[String]) -> EncryptionResult<Vec<EncryptionResult<String>>> {
        let results = plaintexts
            .par_iter()
            .enumerate()
            .map(|(index, plaintext)| {
                self.encrypt(plaintext).map_err(|e| match e {
                    EncryptionError::Failed { message, .. } => EncryptionError::Failed { index, message },
                    other => other,
                })
            })
            .collect();
        Ok(results)
    }
}

/// Derive a 256-bit key from arbitrary-length input using SHA-256
fn derive_key(secret: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.finalize().into()
}

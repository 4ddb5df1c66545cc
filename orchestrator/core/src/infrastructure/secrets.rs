// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AES-256-GCM Secret Cipher
//!
//! Encrypts model configurations at rest. The key is the SHA-256 digest of
//! the platform secret (`spec.security.secret_key`); each blob is
//! `nonce (12 bytes) || ciphertext`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::secrets::{CipherError, SecretCipher};

const NONCE_LEN: usize = 12;

pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(secret: &str) -> Result<Self, CipherError> {
        if secret.trim().is_empty() {
            return Err(CipherError::Key("secret key must not be empty".to_string()));
        }
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }
}

impl SecretCipher for AesGcmCipher {
    fn encrypt(&self, plain: &Value) -> Result<Vec<u8>, CipherError> {
        let bytes = serde_json::to_vec(plain).map_err(|e| CipherError::Encrypt(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, bytes.as_ref())
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn decrypt(&self, blob: &[u8]) -> Result<Value, CipherError> {
        if blob.len() <= NONCE_LEN {
            return Err(CipherError::Decrypt("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CipherError::Decrypt(e.to_string()))?;
        serde_json::from_slice(&plain).map_err(|e| CipherError::Decrypt(e.to_string()))
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Secret cipher port. Plaintext configurations only exist in memory for the
//! duration of a single service call; everything persisted goes through
//! [`SecretCipher::encrypt`].

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Invalid key material: {0}")]
    Key(String),
}

pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plain: &Value) -> Result<Vec<u8>, CipherError>;

    fn decrypt(&self, blob: &[u8]) -> Result<Value, CipherError>;
}

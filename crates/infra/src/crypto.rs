//! Token cipher wiring.
//!
//! Implements the core `TokenCipher` port over the shared AES-256-GCM
//! encryption service, turning token plaintext into base64 column values.

use tutorlane_common::EncryptionService;
use tutorlane_core::TokenCipher;
use tutorlane_domain::{Result, TutorlaneError};

use crate::errors::InfraError;

/// AES-256-GCM token cipher.
pub struct AesTokenCipher {
    service: EncryptionService,
}

impl AesTokenCipher {
    pub fn new(service: EncryptionService) -> Self {
        Self { service }
    }

    /// Build from a raw 32-byte key.
    pub fn from_key(key: Vec<u8>) -> Result<Self> {
        let service = EncryptionService::new(key).map_err(InfraError::from)?;
        Ok(Self::new(service))
    }

    /// Build from a master password via Argon2 key derivation.
    pub fn from_password(password: &str) -> Result<Self> {
        let service = EncryptionService::from_password(password).map_err(InfraError::from)?;
        Ok(Self::new(service))
    }
}

impl TokenCipher for AesTokenCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.service
            .encrypt_to_string(plaintext.as_bytes())
            .map_err(|err| InfraError::from(err).into())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let bytes = self.service.decrypt_from_string(ciphertext).map_err(InfraError::from)?;
        String::from_utf8(bytes)
            .map_err(|_| TutorlaneError::Security("decrypted token is not valid UTF-8".into()))
    }
}

//! Skyforge credential vault
//!
//! Authenticated symmetric encryption (AES-256-GCM) of provider secrets.
//! The key is derived from one operator secret, so no separate key store is
//! needed. Ciphertext layout, base64 encoded:
//!
//! ```text
//! [version: 1 byte][nonce: 12 bytes][ciphertext + tag]
//! ```

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;

const FORMAT_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const KEY_CONTEXT: &[u8] = b"skyforge-credential-vault:";

#[derive(Error, Debug)]
pub enum VaultError {
    /// Corrupt ciphertext or wrong key. Never carries key material.
    #[error("Decryption failed: {0}")]
    Decryption(&'static str),

    #[error("Encryption failed")]
    Encryption,

    #[error("Payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Encrypts and decrypts credential payloads
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Derive the vault key from the operator secret
    pub fn from_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_CONTEXT);
        hasher.update(secret.as_bytes());
        let key: [u8; 32] = hasher.finalize().into();

        Self {
            cipher: Aes256Gcm::new(&key.into()),
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| VaultError::Encryption)?;

        let mut out = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>> {
        let data = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| VaultError::Decryption("ciphertext is not valid base64"))?;

        let Some((&version, rest)) = data.split_first() else {
            return Err(VaultError::Decryption("ciphertext is empty"));
        };
        if version != FORMAT_VERSION {
            return Err(VaultError::Decryption("unsupported ciphertext version"));
        }
        if rest.len() < NONCE_LEN {
            return Err(VaultError::Decryption("ciphertext is truncated"));
        }

        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| VaultError::Decryption("authentication failed"))
    }

    /// Serialize `value` to JSON and encrypt it
    pub fn seal_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(value)?;
        self.encrypt(&plaintext)
    }

    /// Decrypt and parse a JSON payload
    pub fn open_json<T: DeserializeOwned>(&self, ciphertext: &str) -> Result<T> {
        let plaintext = self.decrypt(ciphertext)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialVault { .. }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let vault = CredentialVault::from_secret("operator-secret");

        let cases: [&[u8]; 4] = [b"", b"x", b"{\"access_key\":\"AKIA\"}", &[0, 255, 7, 0]];
        for plaintext in cases {
            let sealed = vault.encrypt(plaintext).unwrap();
            assert_eq!(vault.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_different_encryptions() {
        let vault = CredentialVault::from_secret("operator-secret");

        let enc1 = vault.encrypt(b"test").unwrap();
        let enc2 = vault.encrypt(b"test").unwrap();

        // random nonce per call
        assert_ne!(enc1, enc2);
        assert_eq!(vault.decrypt(&enc1).unwrap(), b"test");
        assert_eq!(vault.decrypt(&enc2).unwrap(), b"test");
    }

    #[test]
    fn test_key_is_deterministic() {
        let sealed = CredentialVault::from_secret("same").encrypt(b"payload").unwrap();
        let reopened = CredentialVault::from_secret("same").decrypt(&sealed).unwrap();
        assert_eq!(reopened, b"payload");
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sealed = CredentialVault::from_secret("right").encrypt(b"payload").unwrap();
        let err = CredentialVault::from_secret("wrong")
            .decrypt(&sealed)
            .unwrap_err();
        assert!(matches!(err, VaultError::Decryption(_)));
        assert!(!err.to_string().contains("wrong"));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let vault = CredentialVault::from_secret("operator-secret");
        let sealed = vault.encrypt(b"secret-access-key").unwrap();

        let mut raw = STANDARD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = STANDARD.encode(&raw);
        assert!(matches!(
            vault.decrypt(&tampered),
            Err(VaultError::Decryption(_))
        ));

        let mut raw = STANDARD.decode(&sealed).unwrap();
        raw[1 + NONCE_LEN] ^= 0x80;
        assert!(vault.decrypt(&STANDARD.encode(&raw)).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let vault = CredentialVault::from_secret("operator-secret");
        assert!(vault.decrypt("not base64 !!").is_err());
        assert!(vault.decrypt("").is_err());
        assert!(vault.decrypt(&STANDARD.encode([FORMAT_VERSION, 1, 2])).is_err());
    }

    #[test]
    fn test_json_payload() {
        let vault = CredentialVault::from_secret("operator-secret");
        let sealed = vault
            .seal_json(&serde_json::json!({"client_id": "abc"}))
            .unwrap();
        let opened: serde_json::Value = vault.open_json(&sealed).unwrap();
        assert_eq!(opened["client_id"], "abc");
    }
}

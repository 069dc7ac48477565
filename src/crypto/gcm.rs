//! Passphrase backend: AES-256-GCM with an Argon2id-derived key.
//!
//! AES-GCM is an AEAD, so artifacts carry both confidentiality and
//! integrity. A fresh salt and nonce are drawn for every artifact.
//!
//! Payload format: salt (16 bytes) || nonce (12 bytes) || ciphertext + tag

use super::{CryptoError, KeySource, Recipient};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use age::secrecy::ExposeSecret;
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};

/// Salt length for key derivation (bytes).
pub const SALT_LEN: usize = 16;

/// Nonce length (bytes) - 96 bits.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length (bytes) - 128 bits.
pub const TAG_LEN: usize = 16;

/// Derived key length (bytes) - AES-256.
pub const KEY_LEN: usize = 32;

// Argon2id cost parameters: 64 MiB, 3 iterations, 4 lanes.
const ARGON2_MEMORY_KIB: u32 = 65536;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_LANES: u32 = 4;

pub(crate) fn encrypt(plaintext: &[u8], recipient: &Recipient) -> Result<Vec<u8>, CryptoError> {
    let passphrase = recipient.expose();
    if passphrase.is_empty() {
        return Err(CryptoError::MissingPassphrase("empty passphrase".into()));
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(passphrase, &salt)?;

    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|e| CryptoError::Gcm(format!("bad key: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Gcm("encryption failed".into()))?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn decrypt(payload: &[u8], key: &KeySource) -> Result<Vec<u8>, CryptoError> {
    if payload.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Gcm("payload too short".into()));
    }

    let passphrase = passphrase_from(key)?;
    let (salt, rest) = payload.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let derived = derive_key(&passphrase, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&derived)
        .map_err(|e| CryptoError::Gcm(format!("bad key: {}", e)))?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher.decrypt(nonce, ciphertext).map_err(|_| {
        CryptoError::Gcm("decryption failed (wrong passphrase or corrupted artifact)".into())
    })
}

/// Resolve the passphrase behind a key source.
///
/// File sources hold the passphrase as their contents; a trailing
/// newline is tolerated.
fn passphrase_from(key: &KeySource) -> Result<String, CryptoError> {
    let pass = match key {
        KeySource::File(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                CryptoError::MissingPassphrase(format!("cannot read {}: {}", path.display(), e))
            })?;
            text.trim_end_matches(['\r', '\n']).to_string()
        }
        KeySource::Inline(secret) => secret.expose_secret().to_string(),
    };
    if pass.is_empty() {
        return Err(CryptoError::MissingPassphrase("empty passphrase".into()));
    }
    Ok(pass)
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_LANES, Some(KEY_LEN))
        .map_err(|e| CryptoError::Gcm(format!("bad argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::Gcm(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use age::secrecy::SecretString;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_encrypt_decrypt_roundtrip() -> Result<()> {
        let plaintext = b"machine=example.com login=me password=hunter2";
        let payload = encrypt(plaintext, &Recipient::new("correct horse"))?;

        let key = KeySource::Inline(SecretString::from("correct horse".to_string()));
        let decrypted = decrypt(&payload, &key)?;
        assert_eq!(decrypted.as_slice(), plaintext.as_slice());
        Ok(())
    }

    #[test]
    fn test_payload_layout() -> Result<()> {
        let plaintext = b"tiny";
        let payload = encrypt(plaintext, &Recipient::new("pass"))?;
        assert_eq!(payload.len(), SALT_LEN + NONCE_LEN + plaintext.len() + TAG_LEN);

        // Same plaintext twice must differ (fresh salt and nonce)
        let again = encrypt(plaintext, &Recipient::new("pass"))?;
        assert_ne!(payload, again);
        Ok(())
    }

    #[test]
    fn test_wrong_passphrase_fails() -> Result<()> {
        let payload = encrypt(b"secret", &Recipient::new("right"))?;
        let key = KeySource::Inline(SecretString::from("wrong".to_string()));
        let err = decrypt(&payload, &key).unwrap_err();
        assert!(matches!(err, CryptoError::Gcm(_)));
        Ok(())
    }

    #[test]
    fn test_tampered_payload_fails() -> Result<()> {
        let mut payload = encrypt(b"secret", &Recipient::new("pass"))?;
        if let Some(byte) = payload.last_mut() {
            *byte ^= 0xff;
        }
        let key = KeySource::Inline(SecretString::from("pass".to_string()));
        let err = decrypt(&payload, &key).unwrap_err();
        assert!(matches!(err, CryptoError::Gcm(_)));
        Ok(())
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let err = encrypt(b"data", &Recipient::new("")).unwrap_err();
        assert!(matches!(err, CryptoError::MissingPassphrase(_)));

        let key = KeySource::Inline(SecretString::from(String::new()));
        let err = decrypt(&[0u8; SALT_LEN + NONCE_LEN + TAG_LEN], &key).unwrap_err();
        assert!(matches!(err, CryptoError::MissingPassphrase(_)));
    }

    #[test]
    fn test_passphrase_file_source() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let pass_path = temp_dir.path().join("passphrase");
        std::fs::write(&pass_path, "from a file\n")?;

        let payload = encrypt(b"secret", &Recipient::new("from a file"))?;
        let decrypted = decrypt(&payload, &KeySource::File(pass_path))?;
        assert_eq!(decrypted.as_slice(), b"secret");
        Ok(())
    }

    #[test]
    fn test_missing_passphrase_file() {
        let key = KeySource::File(std::path::PathBuf::from("/nonexistent/passphrase"));
        let err = decrypt(&[0u8; SALT_LEN + NONCE_LEN + TAG_LEN], &key).unwrap_err();
        assert!(matches!(err, CryptoError::MissingPassphrase(_)));
    }
}

//! Public-key backend: age with x25519 keys.
//!
//! Encrypts to a single recipient (`age1...`). Decrypts with identities
//! (`AGE-SECRET-KEY-1...`) read from an identity file or passed inline.
//! Output is the binary, non-armored age format.

use super::{CryptoError, KeySource, Recipient};
use age::secrecy::ExposeSecret;
use age::x25519;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::io::{Read, Write};
use std::path::Path;

pub(crate) fn encrypt(plaintext: &[u8], recipient: &Recipient) -> Result<Vec<u8>, CryptoError> {
    let value = recipient.expose().trim().to_string();
    if value.is_empty() {
        return Err(CryptoError::MissingRecipient);
    }
    let parsed: x25519::Recipient = value
        .parse()
        .map_err(|e| CryptoError::InvalidRecipient(format!("{}", e)))?;

    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(&parsed as &dyn age::Recipient))
            .map_err(|e| CryptoError::Age(format!("cannot build encryptor: {}", e)))?;

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| CryptoError::Age(format!("encryption failed: {}", e)))?;
    writer
        .write_all(plaintext)
        .map_err(|e| CryptoError::Age(format!("encryption failed: {}", e)))?;
    writer
        .finish()
        .map_err(|e| CryptoError::Age(format!("encryption failed: {}", e)))?;
    Ok(encrypted)
}

pub(crate) fn decrypt(payload: &[u8], key: &KeySource) -> Result<Vec<u8>, CryptoError> {
    let identities = load_identities(key)?;

    let decryptor = age::Decryptor::new(payload)
        .map_err(|e| CryptoError::Age(format!("not an age payload: {}", e)))?;
    let mut reader = decryptor
        .decrypt(identities.iter().map(|id| id as &dyn age::Identity))
        .map_err(|e| CryptoError::Age(format!("decryption failed: {}", e)))?;

    let mut plaintext = Vec::new();
    reader
        .read_to_end(&mut plaintext)
        .map_err(|e| CryptoError::Age(format!("decryption failed: {}", e)))?;
    Ok(plaintext)
}

/// Generate a fresh x25519 identity file and return its public key.
///
/// Writes the same comment lines `age-keygen` does and restricts the
/// file to owner-only permissions. Refuses to overwrite.
pub fn generate_identity_file(path: &Path) -> Result<String> {
    if path.exists() {
        bail!("identity file already exists: {}", path.display());
    }

    let identity = x25519::Identity::generate();
    let public = identity.to_public().to_string();

    let contents = format!(
        "# created: {}\n# public key: {}\n{}\n",
        Utc::now().to_rfc3339(),
        public,
        identity.to_string().expose_secret()
    );

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Cannot write identity file: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(public)
}

fn load_identities(key: &KeySource) -> Result<Vec<x25519::Identity>, CryptoError> {
    let text = match key {
        KeySource::File(path) => std::fs::read_to_string(path).map_err(|e| {
            CryptoError::IdentityUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?,
        KeySource::Inline(secret) => secret.expose_secret().to_string(),
    };
    parse_identities(&text)
}

/// Parse identity file contents. Comment and blank lines are skipped;
/// anything else must be a valid secret key line.
fn parse_identities(text: &str) -> Result<Vec<x25519::Identity>, CryptoError> {
    let mut identities = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let identity: x25519::Identity = line
            .parse()
            .map_err(|e| CryptoError::IdentityUnavailable(format!("bad identity line: {}", e)))?;
        identities.push(identity);
    }
    if identities.is_empty() {
        return Err(CryptoError::IdentityUnavailable(
            "no AGE-SECRET-KEY entries found".into(),
        ));
    }
    Ok(identities)
}

//! Cryptographic backends and the encrypted artifact format.
//!
//! Two backends, dispatched by method tag:
//! - **age**: x25519 public-key encryption (the `age` crate)
//! - **gcm**: AES-256-GCM with an Argon2id-derived key
//!
//! Artifacts carry a tagged header (see [`artifact`]) so decryption
//! never trusts a filename.

pub mod artifact;

mod age;
mod gcm;

pub use self::age::generate_identity_file;

use ::age::secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use thiserror::Error;

/// Encryption method tag. The set is fixed: exactly these two backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// age x25519 public-key encryption
    Age,
    /// AES-256-GCM with a passphrase-derived key
    Gcm,
}

impl Method {
    /// Every supported method.
    pub const ALL: [Method; 2] = [Method::Age, Method::Gcm];

    /// Short tag used in artifact names and on the command line.
    pub fn tag(&self) -> &'static str {
        match self {
            Method::Age => "age",
            Method::Gcm => "gcm",
        }
    }

    /// Method byte stored in the artifact header.
    pub fn header_byte(&self) -> u8 {
        match self {
            Method::Age => 0x01,
            Method::Gcm => 0x02,
        }
    }

    pub(crate) fn from_header_byte(byte: u8) -> Result<Self, CryptoError> {
        match byte {
            0x01 => Ok(Method::Age),
            0x02 => Ok(Method::Gcm),
            other => Err(CryptoError::UnknownMethod(other)),
        }
    }

    /// Parse a method tag. Unknown tags are an error, never a default.
    pub fn from_tag(tag: &str) -> Result<Self, CryptoError> {
        match tag {
            "age" => Ok(Method::Age),
            "gcm" => Ok(Method::Gcm),
            other => Err(CryptoError::UnknownMethodName(other.to_string())),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Opaque key reference handed to encrypt. The backend decides what it
/// means: an age public key, or the gcm passphrase.
pub struct Recipient(SecretString);

impl Recipient {
    /// Wrap a recipient string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Wrap an already-secret value (a prompted passphrase).
    pub fn from_secret(value: SecretString) -> Self {
        Self(value)
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Recipient([redacted])")
    }
}

/// Explicit reference to decryption key material.
#[derive(Debug)]
pub enum KeySource {
    /// Path to a key file: an age identity file, or a file holding the
    /// gcm passphrase.
    File(PathBuf),
    /// Key material passed directly (a prompted passphrase).
    Inline(SecretString),
}

/// Typed errors for the encryption backends.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("artifact too short to carry a header")]
    Truncated,
    #[error("not a dotvault artifact (bad magic)")]
    BadHeader,
    #[error("unknown method byte {0:#04x} in artifact header")]
    UnknownMethod(u8),
    #[error("unknown encryption method {0:?} (expected one of: age, gcm)")]
    UnknownMethodName(String),
    #[error("no age recipient provided (pass --recipient or set crypto.recipient)")]
    MissingRecipient,
    #[error("invalid age recipient: {0}")]
    InvalidRecipient(String),
    #[error("age identity unavailable: {0}")]
    IdentityUnavailable(String),
    #[error("age backend: {0}")]
    Age(String),
    #[error("gcm passphrase unavailable: {0}")]
    MissingPassphrase(String),
    #[error("gcm backend: {0}")]
    Gcm(String),
}

impl CryptoError {
    /// Process exit code for this error.
    ///
    /// 3/4 are the age pair and 5/6 the gcm pair; the first of each pair
    /// means key material was unavailable, the second that the backend
    /// itself failed. Header errors use the general failure code.
    pub fn exit_code(&self) -> i32 {
        match self {
            CryptoError::MissingRecipient | CryptoError::IdentityUnavailable(_) => 3,
            CryptoError::InvalidRecipient(_) | CryptoError::Age(_) => 4,
            CryptoError::MissingPassphrase(_) => 5,
            CryptoError::Gcm(_) => 6,
            _ => 1,
        }
    }
}

/// Encryption capability. The vault encrypts and decrypts through this
/// trait; tests substitute a fake.
pub trait Encryptor {
    /// Encrypt a plaintext into a backend payload (header not included).
    fn encrypt(
        &self,
        method: Method,
        plaintext: &[u8],
        recipient: &Recipient,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a backend payload.
    fn decrypt(
        &self,
        method: Method,
        payload: &[u8],
        key: &KeySource,
    ) -> Result<Vec<u8>, CryptoError>;
}

/// The native backends, dispatched by method tag.
pub struct CipherSuite;

impl Encryptor for CipherSuite {
    fn encrypt(
        &self,
        method: Method,
        plaintext: &[u8],
        recipient: &Recipient,
    ) -> Result<Vec<u8>, CryptoError> {
        match method {
            Method::Age => age::encrypt(plaintext, recipient),
            Method::Gcm => gcm::encrypt(plaintext, recipient),
        }
    }

    fn decrypt(
        &self,
        method: Method,
        payload: &[u8],
        key: &KeySource,
    ) -> Result<Vec<u8>, CryptoError> {
        match method {
            Method::Age => age::decrypt(payload, key),
            Method::Gcm => gcm::decrypt(payload, key),
        }
    }
}

//! Encrypted artifact container.
//!
//! Every artifact starts with a tagged header so decryption can dispatch
//! on what the file actually is, not on what its name claims:
//!
//! Format: DOTVAULT_V1 (11 bytes) + method byte (1 byte) + backend payload

use super::{CryptoError, Method};

/// Magic prefix identifying a dotvault artifact.
pub const MAGIC: &[u8; 11] = b"DOTVAULT_V1";

/// Header length: magic + method byte.
pub const HEADER_LEN: usize = MAGIC.len() + 1;

/// Filename extension shared by all artifacts.
pub const ENC_EXT: &str = "enc";

/// Wrap a backend payload in the tagged header.
pub fn seal(method: Method, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(method.header_byte());
    out.extend_from_slice(payload);
    out
}

/// Split an artifact into its method and backend payload.
///
/// Rejects anything that is not a dotvault artifact. An unknown method
/// byte is an error, never a guess.
pub fn open(bytes: &[u8]) -> Result<(Method, &[u8]), CryptoError> {
    if bytes.len() < HEADER_LEN {
        return Err(CryptoError::Truncated);
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(CryptoError::BadHeader);
    }
    let method = Method::from_header_byte(bytes[MAGIC.len()])?;
    Ok((method, &bytes[HEADER_LEN..]))
}

/// Artifact filename for a plaintext name: `<name>.<tag>.enc`.
pub fn artifact_name(source_name: &str, method: Method) -> String {
    format!("{}.{}.{}", source_name, method.tag(), ENC_EXT)
}

/// Recover the plaintext name from an artifact filename, if the name
/// carries a recognized `.<tag>.enc` suffix.
pub fn plaintext_name(name: &str) -> Option<&str> {
    for method in Method::ALL {
        let suffix = format!(".{}.{}", method.tag(), ENC_EXT);
        if let Some(stem) = name.strip_suffix(suffix.as_str()) {
            if !stem.is_empty() {
                return Some(stem);
            }
        }
    }
    None
}

//! Content digests: the cross-language identity of a translatable string.
//!
//! A digest is the SHA-256 of the string's UTF-8 bytes, rendered as lowercase hex.
//! It is unseeded, so the same content maps to the same digest in every process.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Stable identity of an original-language string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Digest the given content.
    pub fn of(content: &str) -> Self {
        Digest(hex::encode(Sha256::digest(content.as_bytes())))
    }

    /// Parse a digest previously rendered with [`Digest::as_str`].
    ///
    /// Returns `None` unless the input is exactly 64 lowercase hex characters.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == DIGEST_HEX_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Digest(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [`Digest::of`].
pub fn digest(content: &str) -> Digest {
    Digest::of(content)
}

//! Error types for the envelope crate.

use core::fmt;

/// Everything that can go wrong below the client layer: canonicalization
/// never fails, so this only covers crypto and wire-format problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// An EAK or field string did not split into the expected number of
    /// dot-separated parts, or a part was not valid base64.
    Malformed(&'static str),
    /// AEAD authentication failed (box, secretbox, or otherwise).
    Decryption,
    /// A detached signature did not verify.
    SignatureInvalid,
    /// The CSPRNG or a key-construction step failed.
    Crypto(&'static str),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(what) => write!(f, "malformed {}", what),
            Self::Decryption => write!(f, "decryption failed"),
            Self::SignatureInvalid => write!(f, "signature invalid"),
            Self::Crypto(what) => write!(f, "crypto error: {}", what),
        }
    }
}

impl std::error::Error for EnvelopeError {}

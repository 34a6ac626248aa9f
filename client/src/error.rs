//! Error types for the client crate.

use core::fmt;
use sealed_store_envelope::EnvelopeError;

#[derive(Debug)]
pub enum ClientError {
    /// A `Config` was missing a field its declared version requires.
    ConfigInvalid(String),
    /// A network failure or an unexpected non-2xx response.
    TransportError(String),
    /// 401/403 from the token endpoint.
    AuthFailure,
    /// Decryption was requested but no access key is available.
    NoAccess,
    /// 409 on a safe update/delete: the caller's `version` is stale.
    Conflict,
    /// An EAK or field string failed to parse.
    MalformedEnvelope(String),
    /// AEAD authentication failed.
    DecryptionFailure,
    /// Detached signature verification failed, or a v2 decrypt received
    /// an EAK with no signer key.
    SignatureInvalid,
    /// A signature was requested against a v1 (unsigned) configuration.
    SignatureUnavailable,
    /// Email-based client lookup is not supported under v2.
    EmailLookupUnsupported,
    /// Registration returned a non-2xx status.
    RegistrationFailed(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid(msg) => write!(f, "invalid config: {}", msg),
            Self::TransportError(msg) => write!(f, "transport error: {}", msg),
            Self::AuthFailure => write!(f, "authentication failed"),
            Self::NoAccess => write!(f, "no access key available"),
            Self::Conflict => write!(f, "version conflict"),
            Self::MalformedEnvelope(msg) => write!(f, "malformed envelope: {}", msg),
            Self::DecryptionFailure => write!(f, "decryption failed"),
            Self::SignatureInvalid => write!(f, "signature invalid"),
            Self::SignatureUnavailable => write!(f, "signing unavailable on v1 config"),
            Self::EmailLookupUnsupported => write!(f, "email-based client lookup is unsupported"),
            Self::RegistrationFailed(msg) => write!(f, "registration failed: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<EnvelopeError> for ClientError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::Malformed(what) => Self::MalformedEnvelope(what.to_string()),
            EnvelopeError::Decryption => Self::DecryptionFailure,
            EnvelopeError::SignatureInvalid => Self::SignatureInvalid,
            EnvelopeError::Crypto(what) => Self::TransportError(format!("crypto: {}", what)),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

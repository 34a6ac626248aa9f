//! Envelope codec (C3): the dotted base64 string encodings used for the
//! EAK and for one encrypted record field.

use crate::crypto::{b64u_decode, b64u_encode};
use crate::error::EnvelopeError;

/// An Encrypted Access Key on the wire: `b64u(ciphertext).b64u(nonce)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eak {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; 24],
}

impl Eak {
    pub fn encode(&self) -> String {
        format!("{}.{}", b64u_encode(&self.ciphertext), b64u_encode(&self.nonce))
    }

    pub fn parse(s: &str) -> Result<Self, EnvelopeError> {
        let mut parts = s.split('.');
        let ct = parts.next().ok_or(EnvelopeError::Malformed("eak"))?;
        let nonce = parts.next().ok_or(EnvelopeError::Malformed("eak"))?;
        if parts.next().is_some() {
            return Err(EnvelopeError::Malformed("eak"));
        }
        let ciphertext = b64u_decode(ct)?;
        let nonce_bytes = b64u_decode(nonce)?;
        let nonce: [u8; 24] = nonce_bytes
            .try_into()
            .map_err(|_| EnvelopeError::Malformed("eak"))?;
        Ok(Self { ciphertext, nonce })
    }
}

/// One encrypted record field on the wire:
/// `b64u(edk).b64u(edk_nonce).b64u(ef).b64u(ef_nonce)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    pub edk: Vec<u8>,
    pub edk_nonce: [u8; 24],
    pub ef: Vec<u8>,
    pub ef_nonce: [u8; 24],
}

impl EncryptedField {
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            b64u_encode(&self.edk),
            b64u_encode(&self.edk_nonce),
            b64u_encode(&self.ef),
            b64u_encode(&self.ef_nonce),
        )
    }

    pub fn parse(s: &str) -> Result<Self, EnvelopeError> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(EnvelopeError::Malformed("field"));
        }
        let edk = b64u_decode(parts[0])?;
        let edk_nonce = nonce_from_b64(parts[1])?;
        let ef = b64u_decode(parts[2])?;
        let ef_nonce = nonce_from_b64(parts[3])?;
        Ok(Self { edk, edk_nonce, ef, ef_nonce })
    }
}

fn nonce_from_b64(s: &str) -> Result<[u8; 24], EnvelopeError> {
    let bytes = b64u_decode(s)?;
    bytes.try_into().map_err(|_| EnvelopeError::Malformed("field"))
}

//! Crypto primitives (C2): box/secretbox AEAD, detached signatures, KDF,
//! and the URL-safe base64 codec used everywhere on the wire.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use crypto_box::{
    aead::{generic_array::GenericArray, Aead},
    PublicKey as BoxPublicKey, SalsaBox, SecretKey as BoxSecretKey,
};
use rand_core::OsRng;
use crypto_secretbox::{
    aead::{Aead as SecretAead, KeyInit},
    Key as SecretKey, XSalsa20Poly1305,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

use crate::error::EnvelopeError;

pub const NONCE_BYTES: usize = 24;
pub const SECRETBOX_KEY_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Fill `n` bytes from the operating system CSPRNG.
pub fn random_bytes(n: usize) -> Result<Vec<u8>, EnvelopeError> {
    let mut buf = vec![0u8; n];
    getrandom::getrandom(&mut buf).map_err(|_| EnvelopeError::Crypto("getrandom"))?;
    Ok(buf)
}

/// A fresh random 24-byte nonce, suitable for either box or secretbox.
pub fn random_nonce() -> Result<[u8; NONCE_BYTES], EnvelopeError> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom::getrandom(&mut n).map_err(|_| EnvelopeError::Crypto("getrandom"))?;
    Ok(n)
}

/// A fresh random 32-byte secretbox key.
pub fn random_secretbox_key() -> Result<Zeroizing<[u8; SECRETBOX_KEY_BYTES]>, EnvelopeError> {
    let mut k = [0u8; SECRETBOX_KEY_BYTES];
    getrandom::getrandom(&mut k).map_err(|_| EnvelopeError::Crypto("getrandom"))?;
    Ok(Zeroizing::new(k))
}

// ---------------------------------------------------------------------------
// Public-key box (X25519 + XSalsa20-Poly1305)
// ---------------------------------------------------------------------------

/// Seal `msg` for `recipient_pub`, authenticated as `sender_priv`.
pub fn box_seal(
    msg: &[u8],
    nonce: &[u8; NONCE_BYTES],
    recipient_pub: &[u8; 32],
    sender_priv: &[u8; 32],
) -> Result<Vec<u8>, EnvelopeError> {
    let sk = BoxSecretKey::from(*sender_priv);
    let pk = BoxPublicKey::from(*recipient_pub);
    let b = SalsaBox::new(&pk, &sk);
    let n = GenericArray::from_slice(nonce);
    b.encrypt(n, msg).map_err(|_| EnvelopeError::Crypto("box seal"))
}

/// Open a ciphertext sealed by [`box_seal`].
pub fn box_open(
    ct: &[u8],
    nonce: &[u8; NONCE_BYTES],
    sender_pub: &[u8; 32],
    recipient_priv: &[u8; 32],
) -> Result<Vec<u8>, EnvelopeError> {
    let sk = BoxSecretKey::from(*recipient_priv);
    let pk = BoxPublicKey::from(*sender_pub);
    let b = SalsaBox::new(&pk, &sk);
    let n = GenericArray::from_slice(nonce);
    b.decrypt(n, ct).map_err(|_| EnvelopeError::Decryption)
}

/// Generate a fresh X25519 keypair, returned as raw 32-byte arrays.
pub fn generate_box_keypair() -> ([u8; 32], Zeroizing<[u8; 32]>) {
    let sk = BoxSecretKey::generate(&mut OsRng);
    let pk = sk.public_key();
    (*pk.as_bytes(), Zeroizing::new(*sk.as_bytes()))
}

// ---------------------------------------------------------------------------
// Secret-key box (XSalsa20-Poly1305)
// ---------------------------------------------------------------------------

/// Seal `msg` under a 32-byte symmetric key.
pub fn secretbox_seal(
    msg: &[u8],
    nonce: &[u8; NONCE_BYTES],
    key: &[u8; SECRETBOX_KEY_BYTES],
) -> Result<Vec<u8>, EnvelopeError> {
    let cipher = XSalsa20Poly1305::new(SecretKey::from_slice(key));
    let n = crypto_secretbox::Nonce::from_slice(nonce);
    cipher
        .encrypt(n, msg)
        .map_err(|_| EnvelopeError::Crypto("secretbox seal"))
}

/// Open a ciphertext sealed by [`secretbox_seal`].
pub fn secretbox_open(
    ct: &[u8],
    nonce: &[u8; NONCE_BYTES],
    key: &[u8; SECRETBOX_KEY_BYTES],
) -> Result<Vec<u8>, EnvelopeError> {
    let cipher = XSalsa20Poly1305::new(SecretKey::from_slice(key));
    let n = crypto_secretbox::Nonce::from_slice(nonce);
    cipher.decrypt(n, ct).map_err(|_| EnvelopeError::Decryption)
}

// ---------------------------------------------------------------------------
// Detached signatures (Ed25519)
// ---------------------------------------------------------------------------

/// Sign `msg` with a 32-byte Ed25519 private key seed, returning the
/// 64-byte detached signature.
pub fn sign_detached(msg: &[u8], private_key: &[u8; 32]) -> [u8; 64] {
    let sk = SigningKey::from_bytes(private_key);
    sk.sign(msg).to_bytes()
}

/// Verify a detached signature against a 32-byte Ed25519 public key.
pub fn verify_detached(sig: &[u8; 64], msg: &[u8], public_key: &[u8; 32]) -> bool {
    let vk = match VerifyingKey::from_bytes(public_key) {
        Ok(vk) => vk,
        Err(_) => return false,
    };
    let sig = Signature::from_bytes(sig);
    vk.verify(msg, &sig).is_ok()
}

/// Generate a fresh Ed25519 signing keypair, returned as raw 32-byte arrays.
pub fn generate_sign_keypair() -> ([u8; 32], Zeroizing<[u8; 32]>) {
    let sk = SigningKey::generate(&mut OsRng);
    let vk = sk.verifying_key();
    (vk.to_bytes(), Zeroizing::new(sk.to_bytes()))
}

// ---------------------------------------------------------------------------
// PBKDF2-HMAC-SHA512 key derivation
// ---------------------------------------------------------------------------

const PBKDF2_ROUNDS: u32 = 1000;

/// PBKDF2-HMAC-SHA512(password, salt, 1000 rounds, out_len).
pub fn kdf(password: &[u8], salt: &[u8], out_len: usize) -> Zeroizing<Vec<u8>> {
    let mut out = vec![0u8; out_len];
    pbkdf2::pbkdf2_hmac::<sha2::Sha512>(password, salt, PBKDF2_ROUNDS, &mut out);
    Zeroizing::new(out)
}

/// Derive a 32-byte symmetric key.
pub fn derive_symmetric_key(password: &[u8], salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let derived = kdf(password, salt, 32);
    let mut out = [0u8; 32];
    out.copy_from_slice(&derived);
    Zeroizing::new(out)
}

/// Derive an X25519 keypair from a PBKDF2-derived 32-byte seed.
pub fn derive_crypto_keypair(password: &[u8], salt: &[u8]) -> ([u8; 32], Zeroizing<[u8; 32]>) {
    let seed = derive_symmetric_key(password, salt);
    let sk = BoxSecretKey::from(*seed);
    let pk = sk.public_key();
    (*pk.as_bytes(), Zeroizing::new(*sk.as_bytes()))
}

/// Derive an Ed25519 keypair from a PBKDF2-derived 32-byte seed.
pub fn derive_sign_keypair(password: &[u8], salt: &[u8]) -> ([u8; 32], Zeroizing<[u8; 32]>) {
    let seed = derive_symmetric_key(password, salt);
    let sk = SigningKey::from_bytes(&seed);
    let vk = sk.verifying_key();
    (vk.to_bytes(), Zeroizing::new(sk.to_bytes()))
}

// ---------------------------------------------------------------------------
// URL-safe base64 (no padding)
// ---------------------------------------------------------------------------

pub fn b64u_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn b64u_decode(s: &str) -> Result<Vec<u8>, EnvelopeError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| EnvelopeError::Malformed("base64"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_round_trip() {
        let (pk_a, sk_a) = generate_box_keypair();
        let (pk_b, sk_b) = generate_box_keypair();
        let nonce = random_nonce().unwrap();
        let ct = box_seal(b"hello", &nonce, &pk_b, &sk_a).unwrap();
        let pt = box_open(&ct, &nonce, &pk_a, &sk_b).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn secretbox_round_trip() {
        let key = *random_secretbox_key().unwrap();
        let nonce = random_nonce().unwrap();
        let ct = secretbox_seal(b"secret field", &nonce, &key).unwrap();
        let pt = secretbox_open(&ct, &nonce, &key).unwrap();
        assert_eq!(pt, b"secret field");
    }

    #[test]
    fn signature_round_trip() {
        let (pk, sk) = generate_sign_keypair();
        let sig = sign_detached(b"document", &sk);
        assert!(verify_detached(&sig, b"document", &pk));
        let mut tampered = sig;
        tampered[0] ^= 0xFF;
        assert!(!verify_detached(&tampered, b"document", &pk));
        assert!(!verify_detached(&sig, b"tampered document", &pk));
    }

    #[test]
    fn b64u_round_trip() {
        let data = b"\x00\x01\xff binary data";
        let encoded = b64u_encode(data);
        assert!(!encoded.contains('+') && !encoded.contains('/') && !encoded.contains('='));
        assert_eq!(b64u_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn kdf_is_deterministic() {
        let a = kdf(b"password", b"salt", 32);
        let b = kdf(b"password", b"salt", 32);
        assert_eq!(&*a, &*b);
        let c = kdf(b"password", b"other-salt", 32);
        assert_ne!(&*a, &*c);
    }
}

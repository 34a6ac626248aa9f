//! # sealed-store-envelope
//!
//! The cryptographic core of `sealed-store`: canonical byte serialization
//! for signed documents, the box/secretbox/Ed25519/PBKDF2 primitives, and
//! the dotted base64 codec for the access-key and field envelopes.
//!
//! This crate does no networking and holds no long-lived state — every
//! function here is a pure transformation over bytes. `sealed-store-client`
//! is the stateful layer built on top.
//!
//! ## Quick start
//!
//! ```
//! use sealed_store_envelope::crypto;
//!
//! let key = *crypto::random_secretbox_key().unwrap();
//! let nonce = crypto::random_nonce().unwrap();
//! let ct = crypto::secretbox_seal(b"field value", &nonce, &key).unwrap();
//! let pt = crypto::secretbox_open(&ct, &nonce, &key).unwrap();
//! assert_eq!(pt, b"field value");
//! ```

pub mod canonical;
pub mod codec;
pub mod crypto;
pub mod error;

pub use canonical::{canonical_bytes, canonical_string, SignedString};
pub use codec::{Eak, EncryptedField};
pub use error::EnvelopeError;

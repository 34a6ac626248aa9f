//! Wire types: the JSON shapes exchanged with the storage service.
//!
//! These are plain serde structs — no behavior lives here. Field naming
//! follows the wire schema exactly (snake_case), with one deliberate
//! exception: [`EakResponse`] accepts either the current
//! `authorizer_public_key` shape or the legacy camelCase alias on input
//! and always emits the snake_case form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A public encryption (or signing) key as the wire nests it: a single
/// named curve field rather than a bare string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curve25519Key {
    pub curve25519: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ed25519Key {
    pub ed25519: String,
}

/// Server-visible record header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    pub writer_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub plain: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Meta {
    /// The four fields that participate in the canonical `meta_for_signing`
    /// form: server-assigned fields (`record_id`, `created`,
    /// `last_modified`, `version`) are excluded.
    pub fn signing_value(&self) -> serde_json::Value {
        serde_json::json!({
            "plain": self.plain,
            "type": self.record_type,
            "user_id": self.user_id,
            "writer_id": self.writer_id,
        })
    }
}

/// A record as it travels the wire: meta plus field strings plus an
/// optional detached signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordWire {
    pub meta: Meta,
    pub data: BTreeMap<String, String>,
    #[serde(rename = "rec_sig", skip_serializing_if = "Option::is_none")]
    pub rec_sig: Option<String>,
}

/// Response to an EAK fetch/put.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EakResponse {
    pub eak: String,
    #[serde(
        rename = "authorizer_public_key",
        alias = "authorizerPublicKey"
    )]
    pub authorizer_public_key: Curve25519Key,
    #[serde(rename = "signer_signing_key", skip_serializing_if = "Option::is_none")]
    pub signer_signing_key: Option<Ed25519Key>,
    pub authorizer_id: Uuid,
    pub signer_id: Uuid,
}

/// Body sent on `PUT .../access_keys/{w}/{u}/{r}/{t}`.
#[derive(Debug, Clone, Serialize)]
pub struct PutEakRequest {
    pub eak: String,
    #[serde(rename = "authorizer_public_key")]
    pub authorizer_public_key: Curve25519Key,
    #[serde(rename = "signer_signing_key", skip_serializing_if = "Option::is_none")]
    pub signer_signing_key: Option<Ed25519Key>,
}

/// Response to `GET /v1/storage/clients/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: Uuid,
    pub public_key: Curve25519Key,
    #[serde(default)]
    pub validated: bool,
}

/// Body of `POST /v1/storage/search`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct QueryBody {
    pub count: u64,
    pub include_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writer_ids: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_ids: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<Uuid>>,
    pub after_index: u64,
    pub include_all_writers: bool,
}

/// One row of a search response.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResultItem {
    pub meta: Meta,
    #[serde(default)]
    pub record_data: Option<BTreeMap<String, String>>,
    #[serde(rename = "rec_sig", default)]
    pub rec_sig: Option<String>,
    #[serde(default)]
    pub access_key: Option<EakResponse>,
}

/// Response to `POST /v1/storage/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<QueryResultItem>,
    pub last_index: u64,
}

/// `{allow:[{read:{}}]}` / `{deny:[{read:{}}]}`.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<PolicyPermission>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<PolicyPermission>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyPermission {
    pub read: serde_json::Map<String, serde_json::Value>,
}

impl PolicyRequest {
    pub fn allow_read() -> Self {
        Self {
            allow: Some(vec![PolicyPermission { read: serde_json::Map::new() }]),
            deny: None,
        }
    }

    pub fn deny_read() -> Self {
        Self {
            allow: None,
            deny: Some(vec![PolicyPermission { read: serde_json::Map::new() }]),
        }
    }
}

/// One row of `GET /v1/storage/policy/{outgoing,incoming}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SharingEntry {
    #[serde(default)]
    pub reader_id: Option<Uuid>,
    #[serde(default)]
    pub writer_id: Option<Uuid>,
    pub record_type: String,
    #[serde(default)]
    pub reader_name: Option<String>,
    #[serde(default)]
    pub writer_name: Option<String>,
}

/// `POST /v1/auth/token` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_at: i64,
}

/// `POST /v1/account/e3db/clients/register` request.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub token: String,
    pub client: RegisterClient,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterClient {
    pub name: String,
    pub public_key: Curve25519Key,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<Ed25519Key>,
}

/// `POST /v1/account/e3db/clients/register` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientDetails {
    pub client_id: Uuid,
    pub api_key_id: String,
    pub api_secret: String,
    pub public_key: Curve25519Key,
    pub name: String,
}

//! Client Facade (C8): the single long-lived entry point binding a
//! [`Config`] to the AK manager, transport, and bearer-token state.

use std::sync::Arc;

use sealed_store_envelope::crypto;
use uuid::Uuid;

use crate::ak::AkManager;
use crate::config::{Config, ConfigVersion};
use crate::error::{ClientError, Result};
use crate::record::BackupRecord;
use crate::transport::Transport;
use crate::wire::{ClientDetails, Curve25519Key, Ed25519Key, RegisterClient, RegisterRequest};

/// Shared state behind a [`Client`] handle. Held in an `Arc` so cloning a
/// `Client` is cheap and every clone observes the same cache and token —
/// the AK cache and bearer token are the only mutable shared state.
pub(crate) struct ClientInner {
    pub(crate) config: Config,
    pub(crate) transport: Arc<Transport>,
    pub(crate) ak_manager: AkManager,
}

/// The public entry point. Exposes read/write/update/delete/query/share/
/// revoke and registration.
#[derive(Clone)]
pub struct Client(pub(crate) Arc<ClientInner>);

impl Client {
    pub fn new(config: Config) -> Self {
        let transport = Arc::new(Transport::new(
            config.api_url.clone(),
            config.api_key_id.clone(),
            config.api_secret.clone(),
        ));
        let ak_manager = AkManager::new(config.clone(), transport.clone());
        Self(Arc::new(ClientInner { config, transport, ak_manager }))
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    pub(crate) fn self_id(&self) -> Uuid {
        self.0.config.client_id
    }

    /// Fetch a reader's public key. Email-based lookup is withdrawn in
    /// v2; v2 behavior is treated as canonical here regardless of
    /// `config.version`.
    pub async fn client_info(&self, id: &str) -> Result<crate::wire::ClientInfo> {
        if looks_like_email(id) {
            return Err(ClientError::EmailLookupUnsupported);
        }
        let path = format!("/v1/storage/clients/{}", id);
        let resp = self.0.transport.get(&path, &[]).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "client info fetch returned {}",
                resp.status
            )));
        }
        resp.json()
    }

    /// Drop the AK cache and bearer token.
    pub async fn close(&self) {
        self.0.ak_manager.clear();
        self.0.transport.clear_token().await;
    }

    /// Generate a fresh X25519 keypair, URL-safe base64 encoded.
    pub fn generate_keypair() -> (String, String) {
        let (pk, sk) = crypto::generate_box_keypair();
        (crypto::b64u_encode(&pk), crypto::b64u_encode(&sk))
    }

    /// Generate a fresh Ed25519 signing keypair, URL-safe base64 encoded.
    pub fn generate_signing_keypair() -> (String, String) {
        let (pk, sk) = crypto::generate_sign_keypair();
        (crypto::b64u_encode(&pk), crypto::b64u_encode(&sk))
    }

    /// Anonymous token-gated registration. When `backup` is requested,
    /// the account opted in, and the caller supplied a private key,
    /// writes the current config back as a `tozny.key_backup` record and
    /// shares it with the backup target.
    pub async fn register(
        api_url: impl Into<String>,
        registration_token: impl Into<String>,
        client_name: impl Into<String>,
        public_key: impl Into<String>,
        private_key: Option<String>,
        signing_public_key: Option<String>,
        signing_private_key: Option<String>,
        backup: bool,
    ) -> Result<ClientDetails> {
        let api_url = api_url.into();
        let transport = Transport::new(&api_url, "", "");
        let body = RegisterRequest {
            token: registration_token.into(),
            client: RegisterClient {
                name: client_name.into(),
                public_key: Curve25519Key { curve25519: public_key.into() },
                signing_key: signing_public_key.clone().map(|k| Ed25519Key { ed25519: k }),
            },
        };

        let resp = transport
            .post_unauthenticated("/v1/account/e3db/clients/register", &body)
            .await?;
        if !resp.status.is_success() {
            return Err(ClientError::RegistrationFailed(format!(
                "registration returned {}",
                resp.status
            )));
        }
        let details: ClientDetails = resp.json()?;
        let backup_target = resp.header("x-backup-client");
        tracing::info!(target: "client", client_id = %details.client_id, "client registered");

        if backup {
            if let (Some(private_key), Some(token)) = (private_key, backup_target) {
                let version = if signing_public_key.is_some() && signing_private_key.is_some() {
                    ConfigVersion::V2
                } else {
                    ConfigVersion::V1
                };
                let backup_config = Config::new(
                    details.client_id,
                    details.api_key_id.clone(),
                    details.api_secret.clone(),
                    details.public_key.curve25519.clone(),
                    private_key,
                    signing_public_key,
                    signing_private_key,
                    api_url,
                    version,
                )?;
                let backup_client = Client::new(backup_config);
                backup_client.backup(&token, &body.token).await?;
            }
        }

        Ok(details)
    }

    /// Write the current config as a `tozny.key_backup` record, share it
    /// with the backup target, and notify the account service.
    pub async fn backup(&self, target_client_id: &str, registration_token: &str) -> Result<()> {
        let record = BackupRecord::from_config(&self.0.config);
        let written = self.write("tozny.key_backup", record.into_data(), Default::default()).await?;
        self.share("tozny.key_backup", target_client_id).await?;

        let path = format!(
            "/v1/account/backup/{}/{}",
            registration_token, self.self_id()
        );
        let resp = self.0.transport.post(&path, &serde_json::json!({})).await?;
        if !resp.status.is_success() {
            return Err(ClientError::RegistrationFailed(format!(
                "backup notification returned {}",
                resp.status
            )));
        }
        tracing::info!(target: "client", record_id = ?written.meta.record_id, "credentials backed up");
        Ok(())
    }
}

fn looks_like_email(s: &str) -> bool {
    crate::email_regex().is_match(s)
}

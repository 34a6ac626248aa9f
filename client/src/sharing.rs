//! Sharing Controller (C6): grant and revoke per-type access, resolve
//! reader public keys, and keep the AK cache coherent with policy changes.

use sealed_store_envelope::crypto;
use uuid::Uuid;

use crate::ak::CachedAk;
use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::wire::PolicyRequest;

pub use crate::wire::SharingEntry;

impl Client {
    /// Grant read access to a type for a reader. A no-op against
    /// ourselves; an email address is resolved to a client id first.
    /// Ensures an AK exists
    /// (creating and self-wrapping one if nothing has been written yet),
    /// wraps it for the reader, then grants the read policy.
    pub async fn share(&self, record_type: &str, reader_id: &str) -> Result<()> {
        let reader = self.resolve_reader(reader_id).await?;
        let self_id = self.self_id();
        if reader == self_id {
            return Ok(());
        }

        let cached = match self.0.ak_manager.get(self_id, self_id, self_id, record_type).await? {
            Some(cached) => cached,
            None => {
                let ak = self.0.ak_manager.create_for_self(self_id, self_id, record_type).await?;
                CachedAk { ak, signer_pub: None }
            }
        };

        let reader_info = self.client_info(&reader.to_string()).await?;
        let reader_pub = decode_pub(&reader_info.public_key.curve25519)?;
        self.0.ak_manager.put(self_id, self_id, reader, record_type, &cached.ak, &reader_pub).await?;

        let path = format!("/v1/storage/policy/{}/{}/{}/{}", self_id, self_id, reader, record_type);
        let resp = self.0.transport.put(&path, &PolicyRequest::allow_read()).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "policy allow returned {}",
                resp.status
            )));
        }
        tracing::info!(target: "sharing", reader = %reader, r#type = record_type, "share granted");
        Ok(())
    }

    /// Symmetric to [`Client::share`]. The policy denial is PUT *before*
    /// the access key is deleted, so a racing reader cannot acquire a
    /// new EAK between the two steps.
    pub async fn revoke(&self, record_type: &str, reader_id: &str) -> Result<()> {
        let reader = self.resolve_reader(reader_id).await?;
        let self_id = self.self_id();

        let path = format!("/v1/storage/policy/{}/{}/{}/{}", self_id, self_id, reader, record_type);
        let resp = self.0.transport.put(&path, &PolicyRequest::deny_read()).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "policy deny returned {}",
                resp.status
            )));
        }

        self.0.ak_manager.delete(self_id, self_id, reader, record_type).await?;
        tracing::info!(target: "sharing", reader = %reader, r#type = record_type, "share revoked");
        Ok(())
    }

    /// Types we've shared with others.
    pub async fn outgoing_sharing(&self) -> Result<Vec<SharingEntry>> {
        let resp = self.0.transport.get("/v1/storage/policy/outgoing", &[]).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "outgoing policy listing returned {}",
                resp.status
            )));
        }
        resp.json()
    }

    /// Types others have shared with us.
    pub async fn incoming_sharing(&self) -> Result<Vec<SharingEntry>> {
        let resp = self.0.transport.get("/v1/storage/policy/incoming", &[]).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "incoming policy listing returned {}",
                resp.status
            )));
        }
        resp.json()
    }

    /// An email-shaped reader id is resolved via `clientInfo` (which is
    /// itself withdrawn in v2 — email lookups simply fail with
    /// `EmailLookupUnsupported` before we get here). Anything else is
    /// parsed as a raw client id.
    async fn resolve_reader(&self, reader_id: &str) -> Result<Uuid> {
        if crate::email_regex().is_match(reader_id) {
            let info = self.client_info(reader_id).await?;
            return Ok(info.client_id);
        }
        Uuid::parse_str(reader_id)
            .map_err(|e| ClientError::ConfigInvalid(format!("reader id is not a uuid: {}", e)))
    }
}

fn decode_pub(b64u: &str) -> Result<[u8; 32]> {
    let bytes = crypto::b64u_decode(b64u)?;
    bytes
        .try_into()
        .map_err(|_| ClientError::ConfigInvalid("key is not 32 bytes".into()))
}

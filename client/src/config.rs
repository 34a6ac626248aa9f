//! Client configuration: an immutable bundle bound at construction.

use uuid::Uuid;

use crate::error::{ClientError, Result};

/// Config version. Version 1 omits signing keys; version 2 requires them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigVersion {
    V1 = 1,
    V2 = 2,
}

/// Immutable bundle bound at client construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: Uuid,
    pub api_key_id: String,
    pub api_secret: String,
    /// X25519 public key, URL-safe base64.
    pub public_key: String,
    /// X25519 private key, URL-safe base64.
    pub private_key: String,
    /// Ed25519 public signing key, URL-safe base64 (v2 only).
    pub public_sign_key: Option<String>,
    /// Ed25519 private signing key, URL-safe base64 (v2 only).
    pub private_sign_key: Option<String>,
    pub api_url: String,
    pub version: ConfigVersion,
}

impl Config {
    /// Construct and validate a `Config`. See spec invariant: if
    /// `version == V2` then both signing keys must be present and
    /// non-empty.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_id: Uuid,
        api_key_id: impl Into<String>,
        api_secret: impl Into<String>,
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        public_sign_key: Option<String>,
        private_sign_key: Option<String>,
        api_url: impl Into<String>,
        version: ConfigVersion,
    ) -> Result<Self> {
        let cfg = Self {
            client_id,
            api_key_id: api_key_id.into(),
            api_secret: api_secret.into(),
            public_key: public_key.into(),
            private_key: private_key.into(),
            public_sign_key,
            private_sign_key,
            api_url: api_url.into(),
            version,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.version == ConfigVersion::V2 {
            let has_sign_keys = self
                .public_sign_key
                .as_deref()
                .is_some_and(|s| !s.is_empty())
                && self
                    .private_sign_key
                    .as_deref()
                    .is_some_and(|s| !s.is_empty());
            if !has_sign_keys {
                return Err(ClientError::ConfigInvalid(
                    "version 2 requires non-empty public_sign_key and private_sign_key".into(),
                ));
            }
        }
        Ok(())
    }

    /// Load a `Config` from `SEALED_STORE_*` environment variables. Process
    /// bootstrap convenience, outside the cryptographic core, matching the
    /// teacher's environment-driven startup for its API server.
    pub fn from_env() -> Result<Self> {
        fn var(name: &str) -> Result<String> {
            std::env::var(name)
                .map_err(|_| ClientError::ConfigInvalid(format!("missing env var {}", name)))
        }
        fn opt_var(name: &str) -> Option<String> {
            std::env::var(name).ok()
        }

        let client_id = Uuid::parse_str(&var("SEALED_STORE_CLIENT_ID")?)
            .map_err(|e| ClientError::ConfigInvalid(format!("client_id: {}", e)))?;
        let version = match var("SEALED_STORE_VERSION")?.as_str() {
            "1" => ConfigVersion::V1,
            "2" => ConfigVersion::V2,
            other => {
                return Err(ClientError::ConfigInvalid(format!(
                    "unsupported version: {}",
                    other
                )))
            }
        };

        Self::new(
            client_id,
            var("SEALED_STORE_API_KEY_ID")?,
            var("SEALED_STORE_API_SECRET")?,
            var("SEALED_STORE_PUBLIC_KEY")?,
            var("SEALED_STORE_PRIVATE_KEY")?,
            opt_var("SEALED_STORE_PUBLIC_SIGN_KEY"),
            opt_var("SEALED_STORE_PRIVATE_SIGN_KEY"),
            var("SEALED_STORE_API_URL")?,
            version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn v1_config_without_signing_keys_is_valid() {
        let cfg = Config::new(
            uuid(),
            "key-id",
            "secret",
            "pub",
            "priv",
            None,
            None,
            "https://api.example.com",
            ConfigVersion::V1,
        );
        assert!(cfg.is_ok());
    }

    #[test]
    fn v2_config_without_signing_keys_is_invalid() {
        let cfg = Config::new(
            uuid(),
            "key-id",
            "secret",
            "pub",
            "priv",
            None,
            None,
            "https://api.example.com",
            ConfigVersion::V2,
        );
        assert!(matches!(cfg, Err(ClientError::ConfigInvalid(_))));
    }

    #[test]
    fn v2_config_with_empty_signing_keys_is_invalid() {
        let cfg = Config::new(
            uuid(),
            "key-id",
            "secret",
            "pub",
            "priv",
            Some(String::new()),
            Some("sign-priv".into()),
            "https://api.example.com",
            ConfigVersion::V2,
        );
        assert!(matches!(cfg, Err(ClientError::ConfigInvalid(_))));
    }

    #[test]
    fn v2_config_with_signing_keys_is_valid() {
        let cfg = Config::new(
            uuid(),
            "key-id",
            "secret",
            "pub",
            "priv",
            Some("sign-pub".into()),
            Some("sign-priv".into()),
            "https://api.example.com",
            ConfigVersion::V2,
        );
        assert!(cfg.is_ok());
    }
}

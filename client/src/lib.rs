//! # sealed-store-client
//!
//! The stateful client core of `sealed-store`: the access-key lifecycle
//! (C4), the record engine (C5), the sharing controller (C6), the query
//! cursor (C7), and the client facade (C8) that binds them to a live
//! storage service.
//!
//! Field-level cryptography and canonical serialization live in the
//! sibling [`sealed_store_envelope`] crate; this crate owns everything
//! that needs a server round trip or mutable per-instance state.
//!
//! ## Quick start
//!
//! ```no_run
//! use sealed_store_client::{Client, Config, ConfigVersion, RecordData};
//! use uuid::Uuid;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new(
//!     Uuid::new_v4(), "key-id", "secret", "pub-key", "priv-key",
//!     None, None, "https://api.example.com", ConfigVersion::V1,
//! )?;
//! let client = Client::new(config);
//!
//! let mut data = RecordData::new();
//! data.insert("now", "2017-01-02T03:04:05Z");
//! let record = client.write("test_record", data, Default::default()).await?;
//! let read_back = client.read(record.meta.record_id.unwrap(), None).await?;
//! assert_eq!(read_back.data.get("now"), Some("2017-01-02T03:04:05Z"));
//! # Ok(())
//! # }
//! ```

pub mod ak;
pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod sharing;
pub mod transport;
pub mod wire;

pub use client::Client;
pub use config::{Config, ConfigVersion};
pub use error::{ClientError, Result};
pub use query::{Query, QueryCursor};
pub use record::{Record, RecordData};
pub use sharing::SharingEntry;

use std::sync::OnceLock;

/// A deliberately loose "does this look like an email" check (§4.6, §4.8):
/// the wire protocol treats any string matching it as a request for the
/// (v2-disabled) email-lookup path rather than a raw client id.
pub(crate) fn email_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_matches_emails_only() {
        assert!(email_regex().is_match("user@example.com"));
        assert!(!email_regex().is_match("11111111-1111-1111-1111-111111111111"));
        assert!(!email_regex().is_match("not-an-email"));
    }
}

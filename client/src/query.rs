//! Query Cursor (C7): paginated, lazy, forward-only iteration over server
//! search results, decrypting each page on demand.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::record::{decrypt_fields, RecordData};
use crate::wire::{Meta, QueryBody};

/// A query's parameters, independent of pagination state. Mirrors
/// [`QueryBody`] field-for-field but exposes a builder rather than
/// requiring callers to construct the wire type directly.
#[derive(Debug, Clone)]
pub struct Query {
    pub count: u64,
    pub include_data: bool,
    pub writer_ids: Option<Vec<Uuid>>,
    pub record_ids: Option<Vec<Uuid>>,
    pub content_types: Option<Vec<String>>,
    pub plain: Option<BTreeMap<String, String>>,
    pub user_ids: Option<Vec<Uuid>>,
    pub include_all_writers: bool,
    /// Skip decryption even when `include_data` is set — the caller gets
    /// back rows with no field data, just `meta`/`signature`.
    pub raw: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            count: 100,
            include_data: true,
            writer_ids: None,
            record_ids: None,
            content_types: None,
            plain: None,
            user_ids: None,
            include_all_writers: false,
            raw: false,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.content_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_writer_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.writer_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn with_record_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.record_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn with_plain(mut self, plain: BTreeMap<String, String>) -> Self {
        self.plain = Some(plain);
        self
    }

    pub fn without_data(mut self) -> Self {
        self.include_data = false;
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    fn to_body(&self, after_index: u64) -> QueryBody {
        QueryBody {
            count: self.count,
            include_data: self.include_data,
            writer_ids: self.writer_ids.clone(),
            record_ids: self.record_ids.clone(),
            content_types: self.content_types.clone(),
            plain: self.plain.clone(),
            user_ids: self.user_ids.clone(),
            after_index,
            include_all_writers: self.include_all_writers,
        }
    }
}

/// One row yielded by a [`QueryCursor`]. `data` is populated only when
/// the query asked for data and `raw` was not set — ciphertext field
/// strings are never surfaced through this type; a field plaintext
/// never leaves the client, and we don't expose its sealed form as a
/// half-decrypted substitute either.
#[derive(Debug, Clone)]
pub struct QueryResultRow {
    pub meta: Meta,
    pub data: Option<RecordData>,
    pub signature: Option<String>,
}

/// State: `(client, query_template, after_index, done)`. Holds a cloned
/// [`Client`] handle — itself an `Arc` — rather than a partial config,
/// so any private-key lookup always resolves through the one owning
/// client rather than a stale copy of its config.
pub struct QueryCursor {
    client: Client,
    query: Query,
    after_index: u64,
    done: bool,
}

impl QueryCursor {
    pub(crate) fn new(client: Client, query: Query) -> Self {
        Self { client, query, after_index: 0, done: false }
    }

    /// Whether the cursor has observed an empty page and will no longer
    /// emit results.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch and decrypt the next page. Yields an empty batch once the
    /// server reports no more matches; callers may keep calling `next`
    /// after that point and will keep getting empty batches rather than
    /// an error. Stopping early (dropping the cursor) does not touch
    /// server state.
    pub async fn next(&mut self) -> Result<Vec<QueryResultRow>> {
        if self.done {
            return Ok(Vec::new());
        }

        let body = self.query.to_body(self.after_index);
        let resp = self.client.0.transport.post("/v1/storage/search", &body).await?;
        if !resp.status.is_success() {
            return Err(ClientError::TransportError(format!(
                "query returned {}",
                resp.status
            )));
        }

        let parsed: crate::wire::QueryResponse = resp.json()?;
        if parsed.results.is_empty() {
            self.done = true;
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(parsed.results.len());
        for item in parsed.results {
            let data = if self.query.include_data && !self.query.raw {
                match (&item.record_data, &item.access_key) {
                    (Some(cipher), Some(eak_resp)) => {
                        let cached = self.client.0.ak_manager.get_cached_or_unseal(
                            item.meta.writer_id,
                            item.meta.user_id,
                            &item.meta.record_type,
                            eak_resp,
                        )?;
                        Some(RecordData::from(decrypt_fields(&cached.ak, cipher)?))
                    }
                    _ => None,
                }
            } else {
                None
            };
            rows.push(QueryResultRow { meta: item.meta, data, signature: item.rec_sig });
        }

        self.after_index = parsed.last_index;
        tracing::debug!(target: "query", after_index = self.after_index, rows = rows.len(), "query page fetched");
        Ok(rows)
    }
}

impl Client {
    /// Construct a forward-only cursor over `/v1/storage/search` results
    /// for this query.
    pub fn query(&self, query: Query) -> QueryCursor {
        QueryCursor::new(self.clone(), query)
    }
}

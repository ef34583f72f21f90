//! Hashed user uploads to a custom audience.
//!
//! An upload runs in three steps, all inside one call to
//! [`AudienceBatchUploader::upload`]:
//!
//! 1. **Validation.** The first record decides, per field, whether that field is
//!    present for the whole batch. A record that disagrees fails the entire call
//!    before anything is hashed or sent.
//! 2. **Hashing.** Each present field becomes the lowercase-hex SHA-256 of its raw
//!    value, in the fixed order FN, LN, EMAIL. Values are not normalized here.
//! 3. **Dispatch.** Up to [`MAX_USERS_PER_BATCH`] records go out in one request.
//!    Larger uploads are split into chunks sent one after another, each tagged with
//!    a shared session so the server can reassemble them.
//!
//! A failed chunk aborts the upload. Chunks already accepted stay applied.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::MarketingClient;
use crate::error::{Error, Result};
use crate::serde_util::{lenient_string, lenient_u64};

/// Most records the users endpoint accepts in one request.
pub const MAX_USERS_PER_BATCH: usize = 10_000;

/// One person to match against the audience. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// The raw value of `field`, if present and not blank.
    pub fn value(&self, field: SchemaField) -> Option<&str> {
        let value = match field {
            SchemaField::FirstName => self.first_name.as_deref(),
            SchemaField::LastName => self.last_name.as_deref(),
            SchemaField::Email => self.email.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaField {
    #[serde(rename = "FN")]
    FirstName,
    #[serde(rename = "LN")]
    LastName,
    #[serde(rename = "EMAIL")]
    Email,
}

impl SchemaField {
    /// Validation, hashing and wire order.
    pub const ALL: [SchemaField; 3] = [
        SchemaField::FirstName,
        SchemaField::LastName,
        SchemaField::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaField::FirstName => "FN",
            SchemaField::LastName => "LN",
            SchemaField::Email => "EMAIL",
        }
    }
}

impl fmt::Display for SchemaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaField::FirstName => "FirstName",
            SchemaField::LastName => "LastName",
            SchemaField::Email => "Email",
        };
        f.write_str(name)
    }
}

/// The fields carried by every record of one upload, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema(Vec<SchemaField>);

impl Schema {
    /// Derives the schema shared by `users`.
    ///
    /// Fails with [`Error::InconsistentField`] naming the first field (in FN, LN,
    /// EMAIL order) on which some record disagrees with the first record, and with
    /// [`Error::EmptyInput`] if no field is present at all.
    pub fn derive(users: &[UserRecord]) -> Result<Self> {
        let Some(first) = users.first() else {
            return Err(Error::EmptyInput);
        };

        let mut fields = Vec::with_capacity(SchemaField::ALL.len());
        for field in SchemaField::ALL {
            let expected = first.value(field).is_some();
            if users.iter().any(|user| user.value(field).is_some() != expected) {
                return Err(Error::InconsistentField { field });
            }
            if expected {
                fields.push(field);
            }
        }

        if fields.is_empty() {
            return Err(Error::EmptyInput);
        }

        Ok(Self(fields))
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.0
    }

    /// Hashes the schema's fields of `user`.
    ///
    /// `user` must have passed [`Schema::derive`] together with the rest of its batch.
    pub fn hash(&self, user: &UserRecord) -> HashedRecord {
        self.0
            .iter()
            .filter_map(|field| user.value(*field))
            .map(sha256_hex)
            .collect()
    }
}

/// Digests of one user's fields, in schema order.
pub type HashedRecord = Vec<String>;

pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Correlates the chunks of an upload larger than [`MAX_USERS_PER_BATCH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadSession {
    pub session_id: u64,
    /// 1-based.
    pub batch_seq: u32,
    pub last_batch_flag: bool,
    /// Size of the whole upload, not of this chunk.
    pub estimated_num_total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunk<'a> {
    pub data: &'a [HashedRecord],
    pub session: Option<UploadSession>,
}

/// Splits `records` into the requests that upload them.
///
/// At or under `batch_limit` this is a single chunk without a session. A limit
/// of zero is treated as one.
pub fn plan_chunks(
    records: &[HashedRecord],
    batch_limit: usize,
    session_id: u64,
) -> Vec<UploadChunk<'_>> {
    let batch_limit = batch_limit.max(1);
    if records.len() <= batch_limit {
        return vec![UploadChunk {
            data: records,
            session: None,
        }];
    }

    let mut chunks = Vec::with_capacity(records.len().div_ceil(batch_limit));
    let mut remaining = records;
    let mut batch_seq = 1;

    while !remaining.is_empty() {
        let last_batch_flag = remaining.len() < batch_limit;
        let (data, rest) = remaining.split_at(remaining.len().min(batch_limit));

        chunks.push(UploadChunk {
            data,
            session: Some(UploadSession {
                session_id,
                batch_seq,
                last_batch_flag,
                estimated_num_total: records.len(),
            }),
        });

        remaining = rest;
        batch_seq += 1;
    }

    chunks
}

/// Server acknowledgment of one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadAcknowledgment {
    #[serde(default, deserialize_with = "lenient_string")]
    pub audience_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub num_received: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub num_invalid_entries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    pub batch_seq: u32,
    pub records_sent: usize,
    pub acknowledgment: UploadAcknowledgment,
}

impl ChunkReport {
    /// The server received every record sent and rejected none.
    pub fn is_fully_accepted(&self) -> bool {
        self.acknowledgment.num_received == self.records_sent as u64
            && self.acknowledgment.num_invalid_entries == 0
    }
}

/// Outcome of a completed upload.
///
/// Acknowledgment counts are reported, not enforced: a chunk the server only
/// partly accepted does not fail the upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub session_id: Option<u64>,
    pub total_records: usize,
    pub chunks: Vec<ChunkReport>,
}

impl UploadReport {
    pub fn total_received(&self) -> u64 {
        self.chunks.iter().map(|c| c.acknowledgment.num_received).sum()
    }

    pub fn total_invalid(&self) -> u64 {
        self.chunks.iter().map(|c| c.acknowledgment.num_invalid_entries).sum()
    }

    pub fn is_fully_accepted(&self) -> bool {
        self.chunks.iter().all(ChunkReport::is_fully_accepted)
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    schema: &'a Schema,
    data: &'a [HashedRecord],
}

/// Uploads hashed user records to custom audiences, chunking as needed.
pub struct AudienceBatchUploader<'a> {
    client: &'a MarketingClient,
    batch_limit: usize,
}

impl<'a> AudienceBatchUploader<'a> {
    pub fn new(client: &'a MarketingClient) -> Self {
        Self {
            client,
            batch_limit: MAX_USERS_PER_BATCH,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    pub async fn upload(
        &self,
        audience_id: &str,
        users: &[UserRecord],
        cancel: &CancellationToken,
    ) -> Result<UploadReport> {
        if users.is_empty() {
            debug!(audience_id, "No users to upload");
            return Ok(UploadReport::default());
        }

        let schema = Schema::derive(users)?;
        let hashed: Vec<HashedRecord> = users.iter().map(|user| schema.hash(user)).collect();

        let session_id = rand::thread_rng().gen_range(1..=i64::MAX as u64);
        let chunks = plan_chunks(&hashed, self.batch_limit, session_id);
        let chunked = chunks.len() > 1;

        if chunked && !chunks.iter().any(|c| c.session.is_some_and(|s| s.last_batch_flag)) {
            debug!(
                session_id,
                "Upload size is a multiple of the batch limit; no chunk is flagged last"
            );
        }

        info!(
            audience_id,
            users = users.len(),
            schema = ?schema.fields(),
            chunks = chunks.len(),
            "Uploading users to custom audience"
        );

        let url = self.client.versioned_url(&[audience_id, "users"])?;
        let mut report = UploadReport {
            session_id: chunked.then_some(session_id),
            total_records: users.len(),
            chunks: Vec::with_capacity(chunks.len()),
        };

        for chunk in &chunks {
            if cancel.is_cancelled() {
                warn!(
                    audience_id,
                    sent_chunks = report.chunks.len(),
                    "Upload cancelled; earlier chunks remain applied"
                );
                return Err(Error::Cancelled);
            }

            let payload = serde_json::to_string(&Payload {
                schema: &schema,
                data: chunk.data,
            })?;

            let mut form = vec![
                ("payload", payload),
                ("access_token", self.client.access_token().to_string()),
            ];
            if let Some(session) = &chunk.session {
                form.push(("session", serde_json::to_string(session)?));
            }

            let acknowledgment: UploadAcknowledgment = self
                .client
                .execute(self.client.http().post(url.clone()).form(&form), cancel)
                .await?;

            let chunk_report = ChunkReport {
                batch_seq: chunk.session.map_or(1, |s| s.batch_seq),
                records_sent: chunk.data.len(),
                acknowledgment,
            };

            if chunk_report.is_fully_accepted() {
                debug!(
                    batch_seq = chunk_report.batch_seq,
                    records = chunk_report.records_sent,
                    "Chunk accepted"
                );
            } else {
                warn!(
                    batch_seq = chunk_report.batch_seq,
                    records = chunk_report.records_sent,
                    received = chunk_report.acknowledgment.num_received,
                    invalid = chunk_report.acknowledgment.num_invalid_entries,
                    "Chunk acknowledgment does not match records sent"
                );
            }

            report.chunks.push(chunk_report);
        }

        info!(
            audience_id,
            received = report.total_received(),
            invalid = report.total_invalid(),
            "Upload complete"
        );

        Ok(report)
    }
}

impl MarketingClient {
    /// Hashes `users` and adds them to the custom audience `audience_id`.
    ///
    /// See [`AudienceBatchUploader`].
    pub async fn add_users_to_custom_audience(
        &self,
        audience_id: &str,
        users: &[UserRecord],
        cancel: &CancellationToken,
    ) -> Result<UploadReport> {
        AudienceBatchUploader::new(self)
            .upload(audience_id, users, cancel)
            .await
    }
}

//! Wire types exchanged with the question-answering backend.
//!
//! Field names follow the backend's JSON exactly; these structs are the
//! compatibility contract. Timestamps are accepted with or without a UTC
//! offset because the backend emits naive ISO-8601 datetimes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Number of chunks requested per question unless configured otherwise.
pub const DEFAULT_TOP_K: u32 = 10;

/// Request body of `POST /api/query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub question: String,
    pub top_k: u32,
}

impl Query {
    pub fn new(question: impl Into<String>, top_k: u32) -> Self {
        Self {
            question: question.into(),
            top_k,
        }
    }
}

/// Kind of document a cited source came from.
///
/// Unknown values are preserved in [`SourceType::Other`] so that new backend
/// source kinds degrade to a generic icon instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    Pdf,
    Word,
    Excel,
    Other(String),
}

impl From<String> for SourceType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "pdf" => SourceType::Pdf,
            "word" => SourceType::Word,
            "excel" => SourceType::Excel,
            _ => SourceType::Other(value),
        }
    }
}

impl From<SourceType> for String {
    fn from(value: SourceType) -> Self {
        value.as_str().to_string()
    }
}

impl SourceType {
    pub fn as_str(&self) -> &str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Word => "word",
            SourceType::Excel => "excel",
            SourceType::Other(s) => s,
        }
    }
}

/// A cited document fragment backing an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub kind: SourceType,
    pub filename: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response body of `POST /api/query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Backend-side processing time in seconds.
    pub processing_time: f64,
}

/// One question/answer exchange in the chat transcript. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub timestamp: DateTime<Utc>,
}

/// A document known to the backend, as listed by `GET /api/admin/documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    /// File extension including the leading dot (e.g. `.pdf`).
    #[serde(rename = "type")]
    pub file_type: String,
    pub size: u64,
    #[serde(deserialize_with = "de_timestamp")]
    pub upload_date: DateTime<Utc>,
    pub indexed: bool,
}

/// Response body of `POST /api/admin/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub status: String,
    pub message: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Response body of `POST /api/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginToken {
    pub access_token: String,
    pub token_type: String,
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub documents: Option<u64>,
}

/// Response body of `GET /api/admin/stats`.
///
/// Only the well-known counters are typed; anything else the backend
/// reports is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexStats {
    #[serde(default)]
    pub total_documents: Option<u64>,
    #[serde(default)]
    pub index_loaded: Option<bool>,
    #[serde(default)]
    pub query_engine_ready: Option<bool>,
    #[serde(default)]
    pub uploaded_files: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response body of `POST /api/admin/backup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupReceipt {
    pub message: String,
    pub backup_path: String,
}

/// Generic acknowledgement returned by delete and rebuild calls.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

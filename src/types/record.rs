use super::ids::{MessageId, RequestId, UniqueHash};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

/// Line discriminator, decoded once at parse time so downstream logic
/// switches on an enum instead of re-comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordKind {
    Assistant,
    User,
    ToolUse,
    #[default]
    Other,
}

impl<'de> Deserialize<'de> for RecordKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "assistant" => RecordKind::Assistant,
            "user" => RecordKind::User,
            "tool_use" => RecordKind::ToolUse,
            _ => RecordKind::Other,
        })
    }
}

// Raw shape of one transcript JSONL line. Everything is optional; logs
// still being written routinely contain partial objects.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLogLine {
    #[serde(rename = "type", default)]
    pub kind: RecordKind,
    pub timestamp: Option<String>,
    pub message: Option<RawMessage>,
    #[serde(rename = "requestId", alias = "request_id")]
    pub request_id: Option<RequestId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub id: Option<MessageId>,
    pub model: Option<String>,
    pub usage: Option<RawUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_creation_input_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
}

impl RawUsage {
    /// A usage sub-record with no token fields at all does not make the
    /// line eligible for accounting.
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.cache_creation_input_tokens.is_none()
            && self.cache_read_input_tokens.is_none()
    }
}

/// Token counts for one accounted response, by pricing class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl TokenCounts {
    /// Headline token count: input + output only. Cache tokens are priced
    /// but deliberately excluded here; cache reads are heavily discounted
    /// and would visually inflate usage.
    pub fn headline(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl From<&RawUsage> for TokenCounts {
    fn from(usage: &RawUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
            cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
            cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0),
        }
    }
}

/// One accounted unit of model usage, extracted from an eligible
/// transcript line.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub tokens: TokenCounts,
    /// Present only when the line carried both a message id and a request
    /// id; `None` means the record is never deduplicated.
    pub identity: Option<UniqueHash>,
}

impl UsageRecord {
    /// Parse one JSONL line into a usage record.
    ///
    /// Returns `None` for anything that is not an assistant response with
    /// a non-empty usage sub-record and a parseable timestamp. Malformed
    /// JSON is also `None`; a bad line never aborts the scan of the rest
    /// of its file.
    pub fn from_line(line: &str) -> Option<Self> {
        let raw: RawLogLine = serde_json::from_str(line).ok()?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawLogLine) -> Option<Self> {
        if raw.kind != RecordKind::Assistant {
            return None;
        }
        let message = raw.message?;
        let usage = message.usage.as_ref().filter(|u| !u.is_empty())?;
        let timestamp = parse_timestamp(raw.timestamp.as_deref()?)?;

        let identity = match (&message.id, &raw.request_id) {
            (Some(msg_id), Some(req_id)) => Some(UniqueHash::from_ids(msg_id, req_id)),
            _ => None,
        };

        Some(Self {
            timestamp,
            model: message.model.clone().unwrap_or_else(|| "unknown".to_string()),
            tokens: TokenCounts::from(usage),
            identity,
        })
    }
}

/// Parse an ISO-8601 timestamp string into a UTC instant.
///
/// Accepts both offset-carrying forms (`...Z`, `...+09:00`) and naive
/// forms; naive timestamps are taken to already be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

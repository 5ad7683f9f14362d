use serde::Deserialize;
use std::fmt;

/// NewType wrapper for the provider-assigned message ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// NewType wrapper for the API request ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Composite dedup identity: `message_id:request_id`.
///
/// Only constructible when both ids are present; log lines missing either
/// field carry no identity and are accounted independently (a documented
/// looseness of the source data, not something to paper over).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueHash(String);

impl UniqueHash {
    pub fn from_ids(message_id: &MessageId, request_id: &RequestId) -> Self {
        Self(format!("{}:{}", message_id, request_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<(&MessageId, &RequestId)> for UniqueHash {
    fn from((msg_id, req_id): (&MessageId, &RequestId)) -> Self {
        Self::from_ids(msg_id, req_id)
    }
}

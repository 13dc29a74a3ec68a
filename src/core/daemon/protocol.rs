//! Daemon wire protocol.
//!
//! One JSON document per direction per connection:
//!
//! ```text
//! → {"command": "GET", "payload": {"slugs": ["acme.prod.API_KEY"]}}
//! ← {"success": true, "data": {"keys": [...]}}
//! ```
//!
//! Timestamps are milliseconds since the Unix epoch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::domain::{Env, GrantSource, KeyGrant};
use crate::error::{DaemonError, Result};

/// Request as it appears on the wire, before the command is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

/// A daemon command with its typed payload.
#[derive(Debug, Clone)]
pub enum Request {
    Unlock(UnlockPayload),
    Get(GetPayload),
    Status,
    Relock(RelockPayload),
}

impl Request {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Unlock(_) => "UNLOCK",
            Self::Get(_) => "GET",
            Self::Status => "STATUS",
            Self::Relock(_) => "RELOCK",
        }
    }

    pub fn to_raw(&self) -> Result<RawRequest> {
        let payload = match self {
            Self::Unlock(p) => serde_json::to_value(p)?,
            Self::Get(p) => serde_json::to_value(p)?,
            Self::Status => Value::Null,
            Self::Relock(p) => serde_json::to_value(p)?,
        };
        Ok(RawRequest {
            command: self.command().to_string(),
            payload,
        })
    }

    /// Interpret a wire request.
    ///
    /// A missing payload is treated as an empty object.
    pub fn from_raw(raw: RawRequest) -> Result<Self> {
        let payload = match raw.payload {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        match raw.command.as_str() {
            "UNLOCK" => Ok(Self::Unlock(serde_json::from_value(payload)?)),
            "GET" => Ok(Self::Get(serde_json::from_value(payload)?)),
            "STATUS" => Ok(Self::Status),
            "RELOCK" => Ok(Self::Relock(serde_json::from_value(payload)?)),
            other => Err(DaemonError::UnknownCommand(other.to_string()).into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockPayload {
    pub keys: Vec<KeyGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockData {
    pub unlocked: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPayload {
    #[serde(default)]
    pub slugs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetData {
    pub keys: Vec<KeyGrant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelockPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slugs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Env>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelockData {
    pub relocked: Vec<String>,
}

/// One unexpired cache entry as reported by STATUS. Carries no secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub slug: String,
    pub env: Env,
    pub org: String,
    pub source: GrantSource,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    pub ttl_left_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusData {
    pub keys: Vec<StatusEntry>,
}

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::err(e),
        }
    }

    pub fn err(message: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }

    /// Unwrap the `data` of a successful response into `T`.
    pub fn into_data<T: for<'de> Deserialize<'de>>(self) -> Result<T> {
        if !self.success {
            return Err(DaemonError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            )
            .into());
        }
        let data = self
            .data
            .ok_or_else(|| DaemonError::MalformedResponse("missing data".to_string()))?;
        serde_json::from_value(data)
            .map_err(|e| DaemonError::MalformedResponse(e.to_string()).into())
    }
}

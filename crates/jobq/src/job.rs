//! Job records persisted in the store while a submission is in flight.

use crate::error::{QueueError, ValidationError};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

// ============================================================================
// JobStatus
// ============================================================================

/// Lifecycle states of a job record.
///
/// A job starts as `new`; the worker moves it to `processing` and then
/// `complete` or `fail`. The submitting client writes `expire` itself when
/// its polling deadline passes. Terminal states end the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    New,
    Processing,
    Complete,
    Fail,
    Expire,
}

impl JobStatus {
    /// Status value as stored in the record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Expire => "expire",
        }
    }

    /// Whether no further transition happens from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Fail | Self::Expire)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "processing" => Ok(Self::Processing),
            "complete" => Ok(Self::Complete),
            "fail" => Ok(Self::Fail),
            "expire" => Ok(Self::Expire),
            other => Err(ValidationError::InvalidFormat {
                field: "status".to_string(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

// ============================================================================
// Job
// ============================================================================

/// A submitted job as persisted in the store.
///
/// The record is a hash keyed by the job id. Optional fields are stored as
/// empty strings so the layout is identical across all lifecycle states;
/// the worker fills `finish_time`, `result`, and `errors` when it finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Unique token identifying the record; also the queue token.
    pub id: String,
    /// Opaque payload supplied by the caller.
    pub msg: Bytes,
    /// Unix seconds at creation.
    pub create_time: i64,
    /// Caller-supplied processing budget in seconds.
    pub timeout: Option<u64>,
    /// Unix seconds at which the worker finished.
    pub finish_time: Option<i64>,
    pub status: JobStatus,
    /// Worker-produced output.
    pub result: Option<Bytes>,
    /// Worker-reported failure detail.
    pub errors: Option<String>,
}

impl Job {
    /// Fresh record for a payload about to be submitted.
    pub fn new(msg: Bytes, timeout: Option<Duration>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            msg,
            create_time: Utc::now().timestamp(),
            timeout: timeout.map(|timeout| timeout.as_secs()),
            finish_time: None,
            status: JobStatus::New,
            result: None,
            errors: None,
        }
    }

    /// Hash fields for persisting this record.
    pub fn to_fields(&self) -> Vec<(String, Bytes)> {
        vec![
            ("id".to_string(), Bytes::from(self.id.clone())),
            ("msg".to_string(), self.msg.clone()),
            (
                "create_time".to_string(),
                Bytes::from(self.create_time.to_string()),
            ),
            (
                "timeout".to_string(),
                self.timeout
                    .map(|timeout| Bytes::from(timeout.to_string()))
                    .unwrap_or_default(),
            ),
            (
                "finish_time".to_string(),
                self.finish_time
                    .map(|finish_time| Bytes::from(finish_time.to_string()))
                    .unwrap_or_default(),
            ),
            ("status".to_string(), Bytes::from(self.status.as_str())),
            ("result".to_string(), self.result.clone().unwrap_or_default()),
            (
                "errors".to_string(),
                self.errors.clone().map(Bytes::from).unwrap_or_default(),
            ),
        ]
    }

    /// Rebuild a record from stored hash fields.
    pub fn from_fields(key: &str, fields: &HashMap<String, Bytes>) -> Result<Self, QueueError> {
        if fields.is_empty() {
            return Err(QueueError::malformed_record(key, "no fields in store"));
        }
        let id = text_field(key, fields, "id")?
            .ok_or_else(|| QueueError::malformed_record(key, "missing field 'id'"))?;
        let msg = fields.get("msg").cloned().unwrap_or_default();
        let create_time = number_field::<i64>(key, fields, "create_time")?
            .ok_or_else(|| QueueError::malformed_record(key, "missing field 'create_time'"))?;
        let timeout = number_field::<u64>(key, fields, "timeout")?;
        let finish_time = number_field::<i64>(key, fields, "finish_time")?;
        let status = text_field(key, fields, "status")?
            .ok_or_else(|| QueueError::malformed_record(key, "missing field 'status'"))?
            .parse::<JobStatus>()
            .map_err(|err| QueueError::malformed_record(key, err.to_string()))?;
        let result = match fields.get("result") {
            Some(raw) if !raw.is_empty() => Some(raw.clone()),
            _ => None,
        };
        let errors = text_field(key, fields, "errors")?;

        Ok(Self {
            id,
            msg,
            create_time,
            timeout,
            finish_time,
            status,
            result,
            errors,
        })
    }
}

/// Read an optional text field; empty and absent both mean `None`.
fn text_field(
    record_key: &str,
    fields: &HashMap<String, Bytes>,
    name: &str,
) -> Result<Option<String>, QueueError> {
    match fields.get(name) {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => match std::str::from_utf8(raw) {
            Ok(text) => Ok(Some(text.to_string())),
            Err(_) => Err(QueueError::malformed_record(
                record_key,
                format!("field '{name}' is not valid UTF-8"),
            )),
        },
    }
}

/// Read an optional numeric field; empty and absent both mean `None`.
fn number_field<T: FromStr>(
    record_key: &str,
    fields: &HashMap<String, Bytes>,
    name: &str,
) -> Result<Option<T>, QueueError> {
    text_field(record_key, fields, name)?
        .map(|text| text.parse::<T>())
        .transpose()
        .map_err(|_| {
            QueueError::malformed_record(record_key, format!("field '{name}' is not a number"))
        })
}

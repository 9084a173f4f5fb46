//! Wire codec for reliable-queue ring entries.
//!
//! An envelope is stored as `{length}:{payload}:{timestamp}` where `length`
//! is the decimal byte count of the payload and `timestamp` is the decimal
//! unix-seconds claim instant, empty while the entry is unclaimed. The
//! length prefix makes the payload boundary explicit: decoding reads exactly
//! `length` payload bytes and then expects the delimiter, so payloads may
//! themselves contain delimiter characters and digits.

use crate::error::CodecError;
use bytes::{Bytes, BytesMut};
use chrono::{Duration, Utc};

const DELIMITER: u8 = b':';

/// One stored unit of the reliable queue: a payload plus the instant it was
/// first claimed by a consumer, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    payload: Bytes,
    claimed_at: Option<i64>,
}

impl Envelope {
    /// Envelope for a payload no consumer has claimed yet.
    pub fn unclaimed(payload: Bytes) -> Self {
        Self {
            payload,
            claimed_at: None,
        }
    }

    /// Envelope claimed at the given unix-seconds instant.
    pub fn claimed(payload: Bytes, claimed_at: i64) -> Self {
        Self {
            payload,
            claimed_at: Some(claimed_at),
        }
    }

    /// The payload carried by this envelope.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the envelope, keeping only the payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Unix-seconds instant of the first claim, `None` while unclaimed.
    pub fn claimed_at(&self) -> Option<i64> {
        self.claimed_at
    }

    /// Whether a consumer has claimed this envelope.
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }

    /// Whether the claim is older than the given visibility window.
    /// Unclaimed envelopes are never stale.
    pub fn is_stale(&self, visibility: Duration) -> bool {
        match self.claimed_at {
            Some(claimed_at) => Utc::now().timestamp() - claimed_at >= visibility.num_seconds(),
            None => false,
        }
    }

    /// Encode to the wire format.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 24);
        buf.extend_from_slice(self.payload.len().to_string().as_bytes());
        buf.extend_from_slice(&[DELIMITER]);
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&[DELIMITER]);
        if let Some(claimed_at) = self.claimed_at {
            buf.extend_from_slice(claimed_at.to_string().as_bytes());
        }
        buf.freeze()
    }

    /// Decode from the wire format.
    ///
    /// The payload is taken as exactly the declared number of bytes; the
    /// raw input must hold nothing but the three delimited fields.
    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let length_end = raw
            .iter()
            .position(|byte| *byte == DELIMITER)
            .ok_or(CodecError::MissingLength)?;
        let length_text = &raw[..length_end];
        if length_text.is_empty() || !length_text.iter().all(u8::is_ascii_digit) {
            return Err(CodecError::InvalidLength {
                text: String::from_utf8_lossy(length_text).into_owned(),
            });
        }
        let declared: usize = String::from_utf8_lossy(length_text)
            .parse()
            .map_err(|_| CodecError::InvalidLength {
                text: String::from_utf8_lossy(length_text).into_owned(),
            })?;

        let payload_start = length_end + 1;
        let payload_end = payload_start
            .checked_add(declared)
            .ok_or(CodecError::TruncatedPayload { declared })?;
        if raw.len() <= payload_end {
            return Err(CodecError::TruncatedPayload { declared });
        }
        if raw[payload_end] != DELIMITER {
            return Err(CodecError::MissingDelimiter);
        }
        let payload = Bytes::copy_from_slice(&raw[payload_start..payload_end]);

        let claimed_at = parse_stamp(&raw[payload_end + 1..])?;
        Ok(Self {
            payload,
            claimed_at,
        })
    }
}

/// Parse a claim-stamp field: empty means unclaimed, otherwise decimal
/// unix seconds.
pub(crate) fn parse_stamp(raw: &[u8]) -> Result<Option<i64>, CodecError> {
    if raw.is_empty() {
        return Ok(None);
    }
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| CodecError::InvalidTimestamp {
            text: String::from_utf8_lossy(raw).into_owned(),
        })
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;

//! Message records carried on the bus and the frames that wrap them.
//!
//! A frame is `"<topic> <json>"`. The JSON decodes to a [`MessageRecord`]
//! whose `payload.data` is itself a JSON-encoded object holding the
//! publisher's `publishedAt` timestamp in epoch nanoseconds.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::FrameError;

/// Decoded form of a frame's JSON payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,

    #[serde(default)]
    pub network_id: i64,

    #[serde(default)]
    pub nonce: i64,

    #[serde(default)]
    pub parent_message_ids: Vec<String>,

    pub payload: MessagePayload,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessagePayload {
    /// JSON-encoded blob; see [`MessageRecord::published_at`].
    pub data: String,

    #[serde(default)]
    pub index: String,
}

impl MessageRecord {
    /// Parse a record from the JSON half of a frame.
    pub fn from_json(json: &str) -> Result<Self, FrameError> {
        let record: MessageRecord =
            serde_json::from_str(json).map_err(|e| FrameError::InvalidRecord(e.to_string()))?;

        if record.id.is_empty() {
            return Err(FrameError::EmptyId);
        }

        Ok(record)
    }

    /// Extract the publish time from the nested `payload.data` blob.
    ///
    /// The field must be a finite number of nanoseconds since the epoch;
    /// integer and floating point encodings are both accepted.
    pub fn published_at(&self) -> Result<DateTime<Utc>, FrameError> {
        let data: serde_json::Map<String, JsonValue> = serde_json::from_str(&self.payload.data)
            .map_err(|e| FrameError::InvalidData {
                id: self.id.clone(),
                reason: e.to_string(),
            })?;

        let value = data
            .get("publishedAt")
            .ok_or_else(|| FrameError::MissingPublishedAt {
                id: self.id.clone(),
            })?;

        let nanos = value
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| FrameError::InvalidPublishedAt {
                id: self.id.clone(),
                value: value.to_string(),
            })?;

        Ok(timestamp_from_nanos(nanos))
    }
}

/// Convert epoch nanoseconds (as sent by publishers) into a timestamp.
///
/// Values outside the `i64` range saturate.
pub fn timestamp_from_nanos(nanos: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos as i64)
}

/// A frame that decoded all the way down to its publish time.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub topic: String,
    pub record: MessageRecord,
    pub published_at: DateTime<Utc>,
}

/// Split a raw frame on its first space and decode the payload.
pub fn decode_frame(raw: &str) -> Result<DecodedFrame, FrameError> {
    let (topic, json) = raw
        .split_once(' ')
        .ok_or_else(|| FrameError::MissingSeparator(raw.to_string()))?;

    let record = MessageRecord::from_json(json)?;
    let published_at = record.published_at()?;

    Ok(DecodedFrame {
        topic: topic.to_string(),
        record,
        published_at,
    })
}

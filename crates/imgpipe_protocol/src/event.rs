//! The Pipeline Event and its orchestrator envelope.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::defaults::{MAX_ENVELOPE_DEPTH, SUCCESS_STATUS_CODE};
use crate::error::{Result, StageError};

/// Location of the source image. Set by the caller, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(rename = "s3_bucket")]
    pub bucket: String,
    #[serde(rename = "s3_key")]
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse an ingestion request (`{s3_bucket, s3_key}`, optionally enveloped).
    pub fn from_stage_input(input: Value) -> Result<Self> {
        let object: ObjectRef = deserialize(locate(input, "s3_bucket")?)?;
        object.validate()?;
        Ok(object)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(StageError::invalid_payload("s3_bucket must not be empty"));
        }
        if self.key.trim().is_empty() {
            return Err(StageError::invalid_payload("s3_key must not be empty"));
        }
        Ok(())
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Payload accumulated across the three stages.
///
/// Field order matches the wire contract:
/// `{image_data, s3_bucket, s3_key, inferences}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Base64 encoded image bytes
    pub image_data: String,
    #[serde(flatten)]
    pub object_ref: ObjectRef,
    /// One confidence per class; empty until the inference stage runs.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub inferences: Vec<f64>,
}

impl PipelineEvent {
    /// Event as emitted by ingestion: encoded image, no inferences yet.
    pub fn new(object_ref: ObjectRef, image_data: String) -> Self {
        Self {
            image_data,
            object_ref,
            inferences: Vec::new(),
        }
    }

    pub fn with_inferences(mut self, inferences: Vec<f64>) -> Self {
        self.inferences = inferences;
        self
    }

    /// Parse a stage input into a typed event.
    ///
    /// Accepts a bare event, `{statusCode, body}`, `{data}`, and bodies that
    /// are themselves JSON strings (the gate emits its body that way).
    pub fn from_stage_input(input: Value) -> Result<Self> {
        let event: PipelineEvent = deserialize(locate(input, "image_data")?)?;
        event.object_ref.validate()?;
        Ok(event)
    }

    /// Highest confidence, or `None` when no inferences are present.
    pub fn max_confidence(&self) -> Option<f64> {
        max_confidence(&self.inferences)
    }
}

#[derive(Deserialize)]
struct Confidences {
    #[serde(default, deserialize_with = "null_as_empty")]
    inferences: Vec<f64>,
}

/// Read only the confidence vector of a stage input, under the same
/// envelopes as [`PipelineEvent::from_stage_input`].
///
/// The other event fields are not required. An absent or null `inferences`
/// reads as empty.
pub fn inferences_from_stage_input(input: Value) -> Result<Vec<f64>> {
    let confidences: Confidences = deserialize(locate(input, "inferences")?)?;
    Ok(confidences.inferences)
}

/// Highest value of a confidence vector.
pub fn max_confidence(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// First confidence that is not a finite value in [0, 1], with its index.
pub fn first_out_of_range(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && (0.0..=1.0).contains(v)))
}

/// Successful stage result in the orchestrator's `{statusCode, body}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResponse<T> {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: T,
}

impl<T> StageResponse<T> {
    pub fn ok(body: T) -> Self {
        Self {
            status_code: SUCCESS_STATUS_CODE,
            body,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<f64>>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| StageError::invalid_payload(e.to_string()))
}

/// Descend through `body`/`data` envelopes until an object holding `marker`.
///
/// An object with neither the marker nor an envelope key is returned as is so
/// deserialization can report the missing field by name.
fn locate(input: Value, marker: &str) -> Result<Value> {
    let mut current = input;
    for _ in 0..=MAX_ENVELOPE_DEPTH {
        current = match current {
            Value::String(text) => serde_json::from_str(&text).map_err(|e| {
                StageError::invalid_payload(format!("body is not a JSON document: {}", e))
            })?,
            Value::Object(mut map) => {
                if map.contains_key(marker) {
                    return Ok(Value::Object(map));
                }
                match map.remove("body").or_else(|| map.remove("data")) {
                    Some(inner) => inner,
                    None => return Ok(Value::Object(map)),
                }
            }
            other => {
                return Err(StageError::invalid_payload(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };
    }
    Err(StageError::invalid_payload(format!(
        "event is wrapped in more than {} envelopes",
        MAX_ENVELOPE_DEPTH
    )))
}

/// Short description of a JSON value's type for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

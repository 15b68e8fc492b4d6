//! Stage error taxonomy

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StageError>;

/// Every way a stage can fail.
///
/// Each variant maps to a stable taxonomy name (see [`StageError::name`]) that
/// the orchestrator sees as the error type of a failed step.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Object s3://{bucket}/{key} not found")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Object store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("image_data is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// `status` is the HTTP status the model answered with, if it answered.
    #[error("Classification endpoint failed: {message}")]
    Endpoint { message: String, status: Option<u16> },

    #[error("Malformed classification response: {message}")]
    ResponseParse { message: String },

    #[error("Event carries no inferences")]
    MissingInferences,

    #[error("Max confidence {max_confidence} does not exceed threshold {threshold}")]
    ThresholdNotMet { max_confidence: f64, threshold: f64 },

    #[error("Invalid pipeline event: {message}")]
    InvalidPayload { message: String },
}

/// How a failure should be read in logs and by retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Routine outcome of the pipeline, not a fault (low confidence).
    Business,
    /// May succeed if the orchestrator retries the step.
    Transient,
    /// Retrying with the same input will fail again.
    Permanent,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Business => "business",
            ErrorClass::Transient => "transient",
            ErrorClass::Permanent => "permanent",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StageError {
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        StageError::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn response_parse(message: impl Into<String>) -> Self {
        StageError::ResponseParse {
            message: message.into(),
        }
    }

    /// Taxonomy name reported to the orchestrator.
    pub fn name(&self) -> &'static str {
        match self {
            StageError::ObjectNotFound { .. } => "ObjectNotFound",
            StageError::StoreUnavailable { .. } => "StoreUnavailable",
            StageError::Decode(_) => "DecodeError",
            StageError::Endpoint { .. } => "EndpointError",
            StageError::ResponseParse { .. } => "ResponseParseError",
            StageError::MissingInferences => "MissingInferences",
            StageError::ThresholdNotMet { .. } => "ThresholdNotMet",
            StageError::InvalidPayload { .. } => "InvalidPayload",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            StageError::ThresholdNotMet { .. } => ErrorClass::Business,
            StageError::Endpoint {
                status: Some(status),
                ..
            } if is_rejection(*status) => ErrorClass::Permanent,
            StageError::StoreUnavailable { .. } | StageError::Endpoint { .. } => {
                ErrorClass::Transient
            }
            _ => ErrorClass::Permanent,
        }
    }

    /// Check if this error is transient (eligible for an orchestrator retry)
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Check if this failure is a business outcome rather than a system error
    pub fn is_business_outcome(&self) -> bool {
        self.class() == ErrorClass::Business
    }
}

/// 4xx means the model refused this input; 408 and 429 are worth a retry.
fn is_rejection(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

/// Failure signal handed back to the orchestrator.
///
/// Serializes as `{"errorType": ..., "errorMessage": ...}` so the orchestrator
/// routes the step to its failure path instead of its success path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    #[serde(rename = "errorType")]
    pub error_type: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    #[serde(skip)]
    pub transient: bool,
}

impl From<&StageError> for StageFailure {
    fn from(err: &StageError) -> Self {
        Self {
            error_type: err.name().to_string(),
            error_message: err.to_string(),
            transient: err.is_transient(),
        }
    }
}

impl From<StageError> for StageFailure {
    fn from(err: StageError) -> Self {
        StageFailure::from(&err)
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error_message)
    }
}

impl std::error::Error for StageFailure {}

//! Confidence gate: pass the event only when the best class is confident
//! enough.
//!
//! `max(inferences) > threshold` passes; a tie fails. Low confidence is a
//! normal [`GateOutcome`], not an error; the orchestrator adapter turns it
//! into the `ThresholdNotMet` failure.

use imgpipe_protocol::config::{validate_threshold, ConfigError};
use imgpipe_protocol::event::{first_out_of_range, max_confidence};
use imgpipe_protocol::{PipelineConfig, Result, StageError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOutcome {
    Passed { max_confidence: f64 },
    BelowThreshold { max_confidence: f64, threshold: f64 },
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, GateOutcome::Passed { .. })
    }

    pub fn max_confidence(&self) -> f64 {
        match *self {
            GateOutcome::Passed { max_confidence } => max_confidence,
            GateOutcome::BelowThreshold { max_confidence, .. } => max_confidence,
        }
    }

    /// Turn a rejection into the named `ThresholdNotMet` failure.
    pub fn into_result(self) -> Result<f64> {
        match self {
            GateOutcome::Passed { max_confidence } => Ok(max_confidence),
            GateOutcome::BelowThreshold {
                max_confidence,
                threshold,
            } => Err(StageError::ThresholdNotMet {
                max_confidence,
                threshold,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    threshold: f64,
}

impl ConfidenceGate {
    pub fn new(threshold: f64) -> std::result::Result<Self, ConfigError> {
        validate_threshold(threshold)?;
        Ok(Self { threshold })
    }

    pub fn from_config(config: &PipelineConfig) -> std::result::Result<Self, ConfigError> {
        Self::new(config.threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decide on a raw confidence vector.
    ///
    /// Empty input is `MissingInferences`, never a threshold failure.
    pub fn evaluate_confidences(&self, inferences: &[f64]) -> Result<GateOutcome> {
        if let Some((idx, value)) = first_out_of_range(inferences) {
            return Err(StageError::invalid_payload(format!(
                "inferences[{}] = {} is outside [0, 1]",
                idx, value
            )));
        }

        let max_confidence = max_confidence(inferences).ok_or(StageError::MissingInferences)?;

        if max_confidence > self.threshold {
            Ok(GateOutcome::Passed { max_confidence })
        } else {
            Ok(GateOutcome::BelowThreshold {
                max_confidence,
                threshold: self.threshold,
            })
        }
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self {
            threshold: imgpipe_protocol::defaults::DEFAULT_THRESHOLD,
        }
    }
}

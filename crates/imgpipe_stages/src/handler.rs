//! Orchestrator adapter.
//!
//! Each handler takes the raw JSON request the orchestrator sends, runs one
//! stage and returns either a `{statusCode, body}` document or a
//! [`StageFailure`] for the orchestrator's failure path. This is the only
//! layer that knows about envelopes and failure signalling.

use std::fmt;

use imgpipe_protocol::event::inferences_from_stage_input;
use imgpipe_protocol::{
    ErrorClass, ObjectRef, PipelineEvent, Result, StageError, StageFailure, StageResponse,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, info_span, warn};

use crate::endpoint::ClassificationEndpoint;
use crate::gate::ConfidenceGate;
use crate::inference::InferenceStage;
use crate::ingest::IngestStage;
use crate::store::ObjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Inference,
    Gate,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Inference => "inference",
            Stage::Gate => "gate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{s3_bucket, s3_key}` in, ingestion envelope out.
pub fn handle_ingest<S: ObjectStore>(
    stage: &IngestStage<S>,
    request: Value,
) -> std::result::Result<Value, StageFailure> {
    run(Stage::Ingest, || {
        let object = ObjectRef::from_stage_input(request)?;
        respond(stage.run(object)?)
    })
}

/// Ingestion output in, same event with `inferences` populated out.
pub fn handle_inference<E: ClassificationEndpoint>(
    stage: &InferenceStage<E>,
    request: Value,
) -> std::result::Result<Value, StageFailure> {
    run(Stage::Inference, || {
        let event = PipelineEvent::from_stage_input(request)?;
        respond(stage.run(event)?)
    })
}

/// Inference output in; on success the full request comes back serialized as
/// the body, unchanged. Only `inferences` is read.
pub fn handle_gate(gate: &ConfidenceGate, request: Value) -> std::result::Result<Value, StageFailure> {
    run(Stage::Gate, || {
        let body = serde_json::to_string(&request)
            .map_err(|e| StageError::invalid_payload(format!("event is not serializable: {}", e)))?;

        let inferences = inferences_from_stage_input(request)?;
        let max_confidence = gate.evaluate_confidences(&inferences)?.into_result()?;

        info!(
            max_confidence,
            threshold = gate.threshold(),
            "confidence threshold met"
        );
        respond(body)
    })
}

fn run<F>(stage: Stage, f: F) -> std::result::Result<Value, StageFailure>
where
    F: FnOnce() -> Result<Value>,
{
    let _span = info_span!("stage", stage = stage.as_str()).entered();
    f().map_err(|err| {
        log_failure(stage, &err);
        StageFailure::from(&err)
    })
}

fn respond<T: Serialize>(body: T) -> Result<Value> {
    serde_json::to_value(StageResponse::ok(body))
        .map_err(|e| StageError::invalid_payload(format!("response is not serializable: {}", e)))
}

/// Business outcomes stay at info so alerting on warn/error only sees faults.
fn log_failure(stage: Stage, err: &StageError) {
    let class = err.class();
    match class {
        ErrorClass::Business => info!(
            stage = %stage,
            error.name = err.name(),
            error.class = %class,
            "{}",
            err
        ),
        ErrorClass::Transient => warn!(
            stage = %stage,
            error.name = err.name(),
            error.class = %class,
            "{}",
            err
        ),
        ErrorClass::Permanent => error!(
            stage = %stage,
            error.name = err.name(),
            error.class = %class,
            "{}",
            err
        ),
    }
}

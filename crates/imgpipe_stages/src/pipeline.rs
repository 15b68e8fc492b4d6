//! Local sequential driver.
//!
//! Chains ingest -> inference -> gate the way the orchestrator does: each
//! stage receives the previous stage's full response document. Stops at the
//! first failure and never retries.

use imgpipe_protocol::config::ConfigError;
use imgpipe_protocol::{PipelineConfig, StageFailure};
use serde_json::Value;
use tracing::debug;

use crate::endpoint::ClassificationEndpoint;
use crate::gate::ConfidenceGate;
use crate::handler::{handle_gate, handle_inference, handle_ingest, Stage};
use crate::inference::InferenceStage;
use crate::ingest::IngestStage;
use crate::store::ObjectStore;

pub struct Pipeline<S, E> {
    ingest: IngestStage<S>,
    inference: InferenceStage<E>,
    gate: ConfidenceGate,
}

impl<S: ObjectStore, E: ClassificationEndpoint> Pipeline<S, E> {
    pub fn new(store: S, endpoint: E, config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ingest: IngestStage::new(store),
            inference: InferenceStage::new(endpoint, &config.endpoint),
            gate: ConfidenceGate::from_config(config)?,
        })
    }

    pub fn ingest(&self) -> &IngestStage<S> {
        &self.ingest
    }

    pub fn inference(&self) -> &InferenceStage<E> {
        &self.inference
    }

    pub fn gate(&self) -> &ConfidenceGate {
        &self.gate
    }

    /// Run one stage on a raw request document.
    pub fn run_stage(&self, stage: Stage, request: Value) -> Result<Value, StageFailure> {
        match stage {
            Stage::Ingest => handle_ingest(&self.ingest, request),
            Stage::Inference => handle_inference(&self.inference, request),
            Stage::Gate => handle_gate(&self.gate, request),
        }
    }

    /// Run all three stages on an ingestion request.
    pub fn run(&self, request: Value) -> Result<Value, StageFailure> {
        let mut document = request;
        for stage in [Stage::Ingest, Stage::Inference, Stage::Gate] {
            document = self.run_stage(stage, document)?;
            debug!(stage = %stage, "stage completed");
        }
        Ok(document)
    }
}

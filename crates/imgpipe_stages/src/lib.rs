//! imgpipe stages
//!
//! Three synchronous, stateless stages over the Pipeline Event:
//! - **Ingest**: fetch an object once and base64 encode it
//! - **Inference**: decode, classify through the configured endpoint, attach confidences
//! - **Gate**: pass only when the best confidence strictly exceeds the threshold
//!
//! [`handler`] adapts the stages to the orchestrator's JSON contract and
//! [`pipeline::Pipeline`] chains them locally.

pub mod endpoint;
pub mod gate;
pub mod handler;
pub mod inference;
pub mod ingest;
pub mod pipeline;
pub mod store;

pub use endpoint::{ClassificationEndpoint, EndpointError, HttpEndpoint};
pub use gate::{ConfidenceGate, GateOutcome};
pub use handler::{handle_gate, handle_inference, handle_ingest, Stage};
pub use inference::{parse_inferences, InferenceStage};
pub use ingest::IngestStage;
pub use pipeline::Pipeline;
pub use store::{LocalObjectStore, MemoryObjectStore, ObjectStore, StoreError};

#[cfg(feature = "s3")]
pub use store::S3ObjectStore;

#[cfg(feature = "sagemaker")]
pub use endpoint::SageMakerEndpoint;

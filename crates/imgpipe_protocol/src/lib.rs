//! Pipeline Event payload shared by the imgpipe stages.
//!
//! The event travels through three stages (ingest, inference, gate) inside an
//! orchestrator envelope. This crate owns the wire contract:
//!
//! ```text
//! Ingestion out:  {statusCode, body: {image_data, s3_bucket, s3_key, inferences: []}}
//! Inference out:  {statusCode, body: {image_data, s3_bucket, s3_key, inferences: [...]}}
//! Gate out:       {statusCode, body: "<serialized full event>"}
//! ```
//!
//! Stages never touch untyped JSON directly; they go through
//! [`PipelineEvent::from_stage_input`] and [`ObjectRef::from_stage_input`],
//! which validate the payload at the stage boundary.

pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod event;

pub use config::{ConfigError, EndpointConfig, PipelineConfig};
pub use error::{ErrorClass, Result, StageError, StageFailure};
pub use event::{ObjectRef, PipelineEvent, StageResponse};

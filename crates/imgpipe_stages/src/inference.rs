//! Inference stage: decode the image, classify it, attach the confidences.
//!
//! The endpoint response must be a non-empty JSON array of numbers in
//! [0, 1]. Anything else is a `ResponseParseError`; a malformed response is
//! never turned into an empty result.

use imgpipe_protocol::codec;
use imgpipe_protocol::event::{first_out_of_range, json_kind, max_confidence};
use imgpipe_protocol::{EndpointConfig, PipelineEvent, Result, StageError};
use serde_json::Value;
use tracing::{debug, info};

use crate::endpoint::ClassificationEndpoint;

pub struct InferenceStage<E> {
    endpoint: E,
    content_type: String,
}

impl<E: ClassificationEndpoint> InferenceStage<E> {
    pub fn new(endpoint: E, config: &EndpointConfig) -> Self {
        Self {
            endpoint,
            content_type: config.content_type.clone(),
        }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Classify the event's image and return the event with `inferences` set.
    ///
    /// `image_data` and the object reference are carried over untouched.
    pub fn run(&self, event: PipelineEvent) -> Result<PipelineEvent> {
        let image = codec::decode(&event.image_data)?;
        debug!(
            object = %event.object_ref,
            endpoint = self.endpoint.name(),
            bytes = image.len(),
            "decoded image"
        );

        let response = self.endpoint.invoke(&self.content_type, image)?;
        let inferences = parse_inferences(&response)?;

        info!(
            object = %event.object_ref,
            endpoint = self.endpoint.name(),
            classes = inferences.len(),
            max_confidence = max_confidence(&inferences).unwrap_or_default(),
            "classified image"
        );

        Ok(event.with_inferences(inferences))
    }
}

/// Parse an endpoint response body into a confidence vector.
pub fn parse_inferences(body: &[u8]) -> Result<Vec<f64>> {
    let text = std::str::from_utf8(body)
        .map_err(|e| StageError::response_parse(format!("response is not UTF-8: {}", e)))?;

    let value: Value = serde_json::from_str(text)
        .map_err(|e| StageError::response_parse(format!("response is not JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(StageError::response_parse(format!(
                "expected a JSON array of confidences, got {}",
                json_kind(&other)
            )))
        }
    };

    if items.is_empty() {
        return Err(StageError::response_parse("response contains no confidences"));
    }

    let inferences = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            item.as_f64().ok_or_else(|| {
                StageError::response_parse(format!(
                    "element {} is {}, expected a number",
                    idx,
                    json_kind(item)
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    if let Some((idx, value)) = first_out_of_range(&inferences) {
        return Err(StageError::response_parse(format!(
            "element {} = {} is outside [0, 1]",
            idx, value
        )));
    }

    Ok(inferences)
}

//! Stage configuration, passed in at construction.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::defaults::{
    DEFAULT_CONTENT_TYPE, DEFAULT_ENDPOINT_NAME, DEFAULT_ENDPOINT_URL, DEFAULT_THRESHOLD,
};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Threshold must be a finite value in [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Endpoint URL {0} must use http or https")]
    UnsupportedScheme(String),

    #[error("Invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Content type must not be empty")]
    EmptyContentType,
}

/// Identity of the classification endpoint. Never taken from the request.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Deployed endpoint name
    pub name: String,
    /// Invocation URL
    pub url: Url,
    /// Content type sent with the image bytes
    pub content_type: String,
    /// Optional request timeout; `None` leaves timeouts to the orchestrator
    pub timeout: Option<Duration>,
}

impl EndpointConfig {
    /// Parse an endpoint URL, keeping the error readable for CLI users.
    pub fn parse_url(raw: &str) -> Result<Url, ConfigError> {
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_ENDPOINT_NAME.to_string(),
            url: Url::parse(DEFAULT_ENDPOINT_URL).expect("default endpoint URL is valid"),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            timeout: None,
        }
    }
}

/// Configuration shared by the inference and gate stages.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub endpoint: EndpointConfig,
    /// `max(inferences)` must be strictly greater than this to pass.
    pub threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.threshold)?;
        if self.endpoint.content_type.trim().is_empty() {
            return Err(ConfigError::EmptyContentType);
        }
        match self.endpoint.url.scheme() {
            "http" | "https" => Ok(()),
            _ => Err(ConfigError::UnsupportedScheme(self.endpoint.url.to_string())),
        }
    }
}

pub fn validate_threshold(threshold: f64) -> Result<(), ConfigError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold(threshold))
    }
}

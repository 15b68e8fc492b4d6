//! Classification endpoint seam used by the inference stage.
//!
//! - [`HttpEndpoint`]: POST to an invocation URL
//! - `SageMakerEndpoint`: SageMaker runtime `InvokeEndpoint` by endpoint name (feature `sagemaker`)

use imgpipe_protocol::{EndpointConfig, StageError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use url::Url;

/// Longest response snippet kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
}

impl EndpointError {
    /// HTTP status the model answered with, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            EndpointError::Status { status, .. } => Some(*status),
            EndpointError::Timeout { .. } | EndpointError::Transport { .. } => None,
        }
    }
}

impl From<EndpointError> for StageError {
    fn from(err: EndpointError) -> Self {
        StageError::Endpoint {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// A hosted model that turns image bytes into a response document.
pub trait ClassificationEndpoint: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Invoke the model once with `body` as the request payload.
    fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>, EndpointError>;
}

impl<E: ClassificationEndpoint + ?Sized> ClassificationEndpoint for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>, EndpointError> {
        (**self).invoke(content_type, body)
    }
}

impl<E: ClassificationEndpoint + ?Sized> ClassificationEndpoint for &E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>, EndpointError> {
        (**self).invoke(content_type, body)
    }
}

/// Endpoint reached over plain HTTP(S) with a blocking POST.
pub struct HttpEndpoint {
    name: String,
    url: Url,
    client: reqwest::blocking::Client,
}

impl HttpEndpoint {
    pub fn new(config: &EndpointConfig) -> Result<Self, EndpointError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EndpointError::Transport {
                endpoint: config.name.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            name: config.name.clone(),
            url: config.url.clone(),
            client,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn transport_error(&self, err: reqwest::Error) -> EndpointError {
        if err.is_timeout() {
            EndpointError::Timeout {
                endpoint: self.name.clone(),
            }
        } else {
            EndpointError::Transport {
                endpoint: self.name.clone(),
                message: err.to_string(),
            }
        }
    }
}

impl ClassificationEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>, EndpointError> {
        tracing::debug!(endpoint = %self.name, url = %self.url, bytes = body.len(), "invoking endpoint");

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(EndpointError::Status {
                endpoint: self.name.clone(),
                status: status.as_u16(),
                body: truncate(&text),
            });
        }

        let bytes = response.bytes().map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_ERROR_BODY_CHARS {
        let head: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}... (truncated)", head)
    } else {
        text.to_string()
    }
}

#[cfg(feature = "sagemaker")]
pub use sagemaker::SageMakerEndpoint;

#[cfg(feature = "sagemaker")]
mod sagemaker {
    use super::{truncate, ClassificationEndpoint, EndpointError};
    use aws_config::timeout::TimeoutConfig;
    use aws_config::BehaviorVersion;
    use aws_sdk_sagemakerruntime::error::{ProvideErrorMetadata, SdkError};
    use aws_sdk_sagemakerruntime::operation::invoke_endpoint::InvokeEndpointError;
    use aws_sdk_sagemakerruntime::primitives::Blob;
    use aws_sdk_sagemakerruntime::Client as SageMakerClient;
    use imgpipe_protocol::EndpointConfig;

    /// Hosted SageMaker model, invoked by endpoint name.
    ///
    /// Owns a current-thread runtime and blocks on each call, like the S3
    /// object store.
    pub struct SageMakerEndpoint {
        name: String,
        client: SageMakerClient,
        runtime: tokio::runtime::Runtime,
    }

    impl SageMakerEndpoint {
        /// Build a client from the standard AWS environment. `region`
        /// overrides the environment; `config.timeout` bounds each call.
        pub fn from_env(config: &EndpointConfig, region: Option<String>) -> Result<Self, EndpointError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| EndpointError::Transport {
                    endpoint: config.name.clone(),
                    message: format!("failed to start runtime: {}", e),
                })?;

            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(aws_config::Region::new(region));
            }
            if let Some(timeout) = config.timeout {
                loader = loader.timeout_config(
                    TimeoutConfig::builder().operation_timeout(timeout).build(),
                );
            }
            let sdk_config = runtime.block_on(loader.load());

            Ok(Self {
                name: config.name.clone(),
                client: SageMakerClient::new(&sdk_config),
                runtime,
            })
        }

        fn invoke_error(&self, err: SdkError<InvokeEndpointError>) -> EndpointError {
            match err {
                SdkError::TimeoutError(_) => EndpointError::Timeout {
                    endpoint: self.name.clone(),
                },
                SdkError::ServiceError(service) => {
                    let err = service.into_err();
                    let model_status = match &err {
                        InvokeEndpointError::ModelError(model) => model.original_status_code(),
                        _ => None,
                    };
                    service_error(
                        &self.name,
                        err.code(),
                        err.message().unwrap_or_default(),
                        model_status,
                    )
                }
                other => EndpointError::Transport {
                    endpoint: self.name.clone(),
                    message: other.to_string(),
                },
            }
        }
    }

    impl ClassificationEndpoint for SageMakerEndpoint {
        fn name(&self) -> &str {
            &self.name
        }

        fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>, EndpointError> {
            tracing::debug!(endpoint = %self.name, bytes = body.len(), "invoking SageMaker endpoint");

            let output = self
                .runtime
                .block_on(
                    self.client
                        .invoke_endpoint()
                        .endpoint_name(&self.name)
                        .content_type(content_type)
                        .accept("application/json")
                        .body(Blob::new(body))
                        .send(),
                )
                .map_err(|e| self.invoke_error(e))?;

            Ok(output.body.map(Blob::into_inner).unwrap_or_default())
        }
    }

    /// Map an `InvokeEndpoint` service error code onto an HTTP-style status.
    ///
    /// `ModelError` carries the status the model container answered with;
    /// without one it counts as a server fault.
    pub(super) fn service_error(
        endpoint: &str,
        code: Option<&str>,
        message: &str,
        model_status: Option<i32>,
    ) -> EndpointError {
        let status = match code {
            Some("ModelError") => model_status
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(500),
            Some("ValidationError") => 400,
            Some("ThrottlingException") => 429,
            Some("ModelNotReadyException") | Some("ServiceUnavailable") => 503,
            Some("InternalFailure") | Some("InternalDependencyException") => 500,
            _ => {
                return EndpointError::Transport {
                    endpoint: endpoint.to_string(),
                    message: format!("{}: {}", code.unwrap_or("UnknownError"), message),
                }
            }
        };
        EndpointError::Status {
            endpoint: endpoint.to_string(),
            status,
            body: truncate(&format!("{}: {}", code.unwrap_or_default(), message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_bodies() {
        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let out = truncate(&long);
        assert!(out.ends_with("... (truncated)"));
        assert_eq!(out.chars().filter(|c| *c == 'x').count(), MAX_ERROR_BODY_CHARS);
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn endpoint_errors_map_to_taxonomy() {
        let err: StageError = EndpointError::Status {
            endpoint: "model".into(),
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert_eq!(err.name(), "EndpointError");
        assert!(err.to_string().contains("503"));
        assert!(err.is_transient());

        let rejected: StageError = EndpointError::Status {
            endpoint: "model".into(),
            status: 415,
            body: "unsupported image".into(),
        }
        .into();
        assert!(!rejected.is_transient());

        let timeout: StageError = EndpointError::Timeout {
            endpoint: "model".into(),
        }
        .into();
        assert!(timeout.is_transient());
    }

    #[cfg(feature = "sagemaker")]
    #[test]
    fn sagemaker_errors_map_onto_status() {
        use super::sagemaker::service_error;

        let classify = |code: &str, model_status| -> StageError {
            service_error("image-classification", Some(code), "boom", model_status).into()
        };

        assert!(!classify("ValidationError", None).is_transient());
        assert!(!classify("ModelError", Some(415)).is_transient());
        assert!(classify("ModelError", Some(503)).is_transient());
        assert!(classify("ModelError", None).is_transient());
        assert!(classify("ThrottlingException", None).is_transient());
        assert!(classify("ModelNotReadyException", None).is_transient());
        assert!(classify("InternalFailure", None).is_transient());

        let err = service_error("image-classification", Some("ValidationError"), "bad body", None);
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("image-classification"));
        assert!(err.to_string().contains("bad body"));

        let unknown = service_error("image-classification", None, "reset", None);
        assert!(matches!(unknown, EndpointError::Transport { .. }));
    }

    #[test]
    fn builds_from_default_config() {
        let endpoint = HttpEndpoint::new(&EndpointConfig::default()).unwrap();
        assert_eq!(endpoint.url().path(), "/invocations");
        assert_eq!(endpoint.name(), imgpipe_protocol::defaults::DEFAULT_ENDPOINT_NAME);
    }
}

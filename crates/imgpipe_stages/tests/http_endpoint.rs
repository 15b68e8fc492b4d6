//! HttpEndpoint against a mock inference server.
//!
//! The endpoint client is blocking, so every call runs on tokio's blocking
//! pool while the mock server keeps serving on the async runtime.

use std::time::Duration;

use imgpipe_protocol::codec;
use imgpipe_protocol::{EndpointConfig, ObjectRef, PipelineEvent, StageError};
use imgpipe_stages::{ClassificationEndpoint, EndpointError, HttpEndpoint, InferenceStage};
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EndpointConfig {
    EndpointConfig {
        url: EndpointConfig::parse_url(&format!("{}/invocations", server.uri())).unwrap(),
        ..EndpointConfig::default()
    }
}

async fn invoke_blocking(
    config: EndpointConfig,
    body: Vec<u8>,
) -> Result<Vec<u8>, EndpointError> {
    tokio::task::spawn_blocking(move || {
        let endpoint = HttpEndpoint::new(&config)?;
        endpoint.invoke(&config.content_type, body)
    })
    .await
    .expect("blocking task panicked")
}

#[tokio::test(flavor = "multi_thread")]
async fn posts_raw_bytes_with_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/invocations"))
        .and(header("content-type", "application/x-image"))
        .and(header("accept", "application/json"))
        .and(body_bytes(b"raw-image".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_string("[0.1, 0.9]"))
        .expect(1)
        .mount(&server)
        .await;

    let response = invoke_blocking(config_for(&server), b"raw-image".to_vec())
        .await
        .unwrap();
    assert_eq!(response, b"[0.1, 0.9]");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_maps_to_endpoint_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model is loading"))
        .expect(1)
        .mount(&server)
        .await;

    let err = invoke_blocking(config_for(&server), b"img".to_vec())
        .await
        .unwrap_err();
    match &err {
        EndpointError::Status { status, body, .. } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "model is loading");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let stage_err: StageError = err.into();
    assert_eq!(stage_err.name(), "EndpointError");
    assert!(stage_err.is_transient());
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_image_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(415).set_body_string("unsupported content type"))
        .expect(1)
        .mount(&server)
        .await;

    let err = invoke_blocking(config_for(&server), b"img".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(415));

    let stage_err: StageError = err.into();
    assert_eq!(stage_err.name(), "EndpointError");
    assert!(!stage_err.is_transient());
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_timeout_is_enforced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[0.99]")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = EndpointConfig {
        timeout: Some(Duration::from_millis(200)),
        ..config_for(&server)
    };
    let err = invoke_blocking(config, b"img".to_vec()).await.unwrap_err();
    assert!(matches!(err, EndpointError::Timeout { .. }), "{err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn inference_stage_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/invocations"))
        .and(body_bytes(b"\x89PNG".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_string("[0.03, 0.97]"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let event = PipelineEvent::new(ObjectRef::new("b", "k"), codec::encode(b"\x89PNG"));

    let out = tokio::task::spawn_blocking(move || {
        let stage = InferenceStage::new(HttpEndpoint::new(&config).unwrap(), &config);
        stage.run(event)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(out.inferences, vec![0.03, 0.97]);
    assert_eq!(out.object_ref, ObjectRef::new("b", "k"));
}

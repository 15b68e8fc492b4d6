//! Canonical default values shared by the stages and the CLI.

/// Confidence a classification must strictly exceed to pass the gate.
pub const DEFAULT_THRESHOLD: f64 = 0.93;

/// Name of the deployed classification endpoint (used for logging).
pub const DEFAULT_ENDPOINT_NAME: &str = "image-classification-2024-07-07-12-53-17-472";

/// Inference container contract: POST raw bytes to /invocations on port 8080.
pub const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:8080/invocations";

/// Content type sent with the image bytes.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-image";

/// Status code of every successful stage response.
pub const SUCCESS_STATUS_CODE: u16 = 200;

/// How many `body`/`data` envelopes a stage input may be wrapped in.
pub const MAX_ENVELOPE_DEPTH: usize = 4;

pub const ENV_STORE_ROOT: &str = "IMGPIPE_STORE_ROOT";
pub const ENV_ENDPOINT_URL: &str = "IMGPIPE_ENDPOINT_URL";
pub const ENV_ENDPOINT_NAME: &str = "IMGPIPE_ENDPOINT_NAME";
pub const ENV_CONTENT_TYPE: &str = "IMGPIPE_CONTENT_TYPE";
pub const ENV_THRESHOLD: &str = "IMGPIPE_THRESHOLD";
pub const ENV_ENDPOINT_TIMEOUT_SECS: &str = "IMGPIPE_ENDPOINT_TIMEOUT_SECS";

//! Command line arguments and their mapping onto stage configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use imgpipe_protocol::defaults::{
    DEFAULT_CONTENT_TYPE, DEFAULT_ENDPOINT_NAME, DEFAULT_ENDPOINT_URL, DEFAULT_THRESHOLD,
    ENV_CONTENT_TYPE, ENV_ENDPOINT_NAME, ENV_ENDPOINT_TIMEOUT_SECS, ENV_ENDPOINT_URL,
    ENV_STORE_ROOT, ENV_THRESHOLD,
};
use imgpipe_protocol::{EndpointConfig, PipelineConfig};
use imgpipe_stages::{ClassificationEndpoint, HttpEndpoint, LocalObjectStore, ObjectStore, Stage};

#[derive(Parser, Debug)]
#[command(name = "imgpipe", about = "Image classification pipeline with a confidence gate")]
pub struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch an object and emit it base64 encoded (request: {s3_bucket, s3_key})
    Ingest(EventArgs),

    /// Classify the image of an ingestion result
    Infer(EventArgs),

    /// Pass an inference result only if its best confidence beats the threshold
    Gate(EventArgs),

    /// Run ingest, infer and gate in sequence on one request
    Run(EventArgs),
}

impl Commands {
    pub fn event_args(&self) -> &EventArgs {
        match self {
            Commands::Ingest(args)
            | Commands::Infer(args)
            | Commands::Gate(args)
            | Commands::Run(args) => args,
        }
    }

    /// The single stage to run, or `None` for the full pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Commands::Ingest(_) => Some(Stage::Ingest),
            Commands::Infer(_) => Some(Stage::Inference),
            Commands::Gate(_) => Some(Stage::Gate),
            Commands::Run(_) => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct EventArgs {
    /// Request JSON file ("-" or omitted reads stdin)
    #[arg(short = 'e', long)]
    pub event: Option<PathBuf>,
}

impl EventArgs {
    pub fn read_request(&self) -> Result<serde_json::Value> {
        let text = match self.event.as_deref() {
            Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read event file {}", path.display()))?,
            _ => std::io::read_to_string(std::io::stdin()).context("Failed to read event from stdin")?,
        };
        serde_json::from_str(&text).context("Event is not valid JSON")
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Directory holding one sub-directory per bucket
    #[arg(long, global = true, env = ENV_STORE_ROOT, default_value = ".")]
    pub store_root: PathBuf,

    /// Fetch objects from Amazon S3 instead of --store-root (needs the `s3` feature)
    #[arg(long, global = true)]
    pub s3: bool,

    /// Invoke the SageMaker endpoint named by --endpoint-name instead of
    /// POSTing to --endpoint-url (needs the `sagemaker` feature)
    #[arg(long, global = true)]
    pub sagemaker: bool,

    /// AWS region for --s3 and --sagemaker (defaults to the AWS environment)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Classification endpoint invocation URL
    #[arg(long, global = true, env = ENV_ENDPOINT_URL, default_value = DEFAULT_ENDPOINT_URL)]
    pub endpoint_url: String,

    /// Classification endpoint name (the SageMaker endpoint with --sagemaker)
    #[arg(long, global = true, env = ENV_ENDPOINT_NAME, default_value = DEFAULT_ENDPOINT_NAME)]
    pub endpoint_name: String,

    /// Content type sent with the image bytes
    #[arg(long, global = true, env = ENV_CONTENT_TYPE, default_value = DEFAULT_CONTENT_TYPE)]
    pub content_type: String,

    /// Confidence the best class must strictly exceed
    #[arg(long, global = true, env = ENV_THRESHOLD, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,

    /// Endpoint request timeout in seconds (no timeout when omitted)
    #[arg(long, global = true, env = ENV_ENDPOINT_TIMEOUT_SECS)]
    pub endpoint_timeout_secs: Option<u64>,
}

impl ConfigArgs {
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let endpoint = EndpointConfig {
            name: self.endpoint_name.clone(),
            url: EndpointConfig::parse_url(&self.endpoint_url)?,
            content_type: self.content_type.clone(),
            timeout: self.endpoint_timeout_secs.map(Duration::from_secs),
        };
        let config = PipelineConfig::default()
            .with_endpoint(endpoint)
            .with_threshold(self.threshold);
        config.validate()?;
        Ok(config)
    }

    pub fn object_store(&self) -> Result<Box<dyn ObjectStore>> {
        if self.s3 {
            return s3_store(self.region.clone());
        }
        Ok(Box::new(LocalObjectStore::new(self.store_root.clone())))
    }

    pub fn endpoint(&self, config: &EndpointConfig) -> Result<Box<dyn ClassificationEndpoint>> {
        if self.sagemaker {
            return sagemaker_endpoint(config, self.region.clone());
        }
        let endpoint = HttpEndpoint::new(config).context("Failed to build HTTP endpoint client")?;
        Ok(Box::new(endpoint))
    }
}

#[cfg(feature = "s3")]
fn s3_store(region: Option<String>) -> Result<Box<dyn ObjectStore>> {
    let store = imgpipe_stages::S3ObjectStore::from_env(region)
        .context("Failed to initialize S3 client")?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "s3"))]
fn s3_store(_region: Option<String>) -> Result<Box<dyn ObjectStore>> {
    anyhow::bail!("--s3 requires imgpipe to be built with the `s3` feature")
}

#[cfg(feature = "sagemaker")]
fn sagemaker_endpoint(
    config: &EndpointConfig,
    region: Option<String>,
) -> Result<Box<dyn ClassificationEndpoint>> {
    let endpoint = imgpipe_stages::SageMakerEndpoint::from_env(config, region)
        .context("Failed to initialize SageMaker runtime client")?;
    Ok(Box::new(endpoint))
}

#[cfg(not(feature = "sagemaker"))]
fn sagemaker_endpoint(
    _config: &EndpointConfig,
    _region: Option<String>,
) -> Result<Box<dyn ClassificationEndpoint>> {
    anyhow::bail!("--sagemaker requires imgpipe to be built with the `sagemaker` feature")
}

//! imgpipe: run the pipeline stages from the command line
//!
//! Usage:
//!     imgpipe ingest --store-root ./data < request.json > ingested.json
//!     imgpipe infer --endpoint-url http://127.0.0.1:8080/invocations -e ingested.json > classified.json
//!     imgpipe infer --sagemaker --endpoint-name my-endpoint -e ingested.json
//!     imgpipe gate -e classified.json
//!     imgpipe run -e request.json
//!
//! The stage result (or the failure document) is written to stdout. Exit
//! codes: 0 success, 1 permanent failure, 2 transient failure.

mod cli;

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use imgpipe_logging::{init_logging, LogConfig};
use imgpipe_protocol::StageFailure;
use imgpipe_stages::Pipeline;
use serde_json::Value;
use tracing::{error, info};

const EXIT_PERMANENT: u8 = 1;
const EXIT_TRANSIENT: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "imgpipe",
        verbose: cli.verbose,
        json: cli.log_json,
    }) {
        eprintln!("Warning: {:#}", err);
    }

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::from(EXIT_PERMANENT)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.config.pipeline_config()?;
    let request = cli.command.event_args().read_request()?;

    let store = cli.config.object_store()?;
    let endpoint = cli.config.endpoint(&config.endpoint)?;
    let pipeline = Pipeline::new(store, endpoint, &config)?;

    info!(
        endpoint = %config.endpoint.name,
        threshold = config.threshold,
        "starting imgpipe"
    );

    let result = match cli.command.stage() {
        Some(stage) => pipeline.run_stage(stage, request),
        None => pipeline.run(request),
    };
    emit(result)
}

fn emit(result: std::result::Result<Value, StageFailure>) -> Result<ExitCode> {
    let mut stdout = std::io::stdout().lock();
    let code = match result {
        Ok(document) => {
            serde_json::to_writer(&mut stdout, &document).context("Failed to write result")?;
            ExitCode::SUCCESS
        }
        Err(failure) => {
            serde_json::to_writer(&mut stdout, &failure).context("Failed to write failure")?;
            ExitCode::from(exit_code(&failure))
        }
    };
    writeln!(stdout).context("Failed to write result")?;
    Ok(code)
}

/// Exit code convention: 1 = permanent (no retry), 2 = transient (retry eligible).
fn exit_code(failure: &StageFailure) -> u8 {
    if failure.transient {
        EXIT_TRANSIENT
    } else {
        EXIT_PERMANENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgpipe_protocol::StageError;

    #[test]
    fn transient_failures_exit_with_two() {
        let failure = StageFailure::from(StageError::Endpoint {
            message: "timed out".into(),
            status: None,
        });
        assert_eq!(exit_code(&failure), EXIT_TRANSIENT);
    }

    #[test]
    fn rejected_images_exit_with_one() {
        let failure = StageFailure::from(StageError::Endpoint {
            message: "unsupported media type".into(),
            status: Some(415),
        });
        assert_eq!(exit_code(&failure), EXIT_PERMANENT);
    }

    #[test]
    fn business_and_permanent_failures_exit_with_one() {
        let threshold = StageFailure::from(StageError::ThresholdNotMet {
            max_confidence: 0.5,
            threshold: 0.93,
        });
        assert_eq!(exit_code(&threshold), EXIT_PERMANENT);

        let decode = StageFailure::from(StageError::Decode(
            imgpipe_protocol::codec::decode("@@@@").unwrap_err(),
        ));
        assert_eq!(exit_code(&decode), EXIT_PERMANENT);
    }
}

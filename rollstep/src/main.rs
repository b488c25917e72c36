//! Rollstep - Entry Point
//!
//! Pipeline step rolling a new image onto a Kubernetes deployment.
//! Assumes kubectl is available and that one run owns its container.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use rollstep::config::options::StepOptions;
use rollstep::config::step::StepConfig;
use rollstep::deploy::executor::{K8sImageRollingUpdate, RunOutcome};
use rollstep::errors::StepError;
use rollstep::filesys::file::File;
use rollstep::logs::{init_logging, LogLevel, LogOptions};
use rollstep::models::version::ApplicationVersion;
use rollstep::utils::version_info;

use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    // Initialize logging
    let log_level = match cli_args.get("log-level").map(|l| l.parse::<LogLevel>()) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
        None => LogLevel::Info,
    };
    let log_options = LogOptions {
        log_level,
        json_format: cli_args.contains_key("json-logs"),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(&cli_args).await {
        Ok(RunOutcome::Skipped) => {
            info!("Rolling update skipped");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Applied { image }) => {
            info!("Rolling update to {} done", image);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Rolling update failed ({}): {}", e.stage(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli_args: &HashMap<String, String>) -> Result<RunOutcome, StepError> {
    let config_path = cli_args
        .get("config")
        .ok_or_else(|| StepError::Config("Missing --config=<path>".to_string()))?;
    let config = StepConfig::load(&File::new(config_path)).await?;

    let env = application_version(cli_args)?;
    info!(
        "Running {} for environment {} with artifact tag {} (release tag: {})",
        config.task, env.environment, env.artifact_tag, env.on_release_tag
    );

    let options = StepOptions::from_env();
    let step = K8sImageRollingUpdate::with_azure(env, config, options)?;
    step.run().await
}

fn application_version(cli_args: &HashMap<String, String>) -> Result<ApplicationVersion, StepError> {
    let lookup = |arg: &str, var: &str| {
        cli_args
            .get(arg)
            .cloned()
            .or_else(|| env::var(var).ok())
            .filter(|v| !v.is_empty())
    };

    let environment = lookup("env", "ROLLSTEP_ENV")
        .ok_or_else(|| StepError::Config("Missing --env=<environment>".to_string()))?;
    let tag = lookup("tag", "ROLLSTEP_TAG")
        .ok_or_else(|| StepError::Config("Missing --tag=<artifact tag>".to_string()))?;
    let branch = lookup("branch", "ROLLSTEP_BRANCH").unwrap_or_default();

    let version = ApplicationVersion::new(environment, tag, branch);
    if cli_args.get("release-tag").map(String::as_str) == Some("true") {
        return Ok(version.with_release_tag(true));
    }
    Ok(version)
}

//! Error types for the rolling update step

use thiserror::Error;

/// Non-zero exit of the external update command
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{}", describe_exit(.code))]
pub struct ExitFailure {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("process exited with code {}", code),
        None => "process terminated by signal".to_string(),
    }
}

/// Main error type for the rolling update step
#[derive(Error, Debug)]
pub enum StepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Secret not found in vault {vault}: {name}")]
    SecretNotFound { vault: String, name: String },

    #[error("Control plane error: {0}")]
    ControlPlane(String),

    #[error("Control plane returned no credentials for cluster {cluster}")]
    EmptyCredentials { cluster: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Kubeconfig directory already exists: {path}")]
    KubeconfigExists { path: String },

    #[error("Could not update the image: {0}")]
    UpdateApply(#[from] ExitFailure),

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("State error: {0}")]
    Transition(String),
}

impl StepError {
    /// Pipeline stage the error belongs to, used when reporting failures
    pub fn stage(&self) -> &'static str {
        match self {
            StepError::Config(_) | StepError::Json(_) => "config",
            StepError::Auth(_) | StepError::SecretNotFound { .. } => "credentials",
            StepError::ControlPlane(_)
            | StepError::EmptyCredentials { .. }
            | StepError::Decode(_)
            | StepError::KubeconfigExists { .. }
            | StepError::Http(_)
            | StepError::Io(_) => "kubeconfig",
            StepError::UpdateApply(_) | StepError::Spawn { .. } => "rollout",
            StepError::Transition(_) => "state",
        }
    }

    /// Check if the error comes from a non-zero exit of the update command
    pub fn exit_failure(&self) -> Option<ExitFailure> {
        match self {
            StepError::UpdateApply(failure) => Some(*failure),
            _ => None,
        }
    }
}

//! Rolling image update through kubectl

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::deploy::kubeconfig::ClusterAccessConfig;
use crate::errors::{ExitFailure, StepError};
use crate::models::target::{DeploymentTarget, ImageReference};

/// Runs external programs and reports their exit code
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program to completion, `None` if it was killed by a signal
    async fn run(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
    ) -> std::io::Result<Option<i32>>;
}

/// Runs programs as child processes with inherited stdio
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
    ) -> std::io::Result<Option<i32>> {
        let status = Command::new(program)
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;
        Ok(status.code())
    }
}

/// The `kubectl set image` invocation for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingUpdateCommand {
    program: String,
    args: Vec<String>,
}

impl RollingUpdateCommand {
    /// Build the command updating the deployment's container to `image`
    ///
    /// The container is assumed to be named after the deployment. `--record`
    /// stores the command in the `kubernetes.io/change-cause` annotation.
    pub fn new(program: &str, target: &DeploymentTarget, image: &ImageReference) -> Self {
        let deployment = &target.deployment_name;
        let args = vec![
            "--namespace".to_string(),
            target.namespace.clone(),
            "--record".to_string(),
            format!("deployment.apps/{}", deployment),
            "set".to_string(),
            "image".to_string(),
            format!("deployment.v1.apps/{}", deployment),
            format!("{}={}", deployment, image),
        ];

        Self {
            program: program.to_string(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Render the command line for logging
    pub fn render(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Map an exit code to the result of the update
pub fn check_exit(code: Option<i32>) -> Result<(), ExitFailure> {
    match code {
        Some(0) => Ok(()),
        code => Err(ExitFailure { code }),
    }
}

/// Apply the rolling update, the exit code is the only success signal
///
/// Not deduplicated: re-applying the same image is left to the cluster's
/// controller, which treats it as a no-op rollout.
pub async fn apply(
    runner: &dyn CommandRunner,
    program: &str,
    target: &DeploymentTarget,
    image: &ImageReference,
    access: &ClusterAccessConfig,
) -> Result<(), StepError> {
    info!("Deploying image {}", image);

    let command = RollingUpdateCommand::new(program, target, image);
    debug!("Running: {}", command.render());

    let code = runner
        .run(command.program(), command.args(), &access.env())
        .await
        .map_err(|source| StepError::Spawn {
            program: command.program().to_string(),
            source,
        })?;

    if let Err(failure) = check_exit(code) {
        error!(
            "Could not update the image of deployment {}: {}",
            target.deployment_name, failure
        );
        return Err(failure.into());
    }

    info!(
        "Image {} applied to deployment {}/{}",
        image, target.namespace, target.deployment_name
    );
    Ok(())
}

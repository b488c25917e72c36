//! Rolling update step executor

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::azure::connector::{ArmConnector, ControlPlaneConnector};
use crate::config::options::StepOptions;
use crate::config::step::StepConfig;
use crate::deploy::fsm::{RunEvent, RunFsm, RunState};
use crate::deploy::kubectl::{CommandRunner, ProcessRunner};
use crate::deploy::{credentials, kubeconfig, kubectl};
use crate::errors::StepError;
use crate::models::target::{DeploymentTarget, ImageReference};
use crate::models::version::ApplicationVersion;
use crate::secrets::store::{resolve_vault_and_client, SecretBinding};

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Deploy condition not met, nothing was done
    Skipped,

    /// The deployment was updated to `image`
    Applied { image: ImageReference },
}

/// Updates the image of a Kubernetes deployment on a managed cluster
///
/// Runs once: credential resolution, kubeconfig materialization and the
/// kubectl update happen in order and any failure aborts the run. Nothing
/// already written (e.g. the kubeconfig) is rolled back.
pub struct K8sImageRollingUpdate {
    env: ApplicationVersion,
    config: StepConfig,
    secrets: SecretBinding,
    connector: Arc<dyn ControlPlaneConnector>,
    runner: Arc<dyn CommandRunner>,
    options: StepOptions,
    fsm: RwLock<RunFsm>,
}

impl K8sImageRollingUpdate {
    /// Create a new executor from explicit collaborators
    pub fn new(
        env: ApplicationVersion,
        config: StepConfig,
        secrets: SecretBinding,
        connector: Arc<dyn ControlPlaneConnector>,
        runner: Arc<dyn CommandRunner>,
        options: StepOptions,
    ) -> Self {
        Self {
            env,
            config,
            secrets,
            connector,
            runner,
            options,
            fsm: RwLock::new(RunFsm::new()),
        }
    }

    /// Create an executor talking to Azure and running kubectl
    pub fn with_azure(
        env: ApplicationVersion,
        config: StepConfig,
        options: StepOptions,
    ) -> Result<Self, StepError> {
        let secrets = resolve_vault_and_client(&config, &env, &options)?;
        let connector = ArmConnector::new(options.azure.clone())?;

        Ok(Self::new(
            env,
            config,
            secrets,
            Arc::new(connector),
            Arc::new(ProcessRunner),
            options,
        ))
    }

    /// Get the deployment target
    pub fn target(&self) -> DeploymentTarget {
        self.config.target()
    }

    /// Check the deploy condition
    pub fn should_deploy(&self) -> bool {
        self.config.always_deploy || self.env.on_release_tag
    }

    /// Get the current run state
    pub async fn state(&self) -> RunState {
        self.fsm.read().await.state().clone()
    }

    /// Get the failure cause of the run, if any
    pub async fn failure(&self) -> Option<String> {
        self.fsm.read().await.error().map(str::to_string)
    }

    async fn transition(&self, event: RunEvent) -> Result<(), StepError> {
        let mut fsm = self.fsm.write().await;
        fsm.process(event).map_err(StepError::Transition)
    }

    /// Run the step
    pub async fn run(&self) -> Result<RunOutcome, StepError> {
        self.transition(RunEvent::CheckGate).await?;

        let target = self.target();
        debug!(
            "Target {}/{} on cluster {} (naming convention: {})",
            target.namespace,
            target.deployment_name,
            target.cluster_name,
            self.config.azure.kubernetes_name(&self.env.stage())
        );

        if !self.should_deploy() {
            info!(
                "Not on a release tag and always_deploy is off, skipping update of {}",
                target.deployment_name
            );
            self.transition(RunEvent::GateClosed).await?;
            self.transition(RunEvent::Finish).await?;
            return Ok(RunOutcome::Skipped);
        }

        info!("Deploying new k8s image");
        match self.update_image(&target).await {
            Ok(image) => {
                self.transition(RunEvent::Finish).await?;
                info!("Rolling update finished");
                Ok(RunOutcome::Applied { image })
            }
            Err(e) => {
                error!("Rolling update failed at stage {}: {}", e.stage(), e);
                if let Err(state_err) = self.transition(RunEvent::Fail(e.to_string())).await {
                    error!("{}", state_err);
                }
                Err(e)
            }
        }
    }

    async fn update_image(&self, target: &DeploymentTarget) -> Result<ImageReference, StepError> {
        let handle = credentials::resolve(&self.secrets, self.connector.as_ref()).await?;
        self.transition(RunEvent::CredentialsResolved).await?;

        let access = kubeconfig::materialize(&handle, target, &self.options.layout).await?;
        drop(handle);
        self.transition(RunEvent::ConfigWritten).await?;
        info!("Kubeconfig loaded from {}", access.path().display());

        let image = target.image_reference(&self.env.artifact_tag);
        kubectl::apply(
            self.runner.as_ref(),
            &self.options.kubectl,
            target,
            &image,
            &access,
        )
        .await?;
        self.transition(RunEvent::UpdateApplied).await?;

        Ok(image)
    }
}

//! Rolling update step tests

mod support;

use std::sync::Arc;

use rollstep::deploy::executor::{K8sImageRollingUpdate, RunOutcome};
use rollstep::deploy::fsm::RunState;
use rollstep::errors::{ExitFailure, StepError};
use rollstep::models::version::ApplicationVersion;

use support::mocks::{
    default_secrets, secret_binding, step_config, step_options, CallLog, MockConnector,
    MockRunner, KUBECONFIG,
};

fn dev_version(on_release_tag: bool) -> ApplicationVersion {
    ApplicationVersion::new("DEV", "abc123", "my-branch").with_release_tag(on_release_tag)
}

struct Harness {
    step: K8sImageRollingUpdate,
    runner: Arc<MockRunner>,
    log: CallLog,
    options_home: std::path::PathBuf,
}

fn harness(always_deploy: bool, on_release_tag: bool, exit_code: Option<i32>) -> Harness {
    harness_with(always_deploy, on_release_tag, exit_code, |log| {
        MockConnector::with_kubeconfig(log)
    })
}

fn harness_with<F>(always_deploy: bool, on_release_tag: bool, exit_code: Option<i32>, connector: F) -> Harness
where
    F: FnOnce(&CallLog) -> MockConnector,
{
    let log = CallLog::default();
    let runner = Arc::new(MockRunner::new(exit_code, &log));
    let options = step_options();
    let options_home = options.layout.home_dir.clone();

    let step = K8sImageRollingUpdate::new(
        dev_version(on_release_tag),
        step_config(always_deploy),
        secret_binding(default_secrets(), &log),
        Arc::new(connector(&log)),
        runner.clone(),
        options,
    );

    Harness {
        step,
        runner,
        log,
        options_home,
    }
}

#[tokio::test]
async fn test_skips_without_release_tag() {
    let h = harness(false, false, Some(0));

    let outcome = h.step.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Skipped);
    assert!(h.log.calls().is_empty());
    assert!(h.runner.command_lines().is_empty());
    assert!(!h.options_home.join(".kube").exists());
    assert_eq!(h.step.state().await, RunState::Done);
}

#[tokio::test]
async fn test_release_tag_triggers_update() {
    let h = harness(false, true, Some(0));

    let outcome = h.step.run().await.unwrap();

    assert!(matches!(outcome, RunOutcome::Applied { .. }));
    assert_eq!(h.runner.command_lines().len(), 1);
}

#[tokio::test]
async fn test_always_deploy_runs_each_stage_once_in_order() {
    let h = harness(true, false, Some(0));

    h.step.run().await.unwrap();

    let calls = h.log.calls();
    let connect = calls.iter().position(|c| c.starts_with("connect:")).unwrap();
    let list = calls.iter().position(|c| c.starts_with("list_credentials:")).unwrap();
    let run = calls.iter().position(|c| c.starts_with("run:")).unwrap();

    assert!(connect < list && list < run);
    assert_eq!(h.log.count("connect:"), 1);
    assert_eq!(h.log.count("list_credentials:"), 1);
    assert_eq!(h.log.count("run:"), 1);
    assert_eq!(calls[connect], "connect:tenant-1:client-1:sub-1");
    assert_eq!(calls[list], "list_credentials:rg1/c1");
}

#[tokio::test]
async fn test_expected_kubectl_invocation() {
    let h = harness(true, true, Some(0));

    let outcome = h.step.run().await.unwrap();

    match outcome {
        RunOutcome::Applied { image } => assert_eq!(image.to_string(), "repo/svc:abc123"),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        h.runner.command_lines(),
        vec![
            "kubectl --namespace default --record deployment.apps/svc set image \
             deployment.v1.apps/svc svc=repo/svc:abc123"
                .to_string()
        ]
    );

    let kubeconfig = h.options_home.join(".kube").join("config");
    assert_eq!(std::fs::read_to_string(&kubeconfig).unwrap(), KUBECONFIG);
    assert_eq!(
        h.runner.envs(),
        vec![vec![(
            "KUBECONFIG".to_string(),
            kubeconfig.display().to_string()
        )]]
    );
    assert_eq!(h.step.state().await, RunState::Done);
}

#[tokio::test]
async fn test_non_zero_exit_is_fatal() {
    let h = harness(true, false, Some(1));

    let err = h.step.run().await.unwrap_err();

    assert_eq!(err.exit_failure(), Some(ExitFailure { code: Some(1) }));
    assert_eq!(err.stage(), "rollout");
    assert_eq!(h.step.state().await, RunState::Failed);
    assert!(h.step.failure().await.is_some());
    // The kubeconfig is not rolled back
    assert!(h.options_home.join(".kube").join("config").exists());
}

#[tokio::test]
async fn test_missing_secret_aborts_before_control_plane() {
    let log = CallLog::default();
    let runner = Arc::new(MockRunner::new(Some(0), &log));
    let mut secrets = default_secrets();
    secrets.remove("subscription-id");

    let step = K8sImageRollingUpdate::new(
        dev_version(true),
        step_config(false),
        secret_binding(secrets, &log),
        Arc::new(MockConnector::with_kubeconfig(&log)),
        runner.clone(),
        step_options(),
    );

    let err = step.run().await.unwrap_err();

    assert!(matches!(err, StepError::SecretNotFound { ref name, .. } if name == "subscription-id"));
    assert_eq!(err.stage(), "credentials");
    assert_eq!(log.count("connect:"), 0);
    assert!(runner.command_lines().is_empty());
    assert_eq!(step.state().await, RunState::Failed);
}

#[tokio::test]
async fn test_auth_failure_is_fatal() {
    let h = harness_with(true, false, Some(0), |log| MockConnector {
        fail_auth: true,
        ..MockConnector::with_kubeconfig(log)
    });

    let err = h.step.run().await.unwrap_err();

    assert!(matches!(err, StepError::Auth(_)));
    assert_eq!(h.log.count("list_credentials:"), 0);
    assert!(h.runner.command_lines().is_empty());
}

#[tokio::test]
async fn test_empty_credentials_are_fatal() {
    let h = harness_with(true, false, Some(0), |log| MockConnector {
        results: Ok(vec![]),
        ..MockConnector::with_kubeconfig(log)
    });

    let err = h.step.run().await.unwrap_err();

    assert!(matches!(err, StepError::EmptyCredentials { ref cluster } if cluster == "c1"));
    assert!(!h.options_home.join(".kube").exists());
    assert!(h.runner.command_lines().is_empty());
}

#[tokio::test]
async fn test_control_plane_failure_is_fatal() {
    let h = harness_with(true, false, Some(0), |log| MockConnector {
        results: Err("404 ResourceNotFound".to_string()),
        ..MockConnector::with_kubeconfig(log)
    });

    let err = h.step.run().await.unwrap_err();

    assert!(matches!(err, StepError::ControlPlane(_)));
    assert_eq!(err.stage(), "kubeconfig");
    assert!(h.runner.command_lines().is_empty());
}

#[tokio::test]
async fn test_existing_kube_dir_is_fatal() {
    let h = harness(true, false, Some(0));
    let kube_dir = h.options_home.join(".kube");
    std::fs::create_dir_all(&kube_dir).unwrap();
    std::fs::write(kube_dir.join("config"), "existing").unwrap();

    let err = h.step.run().await.unwrap_err();

    assert!(matches!(err, StepError::KubeconfigExists { .. }));
    assert_eq!(
        std::fs::read_to_string(kube_dir.join("config")).unwrap(),
        "existing"
    );
    assert!(h.runner.command_lines().is_empty());
}

#[tokio::test]
async fn test_run_is_single_shot() {
    let h = harness(true, false, Some(0));

    h.step.run().await.unwrap();
    let err = h.step.run().await.unwrap_err();

    assert!(matches!(err, StepError::Transition(_)));
    assert_eq!(h.runner.command_lines().len(), 1);
}

#[test]
fn test_secrets_are_not_logged_in_debug_output() {
    let log = CallLog::default();
    let binding = secret_binding(default_secrets(), &log);
    let rendered = format!("{:?}", binding);

    assert!(rendered.contains("keyvaultdev"));
    assert!(!rendered.contains("s3cr3t"));
}

#[tokio::test]
async fn test_apply_twice_issues_same_command() {
    use rollstep::deploy::kubeconfig::ClusterAccessConfig;
    use rollstep::deploy::kubectl::apply;

    let log = CallLog::default();
    let runner = MockRunner::new(Some(0), &log);
    let target = step_config(true).target();
    let image = target.image_reference("04fab6");
    let access = ClusterAccessConfig::new("/home/runner/.kube/config");

    apply(&runner, "kubectl", &target, &image, &access).await.unwrap();
    apply(&runner, "kubectl", &target, &image, &access).await.unwrap();

    let lines = runner.command_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], lines[1]);
    assert!(lines[0].ends_with("svc=repo/svc:04fab6"));
}

//! Step configuration tests

use rollstep::config::step::StepConfig;
use rollstep::errors::StepError;
use rollstep::filesys::dir::Dir;

const MINIMAL: &str = r#"{
    "task": "k8sImageRollingUpdate",
    "resource_group": "rg1",
    "cluster_name": "c1",
    "deployment_name": "svc",
    "image": "repo/svc",
    "azure": {"kubernetes_naming": "aks_{env}"}
}"#;

fn with(key: &str, value: serde_json::Value) -> String {
    let mut doc: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
    doc[key] = value;
    doc.to_string()
}

#[test]
fn test_defaults() {
    let config = StepConfig::from_json(MINIMAL).unwrap();

    assert_eq!(config.namespace, "default");
    assert!(!config.always_deploy);
    assert_eq!(config.azure.keyvault_name("dev"), "keyvaultdev");
    assert_eq!(config.azure.kubernetes_name("dev"), "aks_dev");
}

#[test]
fn test_target() {
    let config = StepConfig::from_json(&with("namespace", "apps".into())).unwrap();
    let target = config.target();

    assert_eq!(target.resource_group, "rg1");
    assert_eq!(target.cluster_name, "c1");
    assert_eq!(target.namespace, "apps");
    assert_eq!(target.deployment_name, "svc");
    assert_eq!(target.image_repository, "repo/svc");
}

#[test]
fn test_extra_keys_are_ignored() {
    let config = StepConfig::from_json(&with("dependencies", serde_json::json!(["x"]))).unwrap();
    assert_eq!(config.deployment_name, "svc");
}

#[test]
fn test_wrong_task_is_rejected() {
    let result = StepConfig::from_json(&with("task", "createDatabricksSecrets".into()));
    assert!(matches!(result, Err(StepError::Config(_))));
}

#[test]
fn test_missing_required_key_is_rejected() {
    let mut doc: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
    doc.as_object_mut().unwrap().remove("cluster_name");

    let result = StepConfig::from_json(&doc.to_string());
    assert!(matches!(result, Err(StepError::Config(_))));
}

#[test]
fn test_empty_and_tagged_values_are_rejected() {
    let result = StepConfig::from_json(&with("deployment_name", "".into()));
    assert!(matches!(result, Err(StepError::Config(_))));

    let result = StepConfig::from_json(&with("image", "repo/svc:latest".into()));
    assert!(matches!(result, Err(StepError::Config(_))));

    // A registry port is not a tag
    let config = StepConfig::from_json(&with("image", "registry:5000/svc".into())).unwrap();
    assert_eq!(config.image, "registry:5000/svc");
}

#[test]
fn test_naming_requires_env_parameter() {
    let result = StepConfig::from_json(&with(
        "azure",
        serde_json::json!({"kubernetes_naming": "aks"}),
    ));
    assert!(matches!(result, Err(StepError::Config(_))));

    let result = StepConfig::from_json(&with(
        "azure",
        serde_json::json!({"kubernetes_naming": "aks{env}", "keyvault_naming": "kv"}),
    ));
    assert!(matches!(result, Err(StepError::Config(_))));
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = Dir::create_temp_dir("rollstep-config").await.unwrap();
    let file = dir.file("deployment.json");
    tokio::fs::write(file.path(), MINIMAL).await.unwrap();

    let config = StepConfig::load(&file).await.unwrap();
    assert_eq!(config.cluster_name, "c1");

    let missing = StepConfig::load(&dir.file("missing.json")).await;
    assert!(matches!(missing, Err(StepError::Config(_))));

    dir.delete().await.unwrap();
}

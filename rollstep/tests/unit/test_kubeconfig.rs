//! Kubeconfig materialization tests

mod support;

use rollstep::azure::connector::{AuthenticatedClusterHandle, ControlPlaneConnector};
use rollstep::azure::container_service::CredentialResult;
use rollstep::azure::credentials::DelegatedCredentials;
use rollstep::deploy::kubeconfig::{materialize, write_kubeconfig};
use rollstep::errors::StepError;
use rollstep::filesys::dir::Dir;
use rollstep::storage::layout::StorageLayout;
use secrecy::SecretString;

use support::mocks::{step_config, CallLog, MockConnector, KUBECONFIG};

async fn handle(connector: &MockConnector) -> AuthenticatedClusterHandle {
    let credentials = DelegatedCredentials::new("tenant-1", "client-1", SecretString::from("s"));
    connector
        .connect(credentials, "sub-1".to_string())
        .await
        .unwrap()
}

async fn temp_layout() -> (Dir, StorageLayout) {
    let home = Dir::create_temp_dir("rollstep-kube").await.unwrap();
    let layout = StorageLayout::new(home.path());
    (home, layout)
}

#[tokio::test]
async fn test_materialize_writes_first_credential() {
    let log = CallLog::default();
    let mut connector = MockConnector::with_kubeconfig(&log);
    connector.results = Ok(vec![
        CredentialResult {
            name: "clusterUser".to_string(),
            value: KUBECONFIG.as_bytes().to_vec(),
        },
        CredentialResult {
            name: "secondary".to_string(),
            value: b"other".to_vec(),
        },
    ]);
    let (home, layout) = temp_layout().await;

    let access = materialize(&handle(&connector).await, &step_config(true).target(), &layout)
        .await
        .unwrap();

    assert_eq!(access.path(), layout.kubeconfig_file().path());
    assert_eq!(layout.kubeconfig_file().read_string().await.unwrap(), KUBECONFIG);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(access.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    home.delete().await.unwrap();
}

#[tokio::test]
async fn test_materialize_rejects_non_utf8() {
    let log = CallLog::default();
    let mut connector = MockConnector::with_kubeconfig(&log);
    connector.results = Ok(vec![CredentialResult {
        name: "clusterUser".to_string(),
        value: vec![0xc3, 0x28],
    }]);
    let (home, layout) = temp_layout().await;

    let result = materialize(&handle(&connector).await, &step_config(true).target(), &layout).await;

    assert!(matches!(result, Err(StepError::Decode(_))));
    assert!(!layout.kube_dir().exists().await);

    home.delete().await.unwrap();
}

#[tokio::test]
async fn test_existing_dir_is_never_overwritten() {
    let (home, layout) = temp_layout().await;
    layout.kube_dir().create_new().await.unwrap();

    let result = write_kubeconfig(&layout, KUBECONFIG).await;

    assert!(matches!(result, Err(StepError::KubeconfigExists { .. })));
    assert!(!layout.kubeconfig_file().exists().await);

    home.delete().await.unwrap();
}

#[tokio::test]
async fn test_second_write_in_same_home_fails() {
    let (home, layout) = temp_layout().await;

    write_kubeconfig(&layout, KUBECONFIG).await.unwrap();
    let result = write_kubeconfig(&layout, "replacement").await;

    assert!(matches!(result, Err(StepError::KubeconfigExists { .. })));
    assert_eq!(layout.kubeconfig_file().read_string().await.unwrap(), KUBECONFIG);

    home.delete().await.unwrap();
}

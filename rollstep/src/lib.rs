//! Rolling image update step for deployments on managed Kubernetes clusters
//!
//! Resolves cluster credentials from Azure Key Vault, writes the cluster's
//! kubeconfig and rolls a new image onto a single deployment with kubectl.

pub mod azure;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod secrets;
pub mod storage;
pub mod utils;

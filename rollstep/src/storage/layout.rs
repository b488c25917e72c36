//! Storage layout configuration

use std::path::PathBuf;

use tracing::warn;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Name of the directory holding the cluster access configuration
const KUBE_DIR: &str = ".kube";

/// File name of the cluster access configuration
const KUBECONFIG_FILE: &str = "config";

/// Filesystem layout used by the step
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Home directory of the user running the step
    pub home_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
        }
    }

    /// Get the kube directory (`~/.kube`)
    pub fn kube_dir(&self) -> Dir {
        Dir::new(&self.home_dir).subdir(KUBE_DIR)
    }

    /// Get the kubeconfig file path (`~/.kube/config`)
    pub fn kubeconfig_file(&self) -> File {
        self.kube_dir().file(KUBECONFIG_FILE)
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let home_dir = dirs::home_dir(|key| std::env::var_os(key)).unwrap_or_else(|| {
            warn!("Neither HOME nor USERPROFILE is set, using the working directory as home");
            PathBuf::from(".")
        });
        Self::new(home_dir)
    }
}

mod dirs {
    use std::ffi::OsString;
    use std::path::PathBuf;

    pub fn home_dir(lookup: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
        ["HOME", "USERPROFILE"]
            .into_iter()
            .filter_map(|key| lookup(key))
            .find(|v| !v.is_empty())
            .map(PathBuf::from)
    }
}

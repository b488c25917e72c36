//! Application version of a pipeline run

use serde::{Deserialize, Serialize};

/// Identifies what is being deployed and where
///
/// Created once per invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationVersion {
    /// Deployment environment (e.g. "DEV", "PRD")
    pub environment: String,

    /// Immutable artifact tag used for the image reference
    pub artifact_tag: String,

    /// Branch the run was triggered from
    pub branch: String,

    /// Whether this run corresponds to an official release trigger
    pub on_release_tag: bool,
}

impl ApplicationVersion {
    /// Create a new application version, deriving the release flag from the tag
    pub fn new(
        environment: impl Into<String>,
        artifact_tag: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        let artifact_tag = artifact_tag.into();
        let branch = branch.into();
        let on_release_tag = is_release_version(&artifact_tag) && artifact_tag != branch;

        Self {
            environment: environment.into(),
            artifact_tag,
            branch,
            on_release_tag,
        }
    }

    /// Override the release flag
    pub fn with_release_tag(mut self, on_release_tag: bool) -> Self {
        self.on_release_tag = on_release_tag;
        self
    }

    /// Lower-cased environment name, used as the key namespace for secrets
    pub fn stage(&self) -> String {
        self.environment.to_lowercase()
    }
}

/// Check whether a tag looks like `v?MAJOR.MINOR.PATCH[-pre][+build]`
pub fn is_release_version(tag: &str) -> bool {
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    let core = tag.split(['-', '+']).next().unwrap_or("");

    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

//! External collaborators consumed by the event model and the parser.
//!
//! Project resolution, packaging-config loading and the build/test-run
//! database all live outside this crate. They are reached through the narrow
//! async traits defined here and injected as `Arc<dyn Trait>` at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use url::Url;

// ============================================================================
// Errors
// ============================================================================

/// Error returned by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Service unavailable: {service} - {message}")]
    Unavailable { service: String, message: String },

    #[error("Service timed out: {service}")]
    Timeout { service: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

impl ServiceError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Timeout { .. } => true,
            Self::NotFound { .. } => false,
            Self::InvalidResponse { .. } => false,
        }
    }
}

// ============================================================================
// ProjectHandle
// ============================================================================

/// Handle to a repository on a forge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectHandle {
    /// Scheme and host of the forge, e.g. `https://github.com`
    pub forge_url: String,
    /// Owner, organization or group path (may contain `/` for GitLab subgroups)
    pub namespace: String,
    pub repo: String,
}

impl ProjectHandle {
    /// Build a handle from a repository URL.
    ///
    /// Accepts `https://host/namespace/repo`, nested namespaces and a trailing
    /// `.git`. Returns `None` when the URL has fewer than two path segments.
    ///
    /// ```rust
    /// use forge_intake_core::services::ProjectHandle;
    ///
    /// let project = ProjectHandle::from_url("https://gitlab.com/redhat/centos-stream/src/bash.git").unwrap();
    /// assert_eq!(project.namespace, "redhat/centos-stream/src");
    /// assert_eq!(project.repo, "bash");
    /// assert_eq!(project.full_repo_name(), "redhat/centos-stream/src/bash");
    /// ```
    pub fn from_url(project_url: &str) -> Option<Self> {
        let parsed = Url::parse(project_url).ok()?;
        let host = parsed.host_str()?;

        let segments: Vec<&str> = parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .collect();
        let (repo, namespace) = segments.split_last()?;
        if namespace.is_empty() {
            return None;
        }

        let repo: &str = repo;
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        let forge_url = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };

        Some(Self {
            forge_url,
            namespace: namespace.join("/"),
            repo: repo.to_string(),
        })
    }

    /// `namespace/repo`
    pub fn full_repo_name(&self) -> String {
        format!("{}/{}", self.namespace, self.repo)
    }

    /// Browser URL of the repository
    pub fn url(&self) -> String {
        format!("{}/{}/{}", self.forge_url, self.namespace, self.repo)
    }
}

impl fmt::Display for ProjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Packaging configuration read from a repository at a given reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default)]
    pub specfile_path: Option<String>,
    #[serde(default)]
    pub upstream_package_name: Option<String>,
    #[serde(default)]
    pub downstream_package_name: Option<String>,
    #[serde(default)]
    pub jobs: Vec<serde_json::Value>,
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Resolves project URLs to forge project handles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    /// Resolve a repository URL.
    ///
    /// Returns [`ServiceError::NotFound`] when the forge does not know it.
    async fn resolve(&self, project_url: &str) -> Result<ProjectHandle, ServiceError>;

    /// Source branch of a pull request, used when a comment payload lacks it.
    async fn pull_request_source_branch(
        &self,
        project: &ProjectHandle,
        pr_id: u64,
    ) -> Result<Option<String>, ServiceError>;

    /// Tag of the most recent published release, if any.
    async fn latest_release_tag(
        &self,
        project: &ProjectHandle,
    ) -> Result<Option<String>, ServiceError>;
}

/// Loads the packaging configuration file from a repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageConfigLoader: Send + Sync {
    /// Returns `Ok(None)` when the repository has no configuration file.
    async fn load(
        &self,
        project: &ProjectHandle,
        reference: Option<String>,
        pr_id: Option<u64>,
    ) -> Result<Option<PackageConfig>, ServiceError>;
}

/// Stored metadata of a build submitted earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub build_id: u64,
    pub commit_sha: String,
    #[serde(default)]
    pub pr_id: Option<u64>,
    pub repo_namespace: String,
    pub repo_name: String,
    #[serde(default)]
    pub git_ref: Option<String>,
    pub project_url: String,
    #[serde(default)]
    pub target: Option<String>,
}

/// Stored metadata of a Testing Farm run submitted earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunRecord {
    pub pipeline_id: String,
    pub commit_sha: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub base_project_url: Option<String>,
}

/// Build and test-run database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BuildStore: Send + Sync {
    async fn copr_build(&self, build_id: u64) -> Result<Option<BuildRecord>, ServiceError>;

    async fn koji_build(&self, build_id: u64) -> Result<Option<BuildRecord>, ServiceError>;

    async fn test_run(&self, pipeline_id: &str) -> Result<Option<TestRunRecord>, ServiceError>;
}

// ============================================================================
// InMemoryBuildStore
// ============================================================================

/// Seed file layout accepted by [`InMemoryBuildStore::from_seed`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStoreSeed {
    #[serde(default)]
    pub copr_builds: Vec<BuildRecord>,
    #[serde(default)]
    pub koji_builds: Vec<BuildRecord>,
    #[serde(default)]
    pub test_runs: Vec<TestRunRecord>,
}

/// [`BuildStore`] backed by in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryBuildStore {
    copr_builds: RwLock<HashMap<u64, BuildRecord>>,
    koji_builds: RwLock<HashMap<u64, BuildRecord>>,
    test_runs: RwLock<HashMap<String, TestRunRecord>>,
}

impl InMemoryBuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated from a seed document.
    pub fn from_seed(seed: BuildStoreSeed) -> Self {
        Self {
            copr_builds: RwLock::new(
                seed.copr_builds
                    .into_iter()
                    .map(|b| (b.build_id, b))
                    .collect(),
            ),
            koji_builds: RwLock::new(
                seed.koji_builds
                    .into_iter()
                    .map(|b| (b.build_id, b))
                    .collect(),
            ),
            test_runs: RwLock::new(
                seed.test_runs
                    .into_iter()
                    .map(|r| (r.pipeline_id.clone(), r))
                    .collect(),
            ),
        }
    }

    pub async fn insert_copr_build(&self, record: BuildRecord) {
        self.copr_builds.write().await.insert(record.build_id, record);
    }

    pub async fn insert_koji_build(&self, record: BuildRecord) {
        self.koji_builds.write().await.insert(record.build_id, record);
    }

    pub async fn insert_test_run(&self, record: TestRunRecord) {
        self.test_runs
            .write()
            .await
            .insert(record.pipeline_id.clone(), record);
    }
}

#[async_trait]
impl BuildStore for InMemoryBuildStore {
    async fn copr_build(&self, build_id: u64) -> Result<Option<BuildRecord>, ServiceError> {
        Ok(self.copr_builds.read().await.get(&build_id).cloned())
    }

    async fn koji_build(&self, build_id: u64) -> Result<Option<BuildRecord>, ServiceError> {
        Ok(self.koji_builds.read().await.get(&build_id).cloned())
    }

    async fn test_run(&self, pipeline_id: &str) -> Result<Option<TestRunRecord>, ServiceError> {
        Ok(self.test_runs.read().await.get(pipeline_id).cloned())
    }
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;

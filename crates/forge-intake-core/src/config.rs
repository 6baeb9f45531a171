//! Service configuration.
//!
//! The configuration is read once at startup and shared read-only (behind an
//! `Arc`) by every concurrent parse. It carries the mirroring rules consulted
//! by the dist-git extractor, the bot identities whose comments are ignored
//! and the Testing Farm endpoints used to complete result events.
//!
//! # Sources
//!
//! [`ServiceConfig::load`] layers, lowest priority first:
//!
//! 1. `/etc/forge-intake/service.yaml` (optional)
//! 2. `config/service.yaml` relative to the working directory (optional)
//! 3. An explicit file given by the caller (required when given)
//! 4. Environment variables prefixed `FI__`, e.g.
//!    `FI__TESTING_FARM_TIMEOUT_SECONDS=10`
//!
//! Every field has a default, so an unconfigured environment still yields a
//! valid configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Login names of the service's own bots.
pub const DEFAULT_BOT_LOGINS: [&str; 2] =
    ["packit-as-a-service[bot]", "packit-as-a-service-stg[bot]"];

const BOT_LOGIN_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]*(\[bot\])?$";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Configuration validation failed: {errors:?}")]
    ValidationError { errors: Vec<String> },
}

// ============================================================================
// Types
// ============================================================================

/// Deployment environment the service runs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    Dev,
    #[default]
    Stg,
    Prod,
}

/// Mirroring rule: commits to `dg_repo_name`/`dg_branch` in dist-git are
/// synced back to the upstream project described by the remaining fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectToSync {
    /// Forge base URL, e.g. `https://github.com`
    pub forge: String,
    pub repo_namespace: String,
    pub repo_name: String,
    pub branch: String,
    pub dg_repo_name: String,
    pub dg_branch: String,
}

impl ProjectToSync {
    /// URL of the upstream project
    pub fn upstream_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.forge.trim_end_matches('/'),
            self.repo_namespace,
            self.repo_name
        )
    }

    fn empty_fields(&self) -> Vec<&'static str> {
        [
            ("forge", &self.forge),
            ("repo_namespace", &self.repo_namespace),
            ("repo_name", &self.repo_name),
            ("branch", &self.branch),
            ("dg_repo_name", &self.dg_repo_name),
            ("dg_branch", &self.dg_branch),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub deployment: Deployment,

    /// Base URL of the Testing Farm API
    pub testing_farm_api_url: String,

    /// Upper bound for a single Testing Farm request
    pub testing_farm_timeout_seconds: u64,

    /// Test repository used for installability runs; such runs have no
    /// Copr artifacts
    pub testing_farm_installability_test_url: String,

    /// Base URL of the Testing Farm artifacts (log) server
    pub testing_farm_artifacts_url: String,

    /// Base URL of the dist-git forge
    pub dist_git_url: String,

    /// Comments authored by these logins are ignored
    pub bot_logins: BTreeSet<String>,

    /// Users allowed to trigger the service on any repository
    pub admins: BTreeSet<String>,

    pub projects_to_sync: Vec<ProjectToSync>,

    pub dashboard_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            deployment: Deployment::default(),
            testing_farm_api_url: "https://api.dev.testing-farm.io/v0.1".to_string(),
            testing_farm_timeout_seconds: 30,
            testing_farm_installability_test_url: "https://gitlab.com/testing-farm/tests"
                .to_string(),
            testing_farm_artifacts_url: "http://artifacts.dev.testing-farm.io".to_string(),
            dist_git_url: "https://src.fedoraproject.org".to_string(),
            bot_logins: DEFAULT_BOT_LOGINS.iter().map(|s| s.to_string()).collect(),
            admins: BTreeSet::new(),
            projects_to_sync: Vec::new(),
            dashboard_url: String::new(),
        }
    }
}

impl ServiceConfig {
    /// Load the layered configuration and validate it.
    ///
    /// `explicit_path` is added on top of the default file locations and must
    /// exist when given.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name("/etc/forge-intake/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name("config/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        if let Some(path) = explicit_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            info!(path = %path.display(), "Loading configuration from explicit path");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("FI").separator("__"))
            .build()
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })?;

        let config: ServiceConfig =
            settings
                .try_deserialize()
                .map_err(|e| ConfigError::ParseError {
                    message: e.to_string(),
                })?;

        config.validate()?;
        debug!(deployment = ?config.deployment, "Loaded service configuration");
        Ok(config)
    }

    /// Load a single YAML or JSON file, chosen by extension.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {}", e),
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: ServiceConfig = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                    message: format!("Invalid YAML: {}", e),
                })?
            }
            "json" => serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
                message: format!("Invalid JSON: {}", e),
            })?,
            _ => serde_json::from_str(&contents)
                .or_else(|_| serde_yaml::from_str(&contents))
                .map_err(|e| ConfigError::ParseError {
                    message: format!("Failed to parse as JSON or YAML: {}", e),
                })?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that would break recognition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.testing_farm_api_url.trim().is_empty() {
            errors.push("testing_farm_api_url must not be empty".to_string());
        } else if let Err(e) = Url::parse(&self.testing_farm_api_url) {
            errors.push(format!(
                "testing_farm_api_url '{}' is not a valid URL: {}",
                self.testing_farm_api_url, e
            ));
        }

        if self.testing_farm_timeout_seconds == 0 {
            errors.push("testing_farm_timeout_seconds must be greater than zero".to_string());
        }

        let login_pattern = Regex::new(BOT_LOGIN_PATTERN).map_err(|e| ConfigError::ParseError {
            message: format!("Invalid bot login pattern: {}", e),
        })?;
        for login in &self.bot_logins {
            if login.trim().is_empty() {
                errors.push("bot_logins must not contain empty entries".to_string());
            } else if !login_pattern.is_match(login) {
                errors.push(format!("bot login '{}' is not a valid login name", login));
            }
        }

        for (index, project) in self.projects_to_sync.iter().enumerate() {
            for field in project.empty_fields() {
                errors.push(format!("projects_to_sync[{}].{} must not be empty", index, field));
            }
        }

        let mut seen = BTreeSet::new();
        for project in &self.projects_to_sync {
            if !seen.insert((&project.dg_repo_name, &project.dg_branch)) {
                warn!(
                    dg_repo_name = %project.dg_repo_name,
                    dg_branch = %project.dg_branch,
                    "Duplicate mirroring rule; the first one wins"
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError { errors })
        }
    }

    /// First mirroring rule for a dist-git repository and branch.
    pub fn get_project_to_sync(&self, dg_repo_name: &str, dg_branch: &str) -> Option<&ProjectToSync> {
        let project = self
            .projects_to_sync
            .iter()
            .find(|p| p.dg_repo_name == dg_repo_name && p.dg_branch == dg_branch);
        if let Some(project) = project {
            info!(?project, "Found project to sync");
        }
        project
    }

    /// Whether staging instances of external services are used
    pub fn use_stage(&self) -> bool {
        self.deployment != Deployment::Prod
    }

    pub fn is_bot_login(&self, login: &str) -> bool {
        self.bot_logins.contains(login)
    }

    pub fn testing_farm_timeout(&self) -> Duration {
        Duration::from_secs(self.testing_farm_timeout_seconds)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

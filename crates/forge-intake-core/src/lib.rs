//! # Forge-Intake Core
//!
//! Event normalization and dispatch pipeline for forge webhooks, build-system
//! bus messages and test-service notifications.
//!
//! This crate turns loosely structured inbound payloads (GitHub, GitLab and
//! Pagure webhooks or bus messages, Copr and Koji fedmsg messages, Testing
//! Farm notifications) into one closed set of canonical [`Event`] records
//! that a downstream job-dispatch layer consumes uniformly.
//!
//! ## Architecture
//!
//! - [`field_access`] provides the nested lookup primitive every extractor uses
//! - [`events`] holds the canonical event model and its serialization contract
//! - [`parser`] holds the per-source extractors, the ordered [`Parser`] chain
//!   and the [`CentosEventParser`] topic dispatch table
//! - [`comment_actions`] holds the comment-action registry
//! - [`services`] and [`testing_farm`] define the external collaborators
//!   consumed through narrow traits
//!
//! ## Usage
//!
//! ```rust
//! use forge_intake_core::field_access::nested_str;
//! use serde_json::json;
//!
//! let payload = json!({"release": {"tag_name": "1.2.3"}});
//! assert_eq!(nested_str(&payload, &["release", "tag_name"]), Some("1.2.3"));
//! ```

use serde::{Deserialize, Serialize};

/// Standard result type for intake operations
pub type IntakeResult<T> = Result<T, IntakeError>;

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Configuration errors preventing startup
    Configuration,
}

/// Top-level error type for intake operations
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Field path error: {0}")]
    FieldPath(#[from] field_access::FieldPathError),

    #[error("Event error: {0}")]
    Event(#[from] events::EventError),

    #[error("Parse error: {0}")]
    Parse(#[from] parser::ParseError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] crate::config::ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] comment_actions::RegistryError),

    #[error("Command error: {0}")]
    Command(#[from] comment_actions::CommandError),

    #[error("Testing Farm error: {0}")]
    TestingFarm(#[from] testing_farm::TestingFarmError),

    #[error("Service error: {0}")]
    Service(#[from] services::ServiceError),
}

impl IntakeError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Parse(e) => e.is_transient(),
            Self::Event(e) => e.is_transient(),
            Self::FieldPath(_) => false,
            Self::Configuration(_) => false,
            Self::Registry(_) => false,
            Self::Command(_) => false,
            Self::TestingFarm(e) => e.is_transient(),
            Self::Service(e) => e.is_transient(),
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            _ if self.is_transient() => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Safe nested lookup over untyped payload trees
pub mod field_access;

/// Canonical event model
pub mod events;

/// Source extractors, parser chain and topic dispatch table
pub mod parser;

/// Comment-action registry and `/packit` command parsing
pub mod comment_actions;

/// External collaborator interfaces
pub mod services;

/// Testing Farm API client
pub mod testing_farm;

/// Service configuration
pub mod config;

pub use comment_actions::{
    find_packit_command, CommandError, CommentAction, CommentActionHandler,
    CommentActionRegistry, PackitCommand, RegistryError,
};
pub use crate::config::{ConfigError, Deployment, ProjectToSync, ServiceConfig};
pub use events::{CreatedAt, Event, EventBase, EventError, TriggerType};
pub use parser::{
    CentosEventParser, ExtractorKind, ParseError, ParseOutcome, Parser, Recognition,
};
pub use services::{
    BuildRecord, BuildStore, InMemoryBuildStore, PackageConfig, PackageConfigLoader,
    ProjectHandle, ProjectResolver, ServiceError, TestRunRecord,
};
pub use testing_farm::{
    HttpTestingFarmClient, TestingFarmClient, TestingFarmClientConfig, TestingFarmError,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

//! Canonical event model.
//!
//! Every recognized payload becomes exactly one [`Event`]. The variants are a
//! closed set; each owns the fields relevant to its source and shares only the
//! [`EventBase`] (trigger and creation time).
//!
//! # Transport contract
//!
//! [`Event::to_transport_dict`] produces the durable mapping downstream
//! consumers store and transmit:
//!
//! - `event_type` names the variant in snake case
//! - `trigger` and every enum-valued field are lowercase string values
//! - `created_at` is an integer epoch-seconds value
//! - every other field is copied by value, absent optionals become `null`
//!
//! Renaming a field or changing an enum string value is a breaking change for
//! consumers of that mapping.

use crate::services::{PackageConfig, PackageConfigLoader, ProjectHandle, ProjectResolver, ServiceError};
use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Closed string-valued enum with `as_str`, `Display` and `FromStr`.
///
/// The string values double as the serde representation.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $value)] $variant),+
        }

        impl $name {
            /// Every value in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire value of this variant
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::events::EventError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    _ => Err($crate::events::EventError::UnknownValue {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

mod fedmsg;
mod github;
mod gitlab;
mod pagure;
mod testing_farm;

pub use fedmsg::{
    CoprBuildEvent, CoprBuildKind, CoprBuildStatus, DistGitCommitEvent, FedmsgTopic,
    KojiBuildEvent, KojiTaskState,
};
pub use github::{
    InstallationEvent, InstallationStatus, IssueCommentAction, IssueCommentGithubEvent,
    PullRequestAction, PullRequestCommentAction, PullRequestCommentGithubEvent,
    PullRequestGithubEvent, ReleaseEvent,
};
pub use gitlab::{
    GitlabEventAction, IssueCommentGitlabEvent, MergeRequestCommentGitlabEvent,
    MergeRequestGitlabEvent,
};
pub use pagure::{PullRequestCommentPagureEvent, PullRequestPagureEvent};
pub use testing_farm::{TestResult, TestingFarmResult, TestingFarmResultsEvent};

// ============================================================================
// Errors
// ============================================================================

/// Error raised while building, serializing or resolving events.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Invalid timestamp '{value}': {message}")]
    InvalidTimestamp { value: String, message: String },

    #[error("Unknown {kind} value '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Event serialization failed: {message}")]
    Serialization { message: String },

    #[error("Project not found: {url}")]
    ProjectNotFound { url: String },

    #[error("Collaborator failed: {0}")]
    Service(#[from] ServiceError),
}

impl EventError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Service(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

// ============================================================================
// Trigger and timestamps
// ============================================================================

string_enum! {
    /// What kind of occurrence produced the event
    pub enum TriggerType {
        Release => "release",
        PullRequest => "pull_request",
        MergeRequest => "merge_request",
        Push => "push",
        Comment => "comment",
        Installation => "installation",
        Commit => "commit",
        TestingFarmResults => "testing_farm_results",
        CoprBuild => "copr_build",
        KojiResults => "koji_results",
    }
}

/// Epoch-seconds values above this are treated as milliseconds.
///
/// As seconds this threshold lies in the year 5138.
const MILLISECONDS_THRESHOLD: f64 = 1e11;

/// Raw creation time as it appears in a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedAt {
    /// Whole epoch seconds
    Seconds(i64),
    /// Fractional epoch seconds, or milliseconds when above the threshold
    Float(f64),
    /// ISO-8601 / RFC 3339 text, `Z` suffix accepted
    Iso(String),
    /// Time of construction
    Now,
}

impl CreatedAt {
    /// Interpret a JSON scalar as a creation time.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(CreatedAt::Seconds)
                .or_else(|| n.as_f64().map(CreatedAt::Float)),
            // Pagure sends epoch seconds as text
            Value::String(s) => Some(
                s.parse::<i64>()
                    .map(CreatedAt::Seconds)
                    .unwrap_or_else(|_| CreatedAt::Iso(s.clone())),
            ),
            _ => None,
        }
    }

    /// Normalize to a single point in time.
    pub fn resolve(&self) -> Result<DateTime<Utc>, EventError> {
        match self {
            CreatedAt::Seconds(seconds) => Utc
                .timestamp_opt(*seconds, 0)
                .single()
                .ok_or_else(|| invalid_timestamp(seconds, "out of range")),
            CreatedAt::Float(value) => {
                if !value.is_finite() {
                    return Err(invalid_timestamp(value, "not a finite number"));
                }
                let seconds = if *value > MILLISECONDS_THRESHOLD {
                    value / 1000.0
                } else {
                    *value
                };
                let whole = seconds.floor();
                let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
                DateTime::from_timestamp(whole as i64, nanos)
                    .ok_or_else(|| invalid_timestamp(value, "out of range"))
            }
            CreatedAt::Iso(text) => parse_iso(text),
            CreatedAt::Now => Ok(Utc::now()),
        }
    }
}

fn parse_iso(text: &str) -> Result<DateTime<Utc>, EventError> {
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text.trim_end_matches(" UTC"), "%Y-%m-%d %H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .map_err(|e| invalid_timestamp(text, &e.to_string()))
}

fn invalid_timestamp(value: impl ToString, message: &str) -> EventError {
    EventError::InvalidTimestamp {
        value: value.to_string(),
        message: message.to_string(),
    }
}

/// Fields shared by every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBase {
    pub trigger: TriggerType,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl EventBase {
    /// Base stamped with the current time
    pub fn now(trigger: TriggerType) -> Self {
        Self::at(trigger, Utc::now())
    }

    /// Base with an already normalized creation time.
    ///
    /// Sub-second precision is dropped; the transport form carries whole seconds.
    pub fn at(trigger: TriggerType, created_at: DateTime<Utc>) -> Self {
        Self {
            trigger,
            created_at: created_at.with_nanosecond(0).unwrap_or(created_at),
        }
    }

    /// Base with a raw creation time taken from a payload
    pub fn new(trigger: TriggerType, created_at: CreatedAt) -> Result<Self, EventError> {
        Ok(Self::at(trigger, created_at.resolve()?))
    }
}

/// A push to a branch, shared by the GitHub, GitLab and Pagure push variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub repo_namespace: String,
    pub repo_name: String,
    pub git_ref: String,
    pub project_url: Option<String>,
    pub commit_sha: String,
}

// ============================================================================
// Event
// ============================================================================

/// A canonical, source-independent event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Event {
    Release(ReleaseEvent),
    PullRequestGithub(PullRequestGithubEvent),
    PullRequestCommentGithub(PullRequestCommentGithubEvent),
    IssueCommentGithub(IssueCommentGithubEvent),
    PushGithub(PushEvent),
    Installation(InstallationEvent),
    DistGitCommit(DistGitCommitEvent),
    TestingFarmResults(TestingFarmResultsEvent),
    CoprBuild(CoprBuildEvent),
    KojiBuild(KojiBuildEvent),
    MergeRequestGitlab(MergeRequestGitlabEvent),
    MergeRequestCommentGitlab(MergeRequestCommentGitlabEvent),
    IssueCommentGitlab(IssueCommentGitlabEvent),
    PushGitlab(PushEvent),
    PullRequestPagure(PullRequestPagureEvent),
    PullRequestCommentPagure(PullRequestCommentPagureEvent),
    PushPagure(PushEvent),
}

macro_rules! each_variant {
    ($event:expr, $inner:ident => $body:expr) => {
        match $event {
            Event::Release($inner) => $body,
            Event::PullRequestGithub($inner) => $body,
            Event::PullRequestCommentGithub($inner) => $body,
            Event::IssueCommentGithub($inner) => $body,
            Event::PushGithub($inner) => $body,
            Event::Installation($inner) => $body,
            Event::DistGitCommit($inner) => $body,
            Event::TestingFarmResults($inner) => $body,
            Event::CoprBuild($inner) => $body,
            Event::KojiBuild($inner) => $body,
            Event::MergeRequestGitlab($inner) => $body,
            Event::MergeRequestCommentGitlab($inner) => $body,
            Event::IssueCommentGitlab($inner) => $body,
            Event::PushGitlab($inner) => $body,
            Event::PullRequestPagure($inner) => $body,
            Event::PullRequestCommentPagure($inner) => $body,
            Event::PushPagure($inner) => $body,
        }
    };
}

impl Event {
    pub fn base(&self) -> &EventBase {
        each_variant!(self, e => &e.base)
    }

    pub fn trigger(&self) -> TriggerType {
        self.base().trigger
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.base().created_at
    }

    /// Stable snake-case name of the variant, equal to the `event_type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Release(_) => "release",
            Event::PullRequestGithub(_) => "pull_request_github",
            Event::PullRequestCommentGithub(_) => "pull_request_comment_github",
            Event::IssueCommentGithub(_) => "issue_comment_github",
            Event::PushGithub(_) => "push_github",
            Event::Installation(_) => "installation",
            Event::DistGitCommit(_) => "dist_git_commit",
            Event::TestingFarmResults(_) => "testing_farm_results",
            Event::CoprBuild(_) => "copr_build",
            Event::KojiBuild(_) => "koji_build",
            Event::MergeRequestGitlab(_) => "merge_request_gitlab",
            Event::MergeRequestCommentGitlab(_) => "merge_request_comment_gitlab",
            Event::IssueCommentGitlab(_) => "issue_comment_gitlab",
            Event::PushGitlab(_) => "push_gitlab",
            Event::PullRequestPagure(_) => "pull_request_pagure",
            Event::PullRequestCommentPagure(_) => "pull_request_comment_pagure",
            Event::PushPagure(_) => "push_pagure",
        }
    }

    /// URL of the project the event originates from
    pub fn project_url(&self) -> Option<&str> {
        match self {
            Event::Release(e) => Some(&e.project_url),
            Event::PullRequestGithub(e) => Some(&e.project_url),
            Event::PullRequestCommentGithub(e) => Some(&e.project_url),
            Event::IssueCommentGithub(e) => Some(&e.project_url),
            Event::PushGithub(e) | Event::PushGitlab(e) | Event::PushPagure(e) => {
                e.project_url.as_deref()
            }
            Event::Installation(_) => None,
            Event::DistGitCommit(e) => Some(&e.project_url),
            Event::TestingFarmResults(e) => e.project_url.as_deref(),
            Event::CoprBuild(e) => e.project_url.as_deref(),
            Event::KojiBuild(e) => e.project_url.as_deref(),
            Event::MergeRequestGitlab(e) => Some(&e.project_url),
            Event::MergeRequestCommentGitlab(e) => Some(&e.project_url),
            Event::IssueCommentGitlab(e) => Some(&e.project_url),
            Event::PullRequestPagure(e) => Some(&e.project_url),
            Event::PullRequestCommentPagure(e) => Some(&e.project_url),
        }
    }

    pub fn commit_sha(&self) -> Option<&str> {
        match self {
            Event::PullRequestGithub(e) => Some(&e.commit_sha),
            Event::PushGithub(e) | Event::PushGitlab(e) | Event::PushPagure(e) => {
                Some(&e.commit_sha)
            }
            Event::DistGitCommit(e) => Some(&e.dg_rev),
            Event::TestingFarmResults(e) => e.commit_sha.as_deref(),
            Event::CoprBuild(e) => e.commit_sha.as_deref(),
            Event::KojiBuild(e) => e.commit_sha.as_deref(),
            Event::MergeRequestGitlab(e) => Some(&e.commit_sha),
            Event::MergeRequestCommentGitlab(e) => Some(&e.commit_sha),
            Event::PullRequestPagure(e) => Some(&e.commit_sha),
            Event::PullRequestCommentPagure(e) => Some(&e.commit_sha),
            Event::Release(_)
            | Event::PullRequestCommentGithub(_)
            | Event::IssueCommentGithub(_)
            | Event::Installation(_)
            | Event::IssueCommentGitlab(_) => None,
        }
    }

    /// Pull or merge request number the event refers to
    pub fn pr_id(&self) -> Option<u64> {
        match self {
            Event::PullRequestGithub(e) => Some(e.pr_id),
            Event::PullRequestCommentGithub(e) => Some(e.pr_id),
            Event::CoprBuild(e) => e.pr_id,
            Event::KojiBuild(e) => e.pr_id,
            Event::MergeRequestGitlab(e) => Some(e.object_iid),
            Event::MergeRequestCommentGitlab(e) => e.object_iid,
            Event::PullRequestPagure(e) => Some(e.pr_id),
            Event::PullRequestCommentPagure(e) => Some(e.pr_id),
            _ => None,
        }
    }

    /// Body of the comment for comment-triggered variants
    pub fn comment(&self) -> Option<&str> {
        match self {
            Event::PullRequestCommentGithub(e) => Some(&e.comment),
            Event::IssueCommentGithub(e) => Some(&e.comment),
            Event::MergeRequestCommentGitlab(e) => e.comment.as_deref(),
            Event::IssueCommentGitlab(e) => Some(&e.comment),
            Event::PullRequestCommentPagure(e) => Some(&e.comment),
            _ => None,
        }
    }

    /// Reference at which the packaging configuration is read, from stored fields only.
    ///
    /// Comment variants may not know their reference yet; see
    /// [`Event::resolve_package_config`] for the lookups that fill it in.
    pub fn package_config_reference(&self) -> Option<&str> {
        match self {
            Event::Release(e) => Some(&e.tag_name),
            Event::PullRequestGithub(e) => Some(&e.base_ref),
            Event::PullRequestCommentGithub(e) => e.base_ref.as_deref(),
            Event::IssueCommentGithub(e) => e.tag_name.as_deref(),
            Event::PushGithub(e) | Event::PushGitlab(e) | Event::PushPagure(e) => {
                Some(&e.commit_sha)
            }
            Event::Installation(_) => None,
            Event::DistGitCommit(e) => Some(&e.branch),
            Event::TestingFarmResults(e) => e.commit_sha.as_deref(),
            Event::CoprBuild(e) => e.git_ref.as_deref(),
            Event::KojiBuild(e) => e.commit_sha.as_deref(),
            Event::MergeRequestGitlab(e) => Some(&e.commit_sha),
            Event::MergeRequestCommentGitlab(e) => Some(&e.commit_sha),
            Event::IssueCommentGitlab(e) => e.tag_name.as_deref(),
            Event::PullRequestPagure(e) => Some(&e.commit_sha),
            Event::PullRequestCommentPagure(e) => Some(&e.commit_sha),
        }
    }

    /// Veto evaluated once after construction.
    ///
    /// Only Copr build events can fail it, when no build record was stored
    /// for their build id.
    pub fn pre_check(&self) -> bool {
        match self {
            Event::CoprBuild(e) => e.build_record_found,
            _ => true,
        }
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Serialize to the flat JSON-safe transport mapping.
    pub fn to_transport_dict(&self) -> Result<Map<String, Value>, EventError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(EventError::Serialization {
                message: format!("expected a JSON object, got {}", other),
            }),
        }
    }

    /// Rebuild an event from its transport mapping.
    pub fn from_transport_dict(map: Map<String, Value>) -> Result<Self, EventError> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    // ------------------------------------------------------------------------
    // Collaborator-backed accessors
    // ------------------------------------------------------------------------

    /// Resolve the originating project.
    ///
    /// `Ok(None)` means the variant carries no project URL and processing
    /// should be skipped. A URL the resolver does not know is reported as
    /// [`EventError::ProjectNotFound`].
    pub async fn resolve_project(
        &self,
        resolver: &dyn ProjectResolver,
    ) -> Result<Option<ProjectHandle>, EventError> {
        let Some(url) = self.project_url() else {
            debug!(event_type = self.event_type(), "Event carries no project URL");
            return Ok(None);
        };

        match resolver.resolve(url).await {
            Ok(project) => Ok(Some(project)),
            Err(ServiceError::NotFound { .. }) => Err(EventError::ProjectNotFound {
                url: url.to_string(),
            }),
            Err(e) => Err(EventError::Service(e)),
        }
    }

    /// Load the packaging configuration at the variant's reference.
    ///
    /// A GitHub PR comment without a base ref uses the PR source branch; an
    /// issue comment uses the latest release tag. The looked-up value is
    /// stored on the event so downstream handlers see the same reference.
    /// A repository without a configuration file yields `Ok(None)`.
    pub async fn resolve_package_config(
        &mut self,
        resolver: &dyn ProjectResolver,
        loader: &dyn PackageConfigLoader,
    ) -> Result<Option<PackageConfig>, EventError> {
        let Some(project) = self.resolve_project(resolver).await? else {
            return Ok(None);
        };

        let reference = match &mut *self {
            Event::PullRequestCommentGithub(e) if e.base_ref.is_none() => {
                e.base_ref = resolver.pull_request_source_branch(&project, e.pr_id).await?;
                e.base_ref.clone()
            }
            Event::IssueCommentGithub(e) if e.tag_name.is_none() => {
                e.tag_name = resolver.latest_release_tag(&project).await?;
                e.tag_name.clone()
            }
            Event::IssueCommentGitlab(e) if e.tag_name.is_none() => {
                e.tag_name = resolver.latest_release_tag(&project).await?;
                e.tag_name.clone()
            }
            other => other.package_config_reference().map(str::to_string),
        };

        let config = loader.load(&project, reference.clone(), self.pr_id()).await?;
        if config.is_none() {
            info!(
                project = %project,
                reference = ?reference,
                "No packaging configuration found"
            );
        }
        Ok(config)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

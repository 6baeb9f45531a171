//! Source extractors and the parser chain.
//!
//! Each extractor recognizes one (source, message shape) pair. An extractor
//! first checks a marker field unique to its source; only when the marker
//! matches does it decode the remaining fields and apply its filters. The
//! [`Parser`] tries the extractors in a fixed priority order and the first
//! one that produces an event wins.
//!
//! Every extractor reports one of three outcomes (see [`Recognition`]):
//!
//! - `NotMine`: the marker did not match, nothing is logged above debug
//! - `Rejected`: the marker matched but a required field is missing or a
//!   filter excluded the payload; the chain continues
//! - an `Err(ParseError)` from the asynchronous extractors when a
//!   collaborator needed to finish recognition failed; the caller should
//!   retry the whole parse later
//!
//! The Pagure forge delivers every event kind over one bus topic namespace
//! and is handled separately by the topic dispatch table in [`centos`].

use crate::config::ServiceConfig;
use crate::events::{CreatedAt, Event, EventBase, EventError, TriggerType};
use crate::field_access::nested_get;
use crate::services::{BuildStore, ServiceError};
use crate::testing_farm::{TestingFarmClient, TestingFarmError};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub mod centos;
mod fedmsg;
mod github;
mod gitlab;
mod testing_farm;

pub use centos::{CentosEventParser, CommentLocation, PagureDecoder, TopicRoute, TOPIC_ROUTES};
pub use testing_farm::parse_xunit;

// ============================================================================
// Errors
// ============================================================================

/// Failure to complete recognition because a collaborator is unavailable.
///
/// Always transient: the payload itself may be perfectly valid.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Dependency unavailable: {service} - {message}")]
    DependencyUnavailable { service: String, message: String },

    #[error("Dependency timed out: {service}")]
    DependencyTimeout { service: String },
}

impl ParseError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::DependencyUnavailable { .. } => true,
            Self::DependencyTimeout { .. } => true,
        }
    }

    fn testing_farm(error: TestingFarmError) -> Self {
        match error {
            TestingFarmError::Timeout { .. } => Self::DependencyTimeout {
                service: "testing-farm".to_string(),
            },
            other => Self::DependencyUnavailable {
                service: "testing-farm".to_string(),
                message: other.to_string(),
            },
        }
    }

    fn build_store(error: ServiceError) -> Self {
        match error {
            ServiceError::Timeout { service } => Self::DependencyTimeout { service },
            other => Self::DependencyUnavailable {
                service: "build-store".to_string(),
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Recognition outcome
// ============================================================================

/// Outcome of running one extractor against one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    /// The payload is not addressed to this extractor
    NotMine,
    /// The marker matched but the payload was dropped
    Rejected { reason: String },
    Recognized(Box<Event>),
}

impl Recognition {
    pub fn recognized(event: Event) -> Self {
        Recognition::Recognized(Box::new(event))
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Recognition::Recognized(_))
    }

    pub fn into_event(self) -> Option<Event> {
        match self {
            Recognition::Recognized(event) => Some(*event),
            _ => None,
        }
    }
}

/// Reject a payload whose marker matched but which lacks required data.
pub(crate) fn malformed(reason: impl Into<String>) -> Recognition {
    let reason = reason.into();
    warn!(reason = %reason, "Dropping malformed payload");
    Recognition::Rejected { reason }
}

/// Reject a well-formed payload excluded by a source-specific rule.
pub(crate) fn filtered(reason: impl Into<String>) -> Recognition {
    let reason = reason.into();
    info!(reason = %reason, "Payload filtered out");
    Recognition::Rejected { reason }
}

/// Reject a payload that is expected to be incomplete, without raising the log level.
pub(crate) fn debug_skip(reason: impl Into<String>) -> Recognition {
    let reason = reason.into();
    debug!(reason = %reason, "Payload skipped");
    Recognition::Rejected { reason }
}

/// Reject a comment written by one of the service's own bots.
pub(crate) fn own_comment(login: &str) -> Recognition {
    debug!(login, "Our own comment");
    Recognition::Rejected {
        reason: format!("comment authored by bot '{}'", login),
    }
}

/// Event base with a timestamp taken from the payload, or now when absent.
pub(crate) fn base_from(
    trigger: TriggerType,
    timestamp: Option<&Value>,
) -> Result<EventBase, EventError> {
    let created_at = timestamp
        .and_then(CreatedAt::from_json)
        .unwrap_or(CreatedAt::Now);
    EventBase::new(trigger, created_at)
}

/// The first timestamp present at one of `paths`, tried in order.
pub(crate) fn first_timestamp<'a>(payload: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| nested_get(payload, path))
}

/// Read-only data shared by the synchronous extractors.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub config: &'a ServiceConfig,
}

// ============================================================================
// Extractor chain
// ============================================================================

/// The extractors of the webhook-path chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    GithubPullRequest,
    GithubPullRequestComment,
    GithubIssueComment,
    GithubRelease,
    GithubPush,
    GithubInstallation,
    DistGitCommit,
    TestingFarmResults,
    CoprBuild,
    GitlabMergeRequest,
    KojiBuild,
    GitlabMergeRequestComment,
    GitlabIssueComment,
    GitlabPush,
}

impl ExtractorKind {
    /// Evaluation order of the chain. The first extractor to recognize a
    /// payload wins.
    pub const CHAIN: [ExtractorKind; 14] = [
        ExtractorKind::GithubPullRequest,
        ExtractorKind::GithubPullRequestComment,
        ExtractorKind::GithubIssueComment,
        ExtractorKind::GithubRelease,
        ExtractorKind::GithubPush,
        ExtractorKind::GithubInstallation,
        ExtractorKind::DistGitCommit,
        ExtractorKind::TestingFarmResults,
        ExtractorKind::CoprBuild,
        ExtractorKind::GitlabMergeRequest,
        ExtractorKind::KojiBuild,
        ExtractorKind::GitlabMergeRequestComment,
        ExtractorKind::GitlabIssueComment,
        ExtractorKind::GitlabPush,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractorKind::GithubPullRequest => "github_pull_request",
            ExtractorKind::GithubPullRequestComment => "github_pull_request_comment",
            ExtractorKind::GithubIssueComment => "github_issue_comment",
            ExtractorKind::GithubRelease => "github_release",
            ExtractorKind::GithubPush => "github_push",
            ExtractorKind::GithubInstallation => "github_installation",
            ExtractorKind::DistGitCommit => "dist_git_commit",
            ExtractorKind::TestingFarmResults => "testing_farm_results",
            ExtractorKind::CoprBuild => "copr_build",
            ExtractorKind::GitlabMergeRequest => "gitlab_merge_request",
            ExtractorKind::KojiBuild => "koji_build",
            ExtractorKind::GitlabMergeRequestComment => "gitlab_merge_request_comment",
            ExtractorKind::GitlabIssueComment => "gitlab_issue_comment",
            ExtractorKind::GitlabPush => "gitlab_push",
        }
    }

    /// Whether the extractor consults a collaborator
    pub fn is_async(&self) -> bool {
        matches!(
            self,
            ExtractorKind::TestingFarmResults | ExtractorKind::CoprBuild | ExtractorKind::KojiBuild
        )
    }

    /// Run a synchronous extractor. Returns `None` for the asynchronous ones.
    pub fn extract_sync(&self, payload: &Value, ctx: &ExtractContext<'_>) -> Option<Recognition> {
        let recognition = match self {
            ExtractorKind::GithubPullRequest => github::pull_request(payload),
            ExtractorKind::GithubPullRequestComment => github::pull_request_comment(payload, ctx),
            ExtractorKind::GithubIssueComment => github::issue_comment(payload, ctx),
            ExtractorKind::GithubRelease => github::release(payload),
            ExtractorKind::GithubPush => github::push(payload),
            ExtractorKind::GithubInstallation => github::installation(payload),
            ExtractorKind::DistGitCommit => fedmsg::dist_git_commit(payload, ctx),
            ExtractorKind::GitlabMergeRequest => gitlab::merge_request(payload),
            ExtractorKind::GitlabMergeRequestComment => gitlab::merge_request_comment(payload, ctx),
            ExtractorKind::GitlabIssueComment => gitlab::issue_comment(payload, ctx),
            ExtractorKind::GitlabPush => gitlab::push(payload),
            ExtractorKind::TestingFarmResults
            | ExtractorKind::CoprBuild
            | ExtractorKind::KojiBuild => return None,
        };
        Some(recognition)
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a full pass over the chain, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Nothing to parse
    Empty,
    Recognized {
        extractor: ExtractorKind,
        event: Box<Event>,
    },
    /// Recognized, but the event's pre-check vetoed it
    Vetoed {
        extractor: ExtractorKind,
        event: Box<Event>,
    },
    /// No extractor recognized the payload; `rejections` lists the
    /// extractors whose marker matched and why they dropped it
    Unrecognized {
        rejections: Vec<(ExtractorKind, String)>,
    },
}

impl ParseOutcome {
    /// The event handed to downstream dispatch, if any
    pub fn into_event(self) -> Option<Event> {
        match self {
            ParseOutcome::Recognized { event, .. } => Some(*event),
            _ => None,
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Webhook-path parser: the ordered extractor chain plus its collaborators.
#[derive(Clone)]
pub struct Parser {
    config: Arc<ServiceConfig>,
    build_store: Arc<dyn BuildStore>,
    testing_farm: Arc<dyn TestingFarmClient>,
}

impl Parser {
    pub fn new(
        config: Arc<ServiceConfig>,
        build_store: Arc<dyn BuildStore>,
        testing_farm: Arc<dyn TestingFarmClient>,
    ) -> Self {
        Self {
            config,
            build_store,
            testing_farm,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Parse a raw payload into a canonical event.
    ///
    /// Returns `Ok(None)` when the payload is empty, when no extractor
    /// recognizes it, or when the recognized event fails its pre-check.
    ///
    /// # Errors
    ///
    /// Returns a transient [`ParseError`] when a collaborator needed to
    /// complete recognition failed; the whole parse should be retried.
    #[instrument(skip(self, payload))]
    pub async fn parse_event(&self, payload: &Value) -> Result<Option<Event>, ParseError> {
        Ok(self.recognize(payload).await?.into_event())
    }

    /// Run the chain and report which extractor decided the outcome.
    pub async fn recognize(&self, payload: &Value) -> Result<ParseOutcome, ParseError> {
        if is_empty_payload(payload) {
            warn!("No event to process!");
            return Ok(ParseOutcome::Empty);
        }

        let mut rejections = Vec::new();
        for extractor in ExtractorKind::CHAIN {
            match self.run_extractor(extractor, payload).await? {
                Recognition::NotMine => {}
                Recognition::Rejected { reason } => rejections.push((extractor, reason)),
                Recognition::Recognized(event) => {
                    if !event.pre_check() {
                        warn!(
                            extractor = %extractor,
                            event_type = event.event_type(),
                            "Event is not handled by this deployment"
                        );
                        return Ok(ParseOutcome::Vetoed { extractor, event });
                    }
                    debug!(extractor = %extractor, event_type = event.event_type(), "Event recognized");
                    return Ok(ParseOutcome::Recognized { extractor, event });
                }
            }
        }

        debug!("We don't process this event.");
        Ok(ParseOutcome::Unrecognized { rejections })
    }

    /// Every extractor of the chain that recognizes the payload, in chain order.
    ///
    /// Unlike [`Parser::recognize`], evaluation does not stop at the first
    /// match and pre-checks are not applied. The asynchronous extractors
    /// consult their collaborators as during a normal parse. A correct chain
    /// never returns more than one entry for a real payload.
    pub async fn matching_extractors(
        &self,
        payload: &Value,
    ) -> Result<Vec<ExtractorKind>, ParseError> {
        let mut matches = Vec::new();
        for extractor in ExtractorKind::CHAIN {
            if self.run_extractor(extractor, payload).await?.is_recognized() {
                matches.push(extractor);
            }
        }
        Ok(matches)
    }

    /// Number of extractors recognizing the payload.
    pub async fn count_matches(&self, payload: &Value) -> Result<usize, ParseError> {
        Ok(self.matching_extractors(payload).await?.len())
    }

    async fn run_extractor(
        &self,
        extractor: ExtractorKind,
        payload: &Value,
    ) -> Result<Recognition, ParseError> {
        let ctx = ExtractContext {
            config: &self.config,
        };
        if let Some(recognition) = extractor.extract_sync(payload, &ctx) {
            return Ok(recognition);
        }

        match extractor {
            ExtractorKind::TestingFarmResults => {
                testing_farm::results(
                    payload,
                    &ctx,
                    self.build_store.as_ref(),
                    self.testing_farm.as_ref(),
                )
                .await
            }
            ExtractorKind::CoprBuild => fedmsg::copr_build(payload, self.build_store.as_ref()).await,
            ExtractorKind::KojiBuild => fedmsg::koji_build(payload, self.build_store.as_ref()).await,
            _ => Ok(Recognition::NotMine),
        }
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

//! Pagure forge messages from the CentOS message bus.
//!
//! Every message carries a `topic` of the form `<forge host>/<event kind>`,
//! e.g. `git.centos.org/pull-request.new`. The event kind selects a route in
//! [`TOPIC_ROUTES`]; the forge host becomes the base of the project URL.
//!
//! Pagure's pull request updates are reported with the GitHub vocabulary
//! (`updated` becomes `synchronize`) so downstream handlers see one set of
//! actions.

use super::{base_from, first_timestamp};
use crate::config::ServiceConfig;
use crate::events::{
    Event, EventBase, EventError, PullRequestAction, PullRequestCommentAction, PullRequestCommentPagureEvent,
    PullRequestPagureEvent, PushEvent, TriggerType,
};
use crate::field_access::{nested_array, nested_non_empty_str, nested_str, nested_u64};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where the body of a pull request comment is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentLocation {
    /// Last entry of `pullrequest.comments`
    Added,
    /// `comment.comment`
    Edited,
}

/// How a routed message is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagureDecoder {
    PullRequest(PullRequestAction),
    PullRequestComment(CommentLocation),
    Push,
}

/// One entry of the topic dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicRoute {
    /// Event kind, the part of the topic after the forge host
    pub topic_suffix: &'static str,
    pub decoder: PagureDecoder,
    /// Short description used in logs
    pub action_label: &'static str,
}

pub const TOPIC_ROUTES: [TopicRoute; 6] = [
    TopicRoute {
        topic_suffix: "pull-request.new",
        decoder: PagureDecoder::PullRequest(PullRequestAction::Opened),
        action_label: "opened",
    },
    TopicRoute {
        topic_suffix: "pull-request.reopened",
        decoder: PagureDecoder::PullRequest(PullRequestAction::Reopened),
        action_label: "reopened",
    },
    TopicRoute {
        topic_suffix: "pull-request.updated",
        decoder: PagureDecoder::PullRequest(PullRequestAction::Synchronize),
        action_label: "synchronize",
    },
    TopicRoute {
        topic_suffix: "pull-request.comment.added",
        decoder: PagureDecoder::PullRequestComment(CommentLocation::Added),
        action_label: "added",
    },
    TopicRoute {
        topic_suffix: "pull-request.comment.edited",
        decoder: PagureDecoder::PullRequestComment(CommentLocation::Edited),
        action_label: "edited",
    },
    TopicRoute {
        topic_suffix: "git.receive",
        decoder: PagureDecoder::Push,
        action_label: "push",
    },
];

impl TopicRoute {
    /// Route registered for an event kind
    pub fn find(topic_suffix: &str) -> Option<&'static TopicRoute> {
        TOPIC_ROUTES.iter().find(|r| r.topic_suffix == topic_suffix)
    }
}

#[derive(Debug, thiserror::Error)]
enum DecodeError {
    #[error("Required field '{path}' is missing")]
    MissingField { path: String },

    #[error("Comment authored by bot '{login}'")]
    BotComment { login: String },

    #[error(transparent)]
    Timestamp(#[from] EventError),
}

/// Bus envelope timestamp, used when the message body carries none.
const ENVELOPE_TIME: &[&str] = &["timestamp"];

const PULL_REQUEST_TIMES: &[&[&str]] = &[
    &["pullrequest", "last_updated"],
    &["pullrequest", "date_created"],
    ENVELOPE_TIME,
];

fn stamped(
    payload: &Value,
    trigger: TriggerType,
    paths: &[&[&str]],
) -> Result<EventBase, DecodeError> {
    Ok(base_from(trigger, first_timestamp(payload, paths))?)
}

fn missing(path: &[&str]) -> DecodeError {
    DecodeError::MissingField {
        path: path.join("."),
    }
}

fn required_str<'a>(payload: &'a Value, path: &[&str]) -> Result<&'a str, DecodeError> {
    nested_non_empty_str(payload, path).ok_or_else(|| missing(path))
}

fn required_u64(payload: &Value, path: &[&str]) -> Result<u64, DecodeError> {
    nested_u64(payload, path).ok_or_else(|| missing(path))
}

/// Parser for messages from the Pagure-based forge.
#[derive(Debug, Clone)]
pub struct CentosEventParser {
    config: Arc<ServiceConfig>,
}

impl CentosEventParser {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self { config }
    }

    /// Decode a bus message.
    ///
    /// Adds `source` (the forge host) and `git_topic` (the event kind) to
    /// the payload. Returns `None` for unrouted kinds, malformed topics,
    /// messages missing required fields and comments from the service's
    /// own bots.
    #[instrument(skip(self, payload), fields(topic = ?nested_str(payload, &["topic"])))]
    pub fn parse_event(&self, payload: &mut Value) -> Option<Event> {
        debug!("Parsing Pagure message");

        let Some(topic) = nested_str(payload, &["topic"]).map(str::to_string) else {
            warn!("Message has no topic");
            return None;
        };
        let Some((source, git_topic)) = topic.split_once('/') else {
            warn!(topic = %topic, "Topic is not of the form <host>/<event>");
            return None;
        };

        let Some(fields) = payload.as_object_mut() else {
            warn!("Message is not a JSON object");
            return None;
        };
        fields.insert("source".to_string(), Value::from(source));
        fields.insert("git_topic".to_string(), Value::from(git_topic));

        let Some(route) = TopicRoute::find(git_topic) else {
            info!(git_topic, "Event type is not processed.");
            return None;
        };
        debug!(git_topic, action = route.action_label, "Routing Pagure message");

        let decoded = match route.decoder {
            PagureDecoder::PullRequest(action) => pull_request(payload, source, action),
            PagureDecoder::PullRequestComment(location) => {
                self.pull_request_comment(payload, source, location)
            }
            PagureDecoder::Push => push(payload, source),
        };

        match decoded {
            Ok(event) => Some(event),
            Err(DecodeError::BotComment { login }) => {
                debug!(login = %login, "Our own comment");
                None
            }
            Err(e) => {
                warn!(git_topic, error = %e, "Dropping malformed Pagure message");
                None
            }
        }
    }

    fn pull_request_comment(
        &self,
        payload: &Value,
        source: &str,
        location: CommentLocation,
    ) -> Result<Event, DecodeError> {
        let login = required_str(payload, &["agent"])?;
        if self.config.is_bot_login(login) {
            return Err(DecodeError::BotComment {
                login: login.to_string(),
            });
        }

        let comment = match location {
            CommentLocation::Edited => required_str(payload, &["comment", "comment"])?,
            CommentLocation::Added => nested_array(payload, &["pullrequest", "comments"])
                .and_then(|comments| comments.last())
                .and_then(|last| nested_str(last, &["comment"]))
                .ok_or_else(|| missing(&["pullrequest", "comments", "-1", "comment"]))?,
        };

        Ok(Event::PullRequestCommentPagure(PullRequestCommentPagureEvent {
            base: stamped(payload, TriggerType::Comment, PULL_REQUEST_TIMES)?,
            action: PullRequestCommentAction::Created,
            pr_id: required_u64(payload, &["pullrequest", "id"])?,
            base_repo_namespace: nested_non_empty_str(payload, &["pullrequest", "project", "namespace"])
                .map(str::to_string),
            base_repo_name: required_str(payload, &["pullrequest", "project", "name"])?.to_string(),
            base_repo_owner: required_str(payload, &["pullrequest", "repo_from", "user", "name"])?
                .to_string(),
            base_ref: None,
            target_repo: required_str(payload, &["pullrequest", "repo_from", "name"])?.to_string(),
            project_url: project_url(payload, source, &["pullrequest", "project", "url_path"])?,
            commit_sha: required_str(payload, &["pullrequest", "commit_stop"])?.to_string(),
            user_login: login.to_string(),
            comment: comment.to_string(),
        }))
    }
}

fn project_url(payload: &Value, source: &str, url_path: &[&str]) -> Result<String, DecodeError> {
    Ok(format!("https://{}/{}", source, required_str(payload, url_path)?))
}

fn pull_request(
    payload: &Value,
    source: &str,
    action: PullRequestAction,
) -> Result<Event, DecodeError> {
    Ok(Event::PullRequestPagure(PullRequestPagureEvent {
        base: stamped(payload, TriggerType::PullRequest, PULL_REQUEST_TIMES)?,
        action,
        pr_id: required_u64(payload, &["pullrequest", "id"])?,
        base_repo_namespace: nested_non_empty_str(payload, &["pullrequest", "repo_from", "namespace"])
            .map(str::to_string),
        base_repo_name: required_str(payload, &["pullrequest", "repo_from", "name"])?.to_string(),
        base_repo_owner: required_str(payload, &["pullrequest", "repo_from", "user", "name"])?
            .to_string(),
        base_ref: required_str(payload, &["pullrequest", "branch"])?.to_string(),
        target_repo: required_str(payload, &["pullrequest", "project", "name"])?.to_string(),
        project_url: project_url(payload, source, &["pullrequest", "project", "url_path"])?,
        commit_sha: required_str(payload, &["pullrequest", "commit_stop"])?.to_string(),
        user_login: required_str(payload, &["pullrequest", "user", "name"])?.to_string(),
    }))
}

fn push(payload: &Value, source: &str) -> Result<Event, DecodeError> {
    let branch = required_str(payload, &["branch"])?;
    Ok(Event::PushPagure(PushEvent {
        base: stamped(payload, TriggerType::Push, &[ENVELOPE_TIME])?,
        repo_namespace: nested_str(payload, &["repo", "namespace"])
            .unwrap_or_default()
            .to_string(),
        repo_name: required_str(payload, &["repo", "name"])?.to_string(),
        git_ref: format!("refs/head/{}", branch),
        project_url: Some(project_url(payload, source, &["repo", "url_path"])?),
        commit_sha: required_str(payload, &["end_commit"])?.to_string(),
    }))
}

#[cfg(test)]
#[path = "centos_tests.rs"]
mod tests;

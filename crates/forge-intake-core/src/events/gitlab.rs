//! GitLab webhook events.

use super::EventBase;
use serde::{Deserialize, Serialize};

string_enum! {
    /// Merge request and note actions.
    ///
    /// GitLab reports `reopen` and `update` as explicit actions; anything
    /// else on an open object is treated as `opened`.
    pub enum GitlabEventAction {
        Opened => "opened",
        Reopen => "reopen",
        Update => "update",
    }
}

impl GitlabEventAction {
    /// Map a raw `object_attributes.action` to the canonical action.
    pub fn from_raw(action: Option<&str>) -> Self {
        match action {
            Some("reopen") => Self::Reopen,
            Some("update") => Self::Update,
            _ => Self::Opened,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestGitlabEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub action: GitlabEventAction,
    pub username: String,
    pub object_id: u64,
    pub object_iid: u64,
    pub source_repo_namespace: String,
    pub source_repo_name: String,
    pub source_repo_branch: Option<String>,
    pub target_repo_namespace: String,
    pub target_repo_name: String,
    pub target_repo_branch: Option<String>,
    pub project_url: String,
    pub commit_sha: String,
}

/// A note on a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestCommentGitlabEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub action: GitlabEventAction,
    pub object_id: Option<u64>,
    pub object_iid: Option<u64>,
    pub source_repo_namespace: String,
    pub source_repo_name: String,
    pub target_repo_namespace: String,
    pub target_repo_name: String,
    pub project_url: String,
    pub username: String,
    pub comment: Option<String>,
    pub commit_sha: String,
}

/// A note on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentGitlabEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub action: GitlabEventAction,
    pub issue_id: u64,
    pub repo_namespace: String,
    pub repo_name: String,
    pub project_url: String,
    pub username: String,
    pub comment: String,
    pub tag_name: Option<String>,
}

//! GitHub webhook events.

use super::EventBase;
use serde::{Deserialize, Serialize};

string_enum! {
    /// Pull request webhook actions that are processed
    pub enum PullRequestAction {
        Opened => "opened",
        Reopened => "reopened",
        Synchronize => "synchronize",
    }
}

string_enum! {
    pub enum PullRequestCommentAction {
        Created => "created",
        Edited => "edited",
    }
}

string_enum! {
    pub enum IssueCommentAction {
        Created => "created",
        Edited => "edited",
    }
}

string_enum! {
    /// Approval state of a freshly installed account
    pub enum InstallationStatus {
        ApprovedAutomatically => "approved_automatically",
        Waiting => "waiting",
        ApprovedManually => "approved_manually",
    }
}

/// A release was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub repo_namespace: String,
    pub repo_name: String,
    pub tag_name: String,
    pub project_url: String,
}

/// A pull request was opened, reopened or received new commits.
///
/// `base_*` describe the head (fork) repository the change comes from and
/// `target_*` the repository the pull request is filed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestGithubEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub action: PullRequestAction,
    pub pr_id: u64,
    pub base_repo_namespace: String,
    pub base_repo_name: String,
    pub base_ref: String,
    pub target_repo_namespace: Option<String>,
    pub target_repo_name: Option<String>,
    pub project_url: String,
    pub commit_sha: String,
    pub user_login: String,
}

/// A comment on a pull request.
///
/// The webhook does not carry the head ref, so `base_ref` starts empty and
/// is filled in when the packaging configuration is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestCommentGithubEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub action: PullRequestCommentAction,
    pub pr_id: u64,
    pub base_repo_namespace: String,
    pub base_repo_name: Option<String>,
    pub base_ref: Option<String>,
    pub target_repo_namespace: Option<String>,
    pub target_repo_name: Option<String>,
    pub project_url: String,
    pub user_login: String,
    pub comment: String,
}

/// A comment on a plain issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentGithubEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub action: IssueCommentAction,
    pub issue_id: u64,
    pub repo_namespace: Option<String>,
    pub repo_name: Option<String>,
    pub target_repo: Option<String>,
    pub project_url: String,
    pub user_login: String,
    pub comment: String,
    pub tag_name: Option<String>,
}

/// The GitHub App was installed into an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub installation_id: u64,
    pub account_login: String,
    pub account_id: u64,
    pub account_url: String,
    /// `User` or `Organization`
    pub account_type: String,
    pub repositories: Vec<String>,
    pub sender_id: u64,
    pub sender_login: String,
    pub status: InstallationStatus,
}

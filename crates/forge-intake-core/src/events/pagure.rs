//! Events from the Pagure-based forge, delivered over the message bus.

use super::{EventBase, PullRequestAction, PullRequestCommentAction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestPagureEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub action: PullRequestAction,
    pub pr_id: u64,
    pub base_repo_namespace: Option<String>,
    pub base_repo_name: String,
    pub base_repo_owner: String,
    pub base_ref: String,
    pub target_repo: String,
    pub project_url: String,
    pub commit_sha: String,
    pub user_login: String,
}

/// A comment added to or edited on a pull request.
///
/// The action is always `created`; the bus topic distinguishes added from
/// edited only to locate the comment body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestCommentPagureEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub action: PullRequestCommentAction,
    pub pr_id: u64,
    pub base_repo_namespace: Option<String>,
    pub base_repo_name: String,
    pub base_repo_owner: String,
    pub base_ref: Option<String>,
    pub target_repo: String,
    pub project_url: String,
    pub commit_sha: String,
    pub user_login: String,
    pub comment: String,
}

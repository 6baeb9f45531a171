//! GitHub webhook extractors.

use super::{
    base_from, filtered, first_timestamp, malformed, own_comment, ExtractContext, Recognition,
};
use crate::events::{
    Event, InstallationEvent, InstallationStatus, IssueCommentAction, IssueCommentGithubEvent,
    PullRequestAction, PullRequestCommentAction, PullRequestCommentGithubEvent,
    PullRequestGithubEvent, PushEvent, ReleaseEvent, TriggerType,
};
use crate::field_access::{
    nested_array, nested_bool, nested_get, nested_non_empty_str, nested_str, nested_truthy,
    nested_u64,
};
use serde_json::Value;
use tracing::{debug, info};

/// `after` value GitHub sends when a branch is deleted.
const NULL_SHA: &str = "0000000000000000000000000000000000000000";

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// A pull request was opened, reopened or synchronized.
pub(crate) fn pull_request(payload: &Value) -> Recognition {
    if nested_truthy(payload, &["pull_request"]).is_none() {
        return Recognition::NotMine;
    }

    let action = nested_str(payload, &["action"]).and_then(|a| a.parse::<PullRequestAction>().ok());
    let pr_id = nested_u64(payload, &["number"]).filter(|id| *id != 0);
    let (Some(action), Some(pr_id)) = (action, pr_id) else {
        return Recognition::NotMine;
    };

    info!(pr_id, action = %action, "GitHub pull request event");

    // The upstream repository is configured for the service, not the fork, so
    // the head repository only identifies where the change comes from.
    let base_repo_namespace =
        nested_non_empty_str(payload, &["pull_request", "head", "repo", "owner", "login"]);
    let base_repo_name = nested_non_empty_str(payload, &["pull_request", "head", "repo", "name"]);
    let (Some(base_repo_namespace), Some(base_repo_name)) = (base_repo_namespace, base_repo_name)
    else {
        return malformed("No full name of the repository.");
    };

    let Some(head_sha) = nested_non_empty_str(payload, &["pull_request", "head", "sha"]) else {
        return malformed("Ref where the PR is coming from is not set.");
    };

    let Some(user_login) = nested_non_empty_str(payload, &["pull_request", "user", "login"]) else {
        return malformed("No GitHub login name from event.");
    };

    let target_repo_namespace =
        nested_non_empty_str(payload, &["pull_request", "base", "repo", "owner", "login"]);
    let target_repo_name = nested_non_empty_str(payload, &["pull_request", "base", "repo", "name"]);
    info!(
        target_namespace = ?target_repo_namespace,
        target_repo = ?target_repo_name,
        "Target repository"
    );

    let Some(project_url) = nested_non_empty_str(payload, &["repository", "html_url"]) else {
        return malformed("No repository URL in the event.");
    };

    let timestamp = first_timestamp(payload, &[&["pull_request", "updated_at"]]);
    let base = match base_from(TriggerType::PullRequest, timestamp) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::PullRequestGithub(PullRequestGithubEvent {
        base,
        action,
        pr_id,
        base_repo_namespace: base_repo_namespace.to_string(),
        base_repo_name: base_repo_name.to_string(),
        base_ref: head_sha.to_string(),
        target_repo_namespace: owned(target_repo_namespace),
        target_repo_name: owned(target_repo_name),
        project_url: project_url.to_string(),
        commit_sha: head_sha.to_string(),
        user_login: user_login.to_string(),
    }))
}

/// A comment on a pull request (GitHub reports it as an issue comment with
/// an `issue.pull_request` link).
pub(crate) fn pull_request_comment(payload: &Value, ctx: &ExtractContext<'_>) -> Recognition {
    if nested_truthy(payload, &["issue", "pull_request"]).is_none() {
        return Recognition::NotMine;
    }

    let action =
        nested_str(payload, &["action"]).and_then(|a| a.parse::<PullRequestCommentAction>().ok());
    let pr_id = nested_u64(payload, &["issue", "number"]).filter(|id| *id != 0);
    let (Some(action), Some(pr_id)) = (action, pr_id) else {
        return Recognition::NotMine;
    };

    let comment = nested_str(payload, &["comment", "body"]).unwrap_or_default();
    info!(pr_id, action = %action, comment, "GitHub PR comment event");

    let base_repo_namespace = nested_non_empty_str(payload, &["issue", "user", "login"]);
    let repo_name = nested_non_empty_str(payload, &["repository", "name"]);
    let (Some(base_repo_namespace), Some(repo_name)) = (base_repo_namespace, repo_name) else {
        return malformed("No full name of the repository.");
    };

    let Some(user_login) = nested_non_empty_str(payload, &["comment", "user", "login"]) else {
        return malformed("No GitHub login name from event.");
    };
    if ctx.config.is_bot_login(user_login) {
        return own_comment(user_login);
    }

    let target_repo_namespace = nested_non_empty_str(payload, &["repository", "owner", "login"]);
    let Some(project_url) = nested_non_empty_str(payload, &["repository", "html_url"]) else {
        return malformed("No repository URL in the event.");
    };

    let timestamp = first_timestamp(
        payload,
        &[&["comment", "updated_at"], &["comment", "created_at"]],
    );
    let base = match base_from(TriggerType::Comment, timestamp) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::PullRequestCommentGithub(PullRequestCommentGithubEvent {
        base,
        action,
        pr_id,
        base_repo_namespace: base_repo_namespace.to_string(),
        base_repo_name: Some(repo_name.to_string()),
        // the payload does not include the head ref
        base_ref: None,
        target_repo_namespace: owned(target_repo_namespace),
        target_repo_name: Some(repo_name.to_string()),
        project_url: project_url.to_string(),
        user_login: user_login.to_string(),
        comment: comment.to_string(),
    }))
}

/// A comment on a plain issue.
pub(crate) fn issue_comment(payload: &Value, ctx: &ExtractContext<'_>) -> Recognition {
    if nested_truthy(payload, &["issue", "pull_request"]).is_some() {
        return Recognition::NotMine;
    }

    let issue_id = nested_u64(payload, &["issue", "number"]).filter(|id| *id != 0);
    let action = nested_str(payload, &["action"]);
    let comment = nested_non_empty_str(payload, &["comment", "body"]);
    let (Some(issue_id), Some("created"), Some(comment)) = (issue_id, action, comment) else {
        return Recognition::NotMine;
    };

    info!(issue_id, comment, "GitHub issue comment event");

    let repo_namespace = nested_non_empty_str(payload, &["repository", "owner", "login"]);
    let repo_name = nested_non_empty_str(payload, &["repository", "name"]);
    if repo_namespace.is_none() || repo_name.is_none() {
        debug!("No full name of the repository.");
    }

    let Some(user_login) = nested_non_empty_str(payload, &["comment", "user", "login"]) else {
        return malformed("No GitHub login name from event.");
    };
    if ctx.config.is_bot_login(user_login) {
        return own_comment(user_login);
    }

    let target_repo = nested_non_empty_str(payload, &["repository", "full_name"]);
    let Some(project_url) = nested_non_empty_str(payload, &["repository", "html_url"]) else {
        return malformed("No repository URL in the event.");
    };

    let timestamp = first_timestamp(
        payload,
        &[&["comment", "updated_at"], &["comment", "created_at"]],
    );
    let base = match base_from(TriggerType::Comment, timestamp) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::IssueCommentGithub(IssueCommentGithubEvent {
        base,
        action: IssueCommentAction::Created,
        issue_id,
        repo_namespace: owned(repo_namespace),
        repo_name: owned(repo_name),
        target_repo: owned(target_repo),
        project_url: project_url.to_string(),
        user_login: user_login.to_string(),
        comment: comment.to_string(),
        tag_name: None,
    }))
}

/// A release was published.
pub(crate) fn release(payload: &Value) -> Recognition {
    if nested_str(payload, &["action"]) != Some("published")
        || nested_truthy(payload, &["release"]).is_none()
    {
        return Recognition::NotMine;
    }

    let repo_namespace = nested_non_empty_str(payload, &["repository", "owner", "login"]);
    let repo_name = nested_non_empty_str(payload, &["repository", "name"]);
    let (Some(repo_namespace), Some(repo_name)) = (repo_namespace, repo_name) else {
        return malformed("No full name of the repository.");
    };

    let Some(tag_name) = nested_non_empty_str(payload, &["release", "tag_name"]) else {
        return malformed("Release tag name is not set.");
    };

    let Some(project_url) = nested_non_empty_str(payload, &["repository", "html_url"]) else {
        return malformed("No repository URL in the event.");
    };

    info!(tag_name, repo_namespace, repo_name, "New release event");

    let timestamp = first_timestamp(
        payload,
        &[&["release", "published_at"], &["release", "created_at"]],
    );
    let base = match base_from(TriggerType::Release, timestamp) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::Release(ReleaseEvent {
        base,
        repo_namespace: repo_namespace.to_string(),
        repo_name: repo_name.to_string(),
        tag_name: tag_name.to_string(),
        project_url: project_url.to_string(),
    }))
}

/// A push to a branch.
///
/// Recognized by a top-level `ref` without GitHub's `ref_type` (branch or
/// tag creation) or GitLab's `object_kind`.
pub(crate) fn push(payload: &Value) -> Recognition {
    let is_push = nested_get(payload, &["ref"]).is_some_and(Value::is_string)
        && nested_get(payload, &["ref_type"]).is_none()
        && nested_get(payload, &["object_kind"]).is_none();
    if !is_push {
        return Recognition::NotMine;
    }

    let Some(raw_ref) = nested_non_empty_str(payload, &["ref"]) else {
        return malformed("No ref info from event.");
    };
    let Some(before) = nested_non_empty_str(payload, &["before"]) else {
        return malformed("No 'before' commit in push event.");
    };
    let Some(pusher) = nested_non_empty_str(payload, &["pusher", "name"]) else {
        return malformed("No pusher in push event.");
    };

    // The webhook payload and the Events API payload name the head differently.
    let head_commit = nested_non_empty_str(payload, &["head"])
        .or_else(|| nested_non_empty_str(payload, &["after"]))
        .or_else(|| nested_non_empty_str(payload, &["head_commit", "id"]));
    let Some(head_commit) = head_commit else {
        return malformed("No head commit in push event.");
    };

    if nested_bool(payload, &["deleted"]).unwrap_or(false) || head_commit == NULL_SHA {
        return filtered(format!(
            "GitHub push event on '{}' by {} to delete branch",
            raw_ref, pusher
        ));
    }

    let number_of_commits = nested_u64(payload, &["size"])
        .or_else(|| nested_array(payload, &["commits"]).map(|c| c.len() as u64));
    if number_of_commits.is_none() {
        debug!("No number of commits info from event.");
    }

    let git_ref = raw_ref.splitn(3, '/').last().unwrap_or(raw_ref);
    info!(
        git_ref = raw_ref,
        before = short_sha(before),
        head = short_sha(head_commit),
        pusher,
        commits = ?number_of_commits,
        "GitHub push event"
    );

    let repo_namespace = nested_non_empty_str(payload, &["repository", "owner", "login"]);
    let repo_name = nested_non_empty_str(payload, &["repository", "name"]);
    let (Some(repo_namespace), Some(repo_name)) = (repo_namespace, repo_name) else {
        return malformed("No full name of the repository.");
    };

    let timestamp = first_timestamp(payload, &[&["head_commit", "timestamp"]]);
    let base = match base_from(TriggerType::Push, timestamp) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::PushGithub(PushEvent {
        base,
        repo_namespace: repo_namespace.to_string(),
        repo_name: repo_name.to_string(),
        git_ref: git_ref.to_string(),
        project_url: owned(nested_non_empty_str(payload, &["repository", "html_url"])),
        commit_sha: head_commit.to_string(),
    }))
}

pub(crate) fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

/// The GitHub App was installed into an account or given new repositories.
pub(crate) fn installation(payload: &Value) -> Recognition {
    // The `installation` key alone is present on every App webhook.
    if nested_truthy(payload, &["installation", "account"]).is_none() {
        return Recognition::NotMine;
    }

    let action = nested_str(payload, &["action"]).unwrap_or_default();
    if action != "created" && action != "added" {
        return filtered(format!("Installation action '{}' is not processed", action));
    }

    let Some(installation_id) = nested_u64(payload, &["installation", "id"]) else {
        return malformed("No installation id from event.");
    };

    // 'created' lists repositories in `repositories`, 'added' in `repositories_added`.
    let repositories = nested_array(payload, &["repositories"])
        .filter(|r| !r.is_empty())
        .or_else(|| nested_array(payload, &["repositories_added"]))
        .map(|repos| {
            repos
                .iter()
                .filter_map(|r| nested_str(r, &["full_name"]).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    info!(installation_id, action, "GitHub App installation event");

    // namespace (user or organization) the app has been installed into
    let account_login = nested_non_empty_str(payload, &["installation", "account", "login"]);
    let account_id = nested_u64(payload, &["installation", "account", "id"]);
    let account_url = nested_non_empty_str(payload, &["installation", "account", "url"]);
    let account_type = nested_non_empty_str(payload, &["installation", "account", "type"]);
    let (Some(account_login), Some(account_id), Some(account_url), Some(account_type)) =
        (account_login, account_id, account_url, account_type)
    else {
        return malformed("Incomplete installation account in event.");
    };

    let sender_id = nested_u64(payload, &["sender", "id"]);
    let sender_login = nested_non_empty_str(payload, &["sender", "login"]);
    let (Some(sender_id), Some(sender_login)) = (sender_id, sender_login) else {
        return malformed("No sender in installation event.");
    };

    let Some(created_at) = nested_get(payload, &["installation", "created_at"]) else {
        return malformed("No installation creation time in event.");
    };
    let base = match base_from(TriggerType::Installation, Some(created_at)) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    debug!(account_login, sender_login, ?repositories, "Installation details");

    Recognition::recognized(Event::Installation(InstallationEvent {
        base,
        installation_id,
        account_login: account_login.to_string(),
        account_id,
        account_url: account_url.to_string(),
        account_type: account_type.to_string(),
        repositories,
        sender_id,
        sender_login: sender_login.to_string(),
        status: InstallationStatus::Waiting,
    }))
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;

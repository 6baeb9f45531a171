//! GitLab webhook extractors.
//!
//! GitLab names the payload kind in `object_kind`; notes (comments) are
//! further split by whether they carry a `merge_request` or an `issue`.

use super::github::short_sha;
use super::{
    base_from, filtered, first_timestamp, malformed, own_comment, ExtractContext, Recognition,
};
use crate::events::{
    Event, GitlabEventAction, IssueCommentGitlabEvent, MergeRequestCommentGitlabEvent,
    MergeRequestGitlabEvent, PushEvent, TriggerType,
};
use crate::field_access::{
    nested_array, nested_get, nested_non_empty_str, nested_str, nested_truthy, nested_u64,
    PathSegment,
};
use crate::services::ProjectHandle;
use serde_json::Value;
use tracing::{info, warn};

fn object_kind(payload: &Value) -> Option<&str> {
    nested_str(payload, &["object_kind"])
}

/// Project handle for a repository URL taken from `path`.
fn project_at<'a>(
    payload: &'a Value,
    path: &[&str],
    side: &str,
) -> Result<(&'a str, ProjectHandle), Recognition> {
    let Some(url) = nested_non_empty_str(payload, path) else {
        return Err(malformed(format!("{} project url not found in the event.", side)));
    };
    let Some(project) = ProjectHandle::from_url(url) else {
        return Err(malformed(format!("{} project url '{}' cannot be parsed.", side, url)));
    };
    info!(
        url,
        namespace = %project.namespace,
        repo = %project.repo,
        "{} project",
        side
    );
    Ok((url, project))
}

/// A merge request was opened, reopened or updated.
pub(crate) fn merge_request(payload: &Value) -> Recognition {
    if object_kind(payload) != Some("merge_request") {
        return Recognition::NotMine;
    }

    let state = nested_str(payload, &["object_attributes", "state"]);
    if state != Some("opened") {
        return filtered(format!("Merge request in state {:?} is not processed", state));
    }
    let action =
        GitlabEventAction::from_raw(nested_str(payload, &["object_attributes", "action"]));

    let Some(username) = nested_non_empty_str(payload, &["user", "username"]) else {
        return malformed("No Gitlab username from event.");
    };
    let Some(object_id) = nested_u64(payload, &["object_attributes", "id"]) else {
        return malformed("No object id from the event.");
    };
    let Some(object_iid) = nested_u64(payload, &["object_attributes", "iid"]) else {
        return malformed("No object iid from the event.");
    };

    let (_, source) = match project_at(payload, &["object_attributes", "source", "web_url"], "Source") {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };
    let source_repo_branch = nested_non_empty_str(payload, &["object_attributes", "source_branch"]);

    let (target_url, target) = match project_at(payload, &["project", "web_url"], "Target") {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };
    let target_repo_branch = nested_non_empty_str(payload, &["object_attributes", "target_branch"]);

    let Some(commit_sha) = nested_non_empty_str(payload, &["object_attributes", "last_commit", "id"])
    else {
        return malformed("No commit_sha from the event.");
    };

    info!(object_iid, action = %action, username, "GitLab merge request event");

    let timestamp = first_timestamp(
        payload,
        &[&["object_attributes", "updated_at"], &["object_attributes", "created_at"]],
    );
    let base = match base_from(TriggerType::MergeRequest, timestamp) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::MergeRequestGitlab(MergeRequestGitlabEvent {
        base,
        action,
        username: username.to_string(),
        object_id,
        object_iid,
        source_repo_namespace: source.namespace,
        source_repo_name: source.repo,
        source_repo_branch: source_repo_branch.map(str::to_string),
        target_repo_namespace: target.namespace,
        target_repo_name: target.repo,
        target_repo_branch: target_repo_branch.map(str::to_string),
        project_url: target_url.to_string(),
        commit_sha: commit_sha.to_string(),
    }))
}

/// A note on an open merge request.
pub(crate) fn merge_request_comment(payload: &Value, ctx: &ExtractContext<'_>) -> Recognition {
    if object_kind(payload) != Some("note")
        || nested_truthy(payload, &["merge_request"]).is_none()
    {
        return Recognition::NotMine;
    }

    let state = nested_str(payload, &["merge_request", "state"]);
    if state != Some("opened") {
        return filtered(format!("Merge request in state {:?} is not processed", state));
    }
    let action = GitlabEventAction::from_raw(nested_str(payload, &["merge_request", "action"]));

    let object_iid = nested_u64(payload, &["merge_request", "iid"]);
    if object_iid.is_none() {
        warn!("No object iid from the event.");
    }
    let object_id = nested_u64(payload, &["merge_request", "id"]);
    if object_id.is_none() {
        warn!("No object id from the event.");
    }

    let comment = nested_str(payload, &["object_attributes", "note"]);
    info!(?object_id, ?object_iid, ?comment, action = %action, "GitLab MR comment event");

    let (_, source) = match project_at(payload, &["merge_request", "source", "web_url"], "Source") {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };
    let (target_url, target) = match project_at(payload, &["project", "web_url"], "Target") {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };

    let Some(username) = nested_non_empty_str(payload, &["user", "username"]) else {
        return malformed("No Gitlab username from event.");
    };
    if ctx.config.is_bot_login(username) {
        return own_comment(username);
    }

    let Some(commit_sha) = nested_non_empty_str(payload, &["merge_request", "last_commit", "id"])
    else {
        return malformed("No commit_sha from the event.");
    };

    let timestamp = first_timestamp(
        payload,
        &[&["object_attributes", "updated_at"], &["object_attributes", "created_at"]],
    );
    let base = match base_from(TriggerType::Comment, timestamp) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::MergeRequestCommentGitlab(MergeRequestCommentGitlabEvent {
        base,
        action,
        object_id,
        object_iid,
        source_repo_namespace: source.namespace,
        source_repo_name: source.repo,
        target_repo_namespace: target.namespace,
        target_repo_name: target.repo,
        project_url: target_url.to_string(),
        username: username.to_string(),
        comment: comment.map(str::to_string),
        commit_sha: commit_sha.to_string(),
    }))
}

/// A note on an open issue.
pub(crate) fn issue_comment(payload: &Value, ctx: &ExtractContext<'_>) -> Recognition {
    if object_kind(payload) != Some("note") || nested_truthy(payload, &["issue"]).is_none() {
        return Recognition::NotMine;
    }

    let Some(issue_id) = nested_u64(payload, &["issue", "iid"]) else {
        return malformed("No issue id from the event.");
    };
    let Some(comment) = nested_non_empty_str(payload, &["object_attributes", "note"]) else {
        return malformed("No note from the event.");
    };
    let Some(state) = nested_non_empty_str(payload, &["issue", "state"]) else {
        return malformed("No state from the event.");
    };
    if state != "opened" {
        return filtered(format!("Issue in state '{}' is not processed", state));
    }
    let action = GitlabEventAction::from_raw(nested_str(payload, &["object_attributes", "action"]));

    info!(issue_id, comment, action = %action, "GitLab issue comment event");

    let (project_url, project) = match project_at(payload, &["project", "web_url"], "Target") {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };

    let Some(username) = nested_non_empty_str(payload, &["user", "username"]) else {
        return malformed("No Gitlab username from event.");
    };
    if ctx.config.is_bot_login(username) {
        return own_comment(username);
    }

    let timestamp = first_timestamp(
        payload,
        &[&["object_attributes", "updated_at"], &["object_attributes", "created_at"]],
    );
    let base = match base_from(TriggerType::Comment, timestamp) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::IssueCommentGitlab(IssueCommentGitlabEvent {
        base,
        action,
        issue_id,
        repo_namespace: project.namespace,
        repo_name: project.repo,
        project_url: project_url.to_string(),
        username: username.to_string(),
        comment: comment.to_string(),
        tag_name: None,
    }))
}

/// A push to a branch.
pub(crate) fn push(payload: &Value) -> Recognition {
    if object_kind(payload) != Some("push") {
        return Recognition::NotMine;
    }

    let Some(raw_ref) = nested_non_empty_str(payload, &["ref"]) else {
        return malformed("No ref info from event.");
    };
    let Some(before) = nested_non_empty_str(payload, &["before"]) else {
        return malformed("No 'before' commit in push event.");
    };
    let Some(pusher) = nested_non_empty_str(payload, &["user_username"]) else {
        return malformed("No pusher in push event.");
    };

    if nested_str(payload, &["after"]).is_some_and(|after| after.starts_with("0000000")) {
        return filtered(format!(
            "GitLab push event on '{}' by {} to delete branch",
            raw_ref, pusher
        ));
    }

    let commits = nested_array(payload, &["commits"]).map(Vec::len).unwrap_or(0);
    let last_commit = [
        PathSegment::from("commits"),
        PathSegment::Index(commits.saturating_sub(1)),
        PathSegment::from("id"),
    ];
    let Some(head_commit) = nested_non_empty_str(payload, &last_commit) else {
        return malformed("No commit_id info from event.");
    };
    let last_commit_time = [
        PathSegment::from("commits"),
        PathSegment::Index(commits.saturating_sub(1)),
        PathSegment::from("timestamp"),
    ];
    let base = match base_from(TriggerType::Push, nested_get(payload, &last_commit_time)) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    let number_of_commits = nested_u64(payload, &["total_commits_count"]);
    if number_of_commits.is_none() {
        warn!("No number of commits info from event.");
    }

    let git_ref = raw_ref.splitn(3, '/').last().unwrap_or(raw_ref);
    info!(
        git_ref = raw_ref,
        before = short_sha(before),
        head = short_sha(head_commit),
        pusher,
        commits = ?number_of_commits,
        "GitLab push event"
    );

    let (project_url, project) = match project_at(payload, &["project", "web_url"], "Target") {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };

    Recognition::recognized(Event::PushGitlab(PushEvent {
        base,
        repo_namespace: project.namespace,
        repo_name: project.repo,
        git_ref: git_ref.to_string(),
        project_url: Some(project_url.to_string()),
        commit_sha: head_commit.to_string(),
    }))
}

#[cfg(test)]
#[path = "gitlab_tests.rs"]
mod tests;

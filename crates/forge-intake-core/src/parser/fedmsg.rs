//! Fedora message bus extractors.
//!
//! Bus messages are told apart by their `topic`. The Copr and Koji
//! extractors look up the build submitted earlier to learn which
//! repository and commit the message belongs to.

use super::{base_from, debug_skip, filtered, malformed, ExtractContext, ParseError, Recognition};
use crate::events::{
    CoprBuildEvent, CoprBuildKind, CoprBuildStatus, DistGitCommitEvent, Event,
    FedmsgTopic, KojiBuildEvent, KojiTaskState, TriggerType,
};
use crate::field_access::{
    nested_array, nested_get, nested_non_empty_str, nested_str, nested_truthy, nested_u64,
    scalar_to_string,
};
use crate::services::BuildStore;
use serde_json::Value;
use tracing::{info, warn};

fn topic(payload: &Value) -> Option<FedmsgTopic> {
    nested_str(payload, &["topic"])?.parse().ok()
}

/// New commits pushed to a dist-git repository that mirrors an upstream.
pub(crate) fn dist_git_commit(payload: &Value, ctx: &ExtractContext<'_>) -> Recognition {
    let Some(topic @ FedmsgTopic::DistGitPush) = topic(payload) else {
        return Recognition::NotMine;
    };
    info!(topic = %topic, "Dist-git commit event");

    let (Some(dg_repo_namespace), Some(dg_repo_name)) = (
        nested_non_empty_str(payload, &["commit", "namespace"]),
        nested_non_empty_str(payload, &["commit", "repo"]),
    ) else {
        return malformed("No full name of the repository.");
    };
    let (Some(dg_branch), Some(dg_rev)) = (
        nested_non_empty_str(payload, &["commit", "branch"]),
        nested_non_empty_str(payload, &["commit", "rev"]),
    ) else {
        return malformed("Target branch/rev for the new commits is not set.");
    };

    info!(
        dg_repo_namespace,
        dg_repo_name, dg_rev, dg_branch, "New commits added to dist-git repo"
    );

    let Some(project_to_sync) = ctx.config.get_project_to_sync(dg_repo_name, dg_branch) else {
        return filtered("No matching upstream repo for syncing found.");
    };

    let base = match base_from(TriggerType::Commit, nested_get(payload, &["timestamp"])) {
        Ok(base) => base,
        Err(e) => return malformed(e.to_string()),
    };

    Recognition::recognized(Event::DistGitCommit(DistGitCommitEvent {
        base,
        topic,
        repo_namespace: project_to_sync.repo_namespace.clone(),
        repo_name: project_to_sync.repo_name.clone(),
        branch: project_to_sync.branch.clone(),
        project_url: project_to_sync.upstream_url(),
        dg_repo_namespace: dg_repo_namespace.to_string(),
        dg_repo_name: dg_repo_name.to_string(),
        dg_branch: dg_branch.to_string(),
        dg_rev: dg_rev.to_string(),
        dg_project_url: format!(
            "{}/{}/{}",
            ctx.config.dist_git_url.trim_end_matches('/'),
            dg_repo_namespace,
            dg_repo_name
        ),
    }))
}

/// A Copr build started or ended.
///
/// A build unknown to the store is still recognized, with
/// `build_record_found` cleared so the event fails its pre-check.
pub(crate) async fn copr_build(
    payload: &Value,
    store: &dyn BuildStore,
) -> Result<Recognition, ParseError> {
    let Some((topic, kind)) =
        topic(payload).and_then(|t| CoprBuildKind::from_topic(t).map(|kind| (t, kind)))
    else {
        return Ok(Recognition::NotMine);
    };
    info!(what = ?nested_str(payload, &["what"]), "Copr event");

    let Some(build_id) = nested_u64(payload, &["build"]) else {
        return Ok(malformed("No build id in Copr event."));
    };
    let Some(chroot) = nested_non_empty_str(payload, &["chroot"]) else {
        return Ok(malformed("No chroot in Copr event."));
    };
    let Some(owner) = nested_non_empty_str(payload, &["owner"]) else {
        return Ok(malformed("No owner in Copr event."));
    };
    let Some(project_name) = nested_non_empty_str(payload, &["copr"]) else {
        return Ok(malformed("No Copr project name in Copr event."));
    };
    let status = match nested_get(payload, &["status"]).map(CoprBuildStatus::from_json) {
        Some(Ok(status)) => status,
        Some(Err(e)) => return Ok(malformed(e.to_string())),
        None => return Ok(malformed("No status in Copr event.")),
    };
    let base = match base_from(TriggerType::CoprBuild, nested_get(payload, &["timestamp"])) {
        Ok(base) => base,
        Err(e) => return Ok(malformed(e.to_string())),
    };

    let record = store
        .copr_build(build_id)
        .await
        .map_err(ParseError::build_store)?;
    if record.is_none() {
        warn!(build_id, "Build id not in the build store");
    }

    let mut event = CoprBuildEvent {
        base,
        kind,
        topic,
        build_id,
        chroot: chroot.to_string(),
        status,
        owner: owner.to_string(),
        project_name: project_name.to_string(),
        pkg: nested_non_empty_str(payload, &["pkg"]).map(str::to_string),
        base_repo_namespace: None,
        base_repo_name: None,
        pr_id: None,
        git_ref: None,
        commit_sha: None,
        project_url: None,
        build_record_found: record.is_some(),
    };
    if let Some(record) = record {
        event.base_repo_namespace = Some(record.repo_namespace);
        event.base_repo_name = Some(record.repo_name);
        event.pr_id = record.pr_id;
        event.git_ref = record.git_ref;
        event.commit_sha = Some(record.commit_sha);
        event.project_url = Some(record.project_url);
    }

    Ok(Recognition::recognized(Event::CoprBuild(event)))
}

/// A Koji task changed state.
pub(crate) async fn koji_build(
    payload: &Value,
    store: &dyn BuildStore,
) -> Result<Recognition, ParseError> {
    if topic(payload) != Some(FedmsgTopic::KojiTaskStateChange) {
        return Ok(Recognition::NotMine);
    }

    let Some(build_id) = nested_u64(payload, &["id"]) else {
        return Ok(malformed("No task id in Koji event."));
    };
    info!(build_id, "Koji event");

    if nested_truthy(payload, &["info", "state"]).is_none() {
        return Ok(debug_skip("Cannot find build state."));
    }

    let state = match nested_get(payload, &["new"]).map(KojiTaskState::from_json).transpose() {
        Ok(state) => state,
        Err(e) => return Ok(malformed(e.to_string())),
    };
    let old_state = match nested_get(payload, &["old"]).map(KojiTaskState::from_json).transpose() {
        Ok(state) => state,
        Err(e) => return Ok(malformed(e.to_string())),
    };

    let rpm_build_task_id = nested_array(payload, &["info", "children"])
        .into_iter()
        .flatten()
        .find(|child| nested_str(child, &["method"]) == Some("buildArch"))
        .and_then(|child| nested_u64(child, &["id"]));

    let base = match base_from(TriggerType::KojiResults, nested_get(payload, &["timestamp"])) {
        Ok(base) => base,
        Err(e) => return Ok(malformed(e.to_string())),
    };

    let record = store
        .koji_build(build_id)
        .await
        .map_err(ParseError::build_store)?;

    Ok(Recognition::recognized(Event::KojiBuild(KojiBuildEvent {
        base,
        build_id,
        state,
        old_state,
        start_time: nested_get(payload, &["info", "start_time"]).and_then(scalar_to_string),
        completion_time: nested_get(payload, &["info", "completion_time"])
            .and_then(scalar_to_string),
        rpm_build_task_id,
        project_url: record.as_ref().map(|r| r.project_url.clone()),
        commit_sha: record.as_ref().map(|r| r.commit_sha.clone()),
        pr_id: record.and_then(|r| r.pr_id),
    })))
}

#[cfg(test)]
#[path = "fedmsg_tests.rs"]
mod tests;

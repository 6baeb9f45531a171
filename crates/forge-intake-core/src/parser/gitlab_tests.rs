//! Tests for the GitLab webhook extractors.

use super::*;
use crate::config::ServiceConfig;
use serde_json::json;

fn merge_request_payload(state: &str, action: &str) -> Value {
    json!({
        "object_kind": "merge_request",
        "user": {"username": "shreyaspapi"},
        "project": {"web_url": "https://gitlab.com/testing-packit/hello-there"},
        "object_attributes": {
            "id": 58759529,
            "iid": 1,
            "state": state,
            "action": action,
            "source_branch": "test1",
            "target_branch": "master",
            "source": {"web_url": "https://gitlab.com/shreyaspapi/hello-there"},
            "last_commit": {"id": "1f6a716aa7a618a9ffe56970d77177d99d100022"}
        }
    })
}

fn merge_request_note_payload(username: &str) -> Value {
    json!({
        "object_kind": "note",
        "user": {"username": username},
        "project": {"web_url": "https://gitlab.com/testing-packit/hello-there"},
        "object_attributes": {"note": "/packit test", "noteable_type": "MergeRequest"},
        "merge_request": {
            "id": 59533079,
            "iid": 2,
            "state": "opened",
            "source": {"web_url": "https://gitlab.com/testing-packit/hello-there"},
            "last_commit": {"id": "45e272a57335e4e308f3176df6e9226a9e7805a9"}
        }
    })
}

fn issue_note_payload(state: &str) -> Value {
    json!({
        "object_kind": "note",
        "user": {"username": "shreyaspapi"},
        "project": {"web_url": "https://gitlab.com/testing-packit/hello-there"},
        "object_attributes": {"note": "/packit propose-update", "noteable_type": "Issue"},
        "issue": {"iid": 1, "state": state}
    })
}

fn push_payload() -> Value {
    json!({
        "object_kind": "push",
        "ref": "refs/heads/main",
        "before": "0e27f070efa4bef2a7c0168f07a0ac36ef90d8cb",
        "after": "cb2859505e101785097e082529dced35bbee0c8f",
        "user_username": "shreyaspapi",
        "total_commits_count": 2,
        "commits": [
            {"id": "0e27f070efa4bef2a7c0168f07a0ac36ef90d8cb"},
            {"id": "cb2859505e101785097e082529dced35bbee0c8f"}
        ],
        "project": {"web_url": "https://gitlab.com/testing-packit/hello-there"}
    })
}

fn ctx(config: &ServiceConfig) -> ExtractContext<'_> {
    ExtractContext { config }
}

// ============================================================================
// Merge request tests
// ============================================================================

mod merge_request_tests {
    use super::*;

    #[test]
    fn test_opened_merge_request() {
        let event = merge_request(&merge_request_payload("opened", "open"))
            .into_event()
            .unwrap();

        let Event::MergeRequestGitlab(mr) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(mr.action, GitlabEventAction::Opened);
        assert_eq!(mr.object_iid, 1);
        assert_eq!(mr.source_repo_namespace, "shreyaspapi");
        assert_eq!(mr.target_repo_namespace, "testing-packit");
        assert_eq!(mr.target_repo_name, "hello-there");
        assert_eq!(mr.source_repo_branch.as_deref(), Some("test1"));
        assert_eq!(mr.project_url, "https://gitlab.com/testing-packit/hello-there");
        assert_eq!(mr.commit_sha, "1f6a716aa7a618a9ffe56970d77177d99d100022");
    }

    /// Verify that the raw action is mapped onto the known action set.
    #[test]
    fn test_merge_request_time_is_update_time() {
        let mut payload = merge_request_payload("opened", "open");
        payload["object_attributes"]["created_at"] = json!("2019-12-01 08:00:00 UTC");
        payload["object_attributes"]["updated_at"] = json!("2019-12-04 10:20:30 UTC");

        let first = merge_request(&payload).into_event().unwrap();
        let second = merge_request(&payload).into_event().unwrap();

        assert_eq!(first.created_at().timestamp(), 1575454830);
        assert_eq!(first, second);
    }

    #[test]
    fn test_update_action() {
        let event = merge_request(&merge_request_payload("opened", "update"))
            .into_event()
            .unwrap();

        let Event::MergeRequestGitlab(mr) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(mr.action, GitlabEventAction::Update);
    }

    #[test]
    fn test_closed_merge_request_is_filtered() {
        let recognition = merge_request(&merge_request_payload("closed", "close"));

        assert!(matches!(recognition, Recognition::Rejected { .. }));
    }

    #[test]
    fn test_unparsable_source_url_is_rejected() {
        let mut payload = merge_request_payload("opened", "open");
        payload["object_attributes"]["source"]["web_url"] = json!("not a url");

        assert!(matches!(merge_request(&payload), Recognition::Rejected { .. }));
    }

    #[test]
    fn test_other_kinds_are_not_mine() {
        assert_eq!(merge_request(&push_payload()), Recognition::NotMine);
        assert_eq!(merge_request(&json!({"object_kind": "note"})), Recognition::NotMine);
    }
}

// ============================================================================
// Note tests
// ============================================================================

mod note_tests {
    use super::*;

    #[test]
    fn test_merge_request_comment() {
        let config = ServiceConfig::default();

        let event = merge_request_comment(&merge_request_note_payload("shreyaspapi"), &ctx(&config))
            .into_event()
            .unwrap();

        let Event::MergeRequestCommentGitlab(comment) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(comment.object_iid, Some(2));
        assert_eq!(comment.comment.as_deref(), Some("/packit test"));
        assert_eq!(comment.username, "shreyaspapi");
        assert_eq!(comment.commit_sha, "45e272a57335e4e308f3176df6e9226a9e7805a9");
    }

    /// Verify that a missing iid does not prevent recognition.
    #[test]
    fn test_merge_request_comment_without_iid() {
        let config = ServiceConfig::default();
        let mut payload = merge_request_note_payload("shreyaspapi");
        payload["merge_request"]["iid"] = Value::Null;

        let event = merge_request_comment(&payload, &ctx(&config))
            .into_event()
            .unwrap();

        assert_eq!(event.pr_id(), None);
    }

    #[test]
    fn test_bot_merge_request_comment_is_rejected() {
        let config = ServiceConfig::default();

        let recognition = merge_request_comment(
            &merge_request_note_payload("packit-as-a-service[bot]"),
            &ctx(&config),
        );

        assert!(matches!(recognition, Recognition::Rejected { .. }));
    }

    /// Verify that merge request notes and issue notes are told apart.
    #[test]
    fn test_note_kinds_are_exclusive() {
        let config = ServiceConfig::default();

        assert_eq!(
            issue_comment(&merge_request_note_payload("shreyaspapi"), &ctx(&config)),
            Recognition::NotMine
        );
        assert_eq!(
            merge_request_comment(&issue_note_payload("opened"), &ctx(&config)),
            Recognition::NotMine
        );
    }

    #[test]
    fn test_issue_comment() {
        let config = ServiceConfig::default();

        let event = issue_comment(&issue_note_payload("opened"), &ctx(&config))
            .into_event()
            .unwrap();

        let Event::IssueCommentGitlab(comment) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(comment.issue_id, 1);
        assert_eq!(comment.repo_namespace, "testing-packit");
        assert_eq!(comment.comment, "/packit propose-update");
        assert_eq!(comment.tag_name, None);
    }

    #[test]
    fn test_closed_issue_comment_is_filtered() {
        let config = ServiceConfig::default();

        let recognition = issue_comment(&issue_note_payload("closed"), &ctx(&config));

        assert!(matches!(recognition, Recognition::Rejected { .. }));
    }
}

// ============================================================================
// Push tests
// ============================================================================

mod push_tests {
    use super::*;

    #[test]
    fn test_push_uses_last_commit() {
        let event = push(&push_payload()).into_event().unwrap();

        let Event::PushGitlab(pushed) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(pushed.git_ref, "main");
        assert_eq!(pushed.commit_sha, "cb2859505e101785097e082529dced35bbee0c8f");
        assert_eq!(pushed.repo_namespace, "testing-packit");
        assert_eq!(
            pushed.project_url.as_deref(),
            Some("https://gitlab.com/testing-packit/hello-there")
        );
    }

    #[test]
    fn test_push_time_is_last_commit_time() {
        let mut payload = push_payload();
        payload["commits"][1]["timestamp"] = json!("2019-12-04T10:20:30+00:00");

        let event = push(&payload).into_event().unwrap();

        assert_eq!(event.created_at().timestamp(), 1575454830);
    }

    /// Verify that branch deletions are filtered out.
    #[test]
    fn test_branch_deletion_is_filtered() {
        let mut payload = push_payload();
        payload["after"] = json!("0000000000000000000000000000000000000000");

        assert!(matches!(push(&payload), Recognition::Rejected { .. }));
    }

    #[test]
    fn test_push_without_commits_is_rejected() {
        let mut payload = push_payload();
        payload["commits"] = json!([]);

        assert!(matches!(push(&payload), Recognition::Rejected { .. }));
    }

    #[test]
    fn test_missing_commit_count_is_tolerated() {
        let mut payload = push_payload();
        payload["total_commits_count"] = Value::Null;

        assert!(push(&payload).is_recognized());
    }
}

//! Tests for the Pagure topic dispatch table.

use super::*;
use serde_json::json;

const HOST: &str = "git.stg.centos.org";

fn pull_request_message(kind: &str) -> Value {
    json!({
        "topic": format!("{}/{}", HOST, kind),
        "agent": "packit",
        "pullrequest": {
            "id": 12,
            "branch": "master",
            "commit_stop": "bf9701dea5a167caa7a1afa0759342aa0bf0d8fd",
            "user": {"name": "packit"},
            "project": {
                "name": "packit-hello-world",
                "namespace": "source-git",
                "url_path": "source-git/packit-hello-world"
            },
            "repo_from": {
                "name": "packit-hello-world",
                "namespace": "source-git",
                "user": {"name": "packit"}
            },
            "comments": [
                {"comment": "first"},
                {"comment": "/packit build"}
            ]
        }
    })
}

fn push_message() -> Value {
    json!({
        "topic": format!("{}/git.receive", HOST),
        "branch": "master",
        "end_commit": "bf9701dea5a167caa7a1afa0759342aa0bf0d8fd",
        "repo": {
            "name": "packit-hello-world",
            "namespace": "source-git",
            "url_path": "source-git/packit-hello-world"
        }
    })
}

fn parser() -> CentosEventParser {
    CentosEventParser::new(Arc::new(ServiceConfig::default()))
}

// ============================================================================
// Routing tests
// ============================================================================

mod routing_tests {
    use super::*;

    #[test]
    fn test_routes_are_unique() {
        for (i, route) in TOPIC_ROUTES.iter().enumerate() {
            assert!(
                TOPIC_ROUTES[i + 1..]
                    .iter()
                    .all(|other| other.topic_suffix != route.topic_suffix),
                "duplicate route {}",
                route.topic_suffix
            );
        }
    }

    /// Verify that the pull request update maps onto `synchronize`.
    #[test]
    fn test_find_route() {
        let route = TopicRoute::find("pull-request.updated").unwrap();
        assert_eq!(
            route.decoder,
            PagureDecoder::PullRequest(PullRequestAction::Synchronize)
        );
        assert!(TopicRoute::find("pull-request.tag.added").is_none());
    }

    /// Verify that source and git_topic are written into the payload.
    #[test]
    fn test_topic_is_split_into_payload() {
        let mut payload = json!({"topic": format!("{}/pull-request.tag.added", HOST)});

        assert!(parser().parse_event(&mut payload).is_none());
        assert_eq!(payload["source"], json!(HOST));
        assert_eq!(payload["git_topic"], json!("pull-request.tag.added"));
    }

    #[test]
    fn test_malformed_topics_are_dropped() {
        assert!(parser().parse_event(&mut json!({"topic": "no-slash"})).is_none());
        assert!(parser().parse_event(&mut json!({"agent": "packit"})).is_none());
        assert!(parser().parse_event(&mut json!("git.centos.org/git.receive")).is_none());
    }
}

// ============================================================================
// Decoder tests
// ============================================================================

mod decoder_tests {
    use super::*;

    #[test]
    fn test_pull_request_new() {
        let event = parser()
            .parse_event(&mut pull_request_message("pull-request.new"))
            .unwrap();

        let Event::PullRequestPagure(pr) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(pr.action, PullRequestAction::Opened);
        assert_eq!(pr.pr_id, 12);
        assert_eq!(pr.base_ref, "master");
        assert_eq!(pr.base_repo_namespace.as_deref(), Some("source-git"));
        assert_eq!(
            pr.project_url,
            "https://git.stg.centos.org/source-git/packit-hello-world"
        );
        assert_eq!(pr.user_login, "packit");
    }

    #[test]
    fn test_pull_request_reopened() {
        let event = parser()
            .parse_event(&mut pull_request_message("pull-request.reopened"))
            .unwrap();

        let Event::PullRequestPagure(pr) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(pr.action, PullRequestAction::Reopened);
    }

    /// Verify that an added comment is read from the last comment in the list.
    #[test]
    fn test_comment_added() {
        let mut payload = pull_request_message("pull-request.comment.added");
        payload["agent"] = json!("phracek");

        let event = parser().parse_event(&mut payload).unwrap();

        let Event::PullRequestCommentPagure(comment) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(comment.action, PullRequestCommentAction::Created);
        assert_eq!(comment.comment, "/packit build");
        assert_eq!(comment.user_login, "phracek");
        assert_eq!(comment.base_ref, None);
        assert_eq!(comment.target_repo, "packit-hello-world");
    }

    #[test]
    fn test_comment_edited() {
        let mut payload = pull_request_message("pull-request.comment.edited");
        payload["agent"] = json!("phracek");
        payload["comment"] = json!({"comment": "/packit copr-build"});

        let event = parser().parse_event(&mut payload).unwrap();

        assert_eq!(event.comment(), Some("/packit copr-build"));
    }

    #[test]
    fn test_bot_comment_is_dropped() {
        let mut payload = pull_request_message("pull-request.comment.added");
        payload["agent"] = json!("packit-as-a-service[bot]");

        assert!(parser().parse_event(&mut payload).is_none());
    }

    #[test]
    fn test_missing_required_field_is_dropped() {
        let mut payload = pull_request_message("pull-request.new");
        payload["pullrequest"]["commit_stop"] = Value::Null;

        assert!(parser().parse_event(&mut payload).is_none());
    }

    /// Verify that Pagure's textual epoch seconds become the event time.
    #[test]
    fn test_pull_request_time_is_last_update() {
        let mut message = pull_request_message("pull-request.updated");
        message["pullrequest"]["date_created"] = json!("1582000000");
        message["pullrequest"]["last_updated"] = json!("1582031453");

        let first = parser().parse_event(&mut message.clone()).unwrap();
        let second = parser().parse_event(&mut message).unwrap();

        assert_eq!(first.created_at().timestamp(), 1582031453);
        assert_eq!(first, second);
    }

    #[test]
    fn test_push_time_is_envelope_time() {
        let mut message = push_message();
        message["timestamp"] = json!(1582031453);

        let event = parser().parse_event(&mut message).unwrap();

        assert_eq!(event.created_at().timestamp(), 1582031453);
    }

    #[test]
    fn test_push() {
        let event = parser().parse_event(&mut push_message()).unwrap();

        let Event::PushPagure(pushed) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(pushed.git_ref, "refs/head/master");
        assert_eq!(pushed.repo_namespace, "source-git");
        assert_eq!(
            pushed.project_url.as_deref(),
            Some("https://git.stg.centos.org/source-git/packit-hello-world")
        );
        assert_eq!(pushed.commit_sha, "bf9701dea5a167caa7a1afa0759342aa0bf0d8fd");
    }
}

//! Tests for the Fedora message bus extractors.

use super::*;
use crate::config::{ProjectToSync, ServiceConfig};
use crate::services::{BuildRecord, InMemoryBuildStore, MockBuildStore, ServiceError};
use serde_json::json;

fn dist_git_payload() -> Value {
    json!({
        "topic": "org.fedoraproject.prod.git.receive",
        "commit": {
            "namespace": "rpms",
            "repo": "python-teamcity-messages",
            "branch": "f31",
            "rev": "ef7b5b8e9b1a9e33a6ac4b6a6bc1d4d3df48e2a2",
            "username": "jpopelka"
        }
    })
}

fn copr_payload(topic: &str) -> Value {
    json!({
        "topic": topic,
        "what": "build end: user:packit copr:packit-service-hello-world-24 build:1044215 pkg:hello ip:1.2.3.4 pid:1234 status:1",
        "build": 1044215,
        "chroot": "fedora-rawhide-x86_64",
        "status": 1,
        "owner": "packit",
        "copr": "packit-service-hello-world-24",
        "pkg": "hello-world",
        "timestamp": 1583918452.0
    })
}

fn koji_payload() -> Value {
    json!({
        "topic": "org.fedoraproject.prod.buildsys.task.state.change",
        "id": 45270170,
        "old": "FREE",
        "new": "OPEN",
        "info": {
            "state": 1,
            "start_time": 1590993237,
            "completion_time": null,
            "children": [
                {"method": "buildSRPMFromSCM", "id": 45270171},
                {"method": "buildArch", "id": 45270227}
            ]
        }
    })
}

fn build_record(build_id: u64) -> BuildRecord {
    BuildRecord {
        build_id,
        commit_sha: "0011223344".to_string(),
        pr_id: Some(24),
        repo_namespace: "packit-service".to_string(),
        repo_name: "hello-world".to_string(),
        git_ref: Some("0011223344".to_string()),
        project_url: "https://github.com/packit-service/hello-world".to_string(),
        target: Some("fedora-rawhide-x86_64".to_string()),
    }
}

fn sync_config() -> ServiceConfig {
    ServiceConfig {
        projects_to_sync: vec![ProjectToSync {
            forge: "https://github.com".to_string(),
            repo_namespace: "majamassarini".to_string(),
            repo_name: "python-teamcity-messages".to_string(),
            branch: "main".to_string(),
            dg_repo_name: "python-teamcity-messages".to_string(),
            dg_branch: "f31".to_string(),
        }],
        ..ServiceConfig::default()
    }
}

// ============================================================================
// Dist-git tests
// ============================================================================

mod dist_git_tests {
    use super::*;

    #[test]
    fn test_commit_for_synced_project() {
        let config = sync_config();

        let event = dist_git_commit(&dist_git_payload(), &ExtractContext { config: &config })
            .into_event()
            .unwrap();

        let Event::DistGitCommit(commit) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(commit.repo_namespace, "majamassarini");
        assert_eq!(commit.branch, "main");
        assert_eq!(
            commit.project_url,
            "https://github.com/majamassarini/python-teamcity-messages"
        );
        assert_eq!(commit.dg_branch, "f31");
        assert_eq!(
            commit.dg_project_url,
            "https://src.fedoraproject.org/rpms/python-teamcity-messages"
        );
    }

    /// Verify that commits to repositories without a mirroring rule are filtered.
    #[test]
    fn test_commit_without_sync_rule_is_filtered() {
        let config = ServiceConfig::default();

        let recognition = dist_git_commit(&dist_git_payload(), &ExtractContext { config: &config });

        assert_eq!(
            recognition,
            Recognition::Rejected {
                reason: "No matching upstream repo for syncing found.".to_string()
            }
        );
    }

    #[test]
    fn test_commit_without_rev_is_rejected() {
        let config = sync_config();
        let mut payload = dist_git_payload();
        payload["commit"]["rev"] = Value::Null;

        let recognition = dist_git_commit(&payload, &ExtractContext { config: &config });

        assert!(matches!(recognition, Recognition::Rejected { .. }));
    }

    #[test]
    fn test_other_topics_are_not_mine() {
        let config = sync_config();
        let payload = copr_payload("org.fedoraproject.prod.copr.build.end");

        assert_eq!(
            dist_git_commit(&payload, &ExtractContext { config: &config }),
            Recognition::NotMine
        );
    }
}

// ============================================================================
// Copr tests
// ============================================================================

mod copr_tests {
    use super::*;

    #[tokio::test]
    async fn test_known_build_is_enriched() {
        let store = InMemoryBuildStore::new();
        store.insert_copr_build(build_record(1044215)).await;

        let event = copr_build(&copr_payload("org.fedoraproject.prod.copr.build.end"), &store)
            .await
            .unwrap()
            .into_event()
            .unwrap();

        let Event::CoprBuild(build) = &event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(build.kind, CoprBuildKind::End);
        assert_eq!(build.status, CoprBuildStatus::Succeeded);
        assert_eq!(build.pr_id, Some(24));
        assert_eq!(build.base_repo_namespace.as_deref(), Some("packit-service"));
        assert_eq!(build.pkg.as_deref(), Some("hello-world"));
        assert!(build.build_record_found);
        assert_eq!(event.created_at().timestamp(), 1583918452);
        assert!(event.pre_check());
    }

    /// Verify that an unknown build is recognized but fails its pre-check.
    #[tokio::test]
    async fn test_unknown_build_fails_pre_check() {
        let store = InMemoryBuildStore::new();

        let event = copr_build(&copr_payload("org.fedoraproject.prod.copr.build.start"), &store)
            .await
            .unwrap()
            .into_event()
            .unwrap();

        let Event::CoprBuild(build) = &event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(build.kind, CoprBuildKind::Start);
        assert!(!build.build_record_found);
        assert_eq!(build.project_url, None);
        assert!(!event.pre_check());
    }

    #[tokio::test]
    async fn test_status_name_is_accepted() {
        let store = InMemoryBuildStore::new();
        let mut payload = copr_payload("org.fedoraproject.prod.copr.build.end");
        payload["status"] = json!("failed");

        let event = copr_build(&payload, &store).await.unwrap().into_event().unwrap();

        let Event::CoprBuild(build) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(build.status, CoprBuildStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_status_is_rejected() {
        let store = InMemoryBuildStore::new();
        let mut payload = copr_payload("org.fedoraproject.prod.copr.build.end");
        payload["status"] = json!(42);

        let recognition = copr_build(&payload, &store).await.unwrap();

        assert!(matches!(recognition, Recognition::Rejected { .. }));
    }

    /// Verify that a store outage surfaces as a transient parse error.
    #[tokio::test]
    async fn test_store_failure_is_transient() {
        let mut store = MockBuildStore::new();
        store.expect_copr_build().returning(|_| {
            Err(ServiceError::Unavailable {
                service: "postgres".to_string(),
                message: "connection refused".to_string(),
            })
        });

        let err = copr_build(&copr_payload("org.fedoraproject.prod.copr.build.end"), &store)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(err, ParseError::DependencyUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_other_topics_are_not_mine() {
        let store = MockBuildStore::new();

        let recognition = copr_build(&koji_payload(), &store).await.unwrap();

        assert_eq!(recognition, Recognition::NotMine);
    }
}

// ============================================================================
// Koji tests
// ============================================================================

mod koji_tests {
    use super::*;

    #[tokio::test]
    async fn test_task_state_change() {
        let store = InMemoryBuildStore::new();

        let event = koji_build(&koji_payload(), &store)
            .await
            .unwrap()
            .into_event()
            .unwrap();

        let Event::KojiBuild(build) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(build.build_id, 45270170);
        assert_eq!(build.state, Some(KojiTaskState::Open));
        assert_eq!(build.old_state, Some(KojiTaskState::Free));
        assert_eq!(build.start_time.as_deref(), Some("1590993237"));
        assert_eq!(build.completion_time, None);
        assert_eq!(build.rpm_build_task_id, Some(45270227));
        assert_eq!(build.commit_sha, None);
    }

    #[tokio::test]
    async fn test_stored_build_fills_commit() {
        let store = InMemoryBuildStore::new();
        store.insert_koji_build(build_record(45270170)).await;

        let event = koji_build(&koji_payload(), &store)
            .await
            .unwrap()
            .into_event()
            .unwrap();

        assert_eq!(event.commit_sha(), Some("0011223344"));
        assert_eq!(event.pr_id(), Some(24));
        assert_eq!(
            event.project_url(),
            Some("https://github.com/packit-service/hello-world")
        );
    }

    /// Verify that messages without a task state are skipped.
    #[tokio::test]
    async fn test_missing_state_is_skipped() {
        let store = InMemoryBuildStore::new();
        let mut payload = koji_payload();
        payload["info"]["state"] = Value::Null;

        let recognition = koji_build(&payload, &store).await.unwrap();

        assert!(matches!(recognition, Recognition::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_unknown_state_is_rejected() {
        let store = InMemoryBuildStore::new();
        let mut payload = koji_payload();
        payload["new"] = json!("EXPLODED");

        let recognition = koji_build(&payload, &store).await.unwrap();

        assert!(matches!(recognition, Recognition::Rejected { .. }));
    }
}

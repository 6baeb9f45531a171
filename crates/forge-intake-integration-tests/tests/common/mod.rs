//! Common test utilities for forge-intake integration tests
//!
//! This module provides:
//! - Recording implementations of the collaborator traits
//! - Sample payloads for every supported source
//! - Helpers for building parsers

use async_trait::async_trait;
use forge_intake_core::{
    BuildRecord, InMemoryBuildStore, PackageConfig, PackageConfigLoader, Parser, ProjectHandle,
    ProjectResolver, ProjectToSync, ServiceConfig, ServiceError, TestRunRecord, TestingFarmClient,
    TestingFarmError,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const TF_REQUEST_ID: &str = "2d3ef2f9-e1e4-4e5b-8d1e-6a8ec3cf0a8b";
pub const COPR_BUILD_ID: u64 = 2_137_416;
pub const KOJI_TASK_ID: u64 = 45_270_170;

// ============================================================================
// Recording Testing Farm client
// ============================================================================

/// Testing Farm client returning a fixed document and recording requests
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingTestingFarm {
    details: Option<Value>,
    requests: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl RecordingTestingFarm {
    pub fn returning(details: Value) -> Self {
        Self {
            details: Some(details),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestingFarmClient for RecordingTestingFarm {
    async fn get_request_details(&self, request_id: &str) -> Result<Value, TestingFarmError> {
        self.requests.lock().unwrap().push(request_id.to_string());
        self.details.clone().ok_or(TestingFarmError::HttpStatus {
            status: 404,
            message: format!("request {} not found", request_id),
        })
    }
}

// ============================================================================
// Static forge collaborators
// ============================================================================

/// Resolver that knows a fixed set of repositories
#[derive(Default)]
#[allow(dead_code)]
pub struct StaticProjectResolver {
    pub known_urls: Vec<String>,
    pub source_branch: Option<String>,
    pub latest_release: Option<String>,
}

#[async_trait]
impl ProjectResolver for StaticProjectResolver {
    async fn resolve(&self, project_url: &str) -> Result<ProjectHandle, ServiceError> {
        if !self.known_urls.iter().any(|u| u == project_url) {
            return Err(ServiceError::NotFound {
                resource: project_url.to_string(),
            });
        }
        ProjectHandle::from_url(project_url).ok_or(ServiceError::InvalidResponse {
            message: format!("unparsable project URL {}", project_url),
        })
    }

    async fn pull_request_source_branch(
        &self,
        _project: &ProjectHandle,
        _pr_id: u64,
    ) -> Result<Option<String>, ServiceError> {
        Ok(self.source_branch.clone())
    }

    async fn latest_release_tag(
        &self,
        _project: &ProjectHandle,
    ) -> Result<Option<String>, ServiceError> {
        Ok(self.latest_release.clone())
    }
}

/// Loader recording the reference each configuration was loaded at
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingConfigLoader {
    pub loads: Mutex<Vec<(String, Option<String>, Option<u64>)>>,
}

#[async_trait]
impl PackageConfigLoader for RecordingConfigLoader {
    async fn load(
        &self,
        project: &ProjectHandle,
        reference: Option<String>,
        pr_id: Option<u64>,
    ) -> Result<Option<PackageConfig>, ServiceError> {
        self.loads
            .lock()
            .unwrap()
            .push((project.full_repo_name(), reference, pr_id));
        Ok(Some(PackageConfig {
            specfile_path: Some(format!("{}.spec", project.repo)),
            upstream_package_name: Some(project.repo.clone()),
            downstream_package_name: Some(project.repo.clone()),
            jobs: vec![],
        }))
    }
}

// ============================================================================
// Parser builders
// ============================================================================

/// Store knowing the Copr build, Koji task and Testing Farm run used below
#[allow(dead_code)]
pub async fn seeded_store() -> InMemoryBuildStore {
    let store = InMemoryBuildStore::new();
    let record = |build_id| BuildRecord {
        build_id,
        commit_sha: "7a7c5bd3e3a09c0d0ec5e3b7aa0ec1db3e25d2a9".to_string(),
        pr_id: Some(31),
        repo_namespace: "packit".to_string(),
        repo_name: "ogr".to_string(),
        git_ref: Some("7a7c5bd3e3a09c0d0ec5e3b7aa0ec1db3e25d2a9".to_string()),
        project_url: "https://github.com/packit/ogr".to_string(),
        target: Some("fedora-rawhide-x86_64".to_string()),
    };
    store.insert_copr_build(record(COPR_BUILD_ID)).await;
    store.insert_koji_build(record(KOJI_TASK_ID)).await;
    store
        .insert_test_run(TestRunRecord {
            pipeline_id: TF_REQUEST_ID.to_string(),
            commit_sha: "7a7c5bd3e3a09c0d0ec5e3b7aa0ec1db3e25d2a9".to_string(),
            target: Some("fedora-rawhide-x86_64".to_string()),
            base_project_url: None,
        })
        .await;
    store
}

/// Configuration syncing `packit/ogr` with its rawhide dist-git branch
#[allow(dead_code)]
pub fn syncing_config() -> ServiceConfig {
    ServiceConfig {
        projects_to_sync: vec![ProjectToSync {
            forge: "https://github.com".to_string(),
            repo_namespace: "packit".to_string(),
            repo_name: "ogr".to_string(),
            branch: "main".to_string(),
            dg_repo_name: "python-ogr".to_string(),
            dg_branch: "rawhide".to_string(),
        }],
        ..ServiceConfig::default()
    }
}

#[allow(dead_code)]
pub async fn seeded_parser(testing_farm: RecordingTestingFarm) -> Parser {
    Parser::new(
        Arc::new(syncing_config()),
        Arc::new(seeded_store().await),
        Arc::new(testing_farm),
    )
}

// ============================================================================
// Sample payloads
// ============================================================================

#[allow(dead_code)]
pub fn github_release() -> Value {
    json!({
        "action": "published",
        "release": {"tag_name": "0.12.0", "created_at": "2020-05-20T10:35:50Z"},
        "repository": {
            "name": "ogr",
            "html_url": "https://github.com/packit/ogr",
            "owner": {"login": "packit"}
        }
    })
}

#[allow(dead_code)]
pub fn github_pull_request() -> Value {
    json!({
        "action": "synchronize",
        "number": 31,
        "pull_request": {
            "user": {"login": "lbarcziova"},
            "head": {
                "sha": "7a7c5bd3e3a09c0d0ec5e3b7aa0ec1db3e25d2a9",
                "repo": {"name": "ogr", "owner": {"login": "lbarcziova"}}
            },
            "base": {"repo": {"name": "ogr", "owner": {"login": "packit"}}}
        },
        "repository": {
            "name": "ogr",
            "html_url": "https://github.com/packit/ogr",
            "owner": {"login": "packit"}
        }
    })
}

#[allow(dead_code)]
pub fn github_pull_request_comment(login: &str, body: &str) -> Value {
    json!({
        "action": "created",
        "issue": {
            "number": 31,
            "user": {"login": "lbarcziova"},
            "pull_request": {"url": "https://api.github.com/repos/packit/ogr/pulls/31"}
        },
        "comment": {"body": body, "user": {"login": login}},
        "repository": {
            "name": "ogr",
            "full_name": "packit/ogr",
            "html_url": "https://github.com/packit/ogr",
            "owner": {"login": "packit"}
        }
    })
}

#[allow(dead_code)]
pub fn github_issue_comment(body: &str) -> Value {
    json!({
        "action": "created",
        "issue": {"number": 512, "user": {"login": "phracek"}},
        "comment": {"body": body, "user": {"login": "phracek"}},
        "repository": {
            "name": "ogr",
            "full_name": "packit/ogr",
            "html_url": "https://github.com/packit/ogr",
            "owner": {"login": "packit"}
        }
    })
}

#[allow(dead_code)]
pub fn github_push() -> Value {
    json!({
        "ref": "refs/heads/main",
        "before": "04885ff850b0fa0e206cd09db73565703d48f99b",
        "after": "7a7c5bd3e3a09c0d0ec5e3b7aa0ec1db3e25d2a9",
        "deleted": false,
        "pusher": {"name": "lachmanfrantisek"},
        "commits": [{"id": "7a7c5bd3e3a09c0d0ec5e3b7aa0ec1db3e25d2a9"}],
        "repository": {
            "name": "ogr",
            "html_url": "https://github.com/packit/ogr",
            "owner": {"login": "packit"}
        }
    })
}

#[allow(dead_code)]
pub fn github_installation() -> Value {
    json!({
        "action": "created",
        "installation": {
            "id": 1708454,
            "created_at": 1567090283,
            "account": {
                "login": "packit",
                "id": 46870917,
                "url": "https://api.github.com/users/packit",
                "type": "Organization"
            }
        },
        "repositories": [{"full_name": "packit/ogr"}],
        "sender": {"id": 2151937, "login": "jpopelka"}
    })
}

#[allow(dead_code)]
pub fn gitlab_merge_request() -> Value {
    json!({
        "object_kind": "merge_request",
        "user": {"username": "shreyaspapi"},
        "project": {"web_url": "https://gitlab.com/packit-service/hello-there"},
        "object_attributes": {
            "id": 58759529,
            "iid": 3,
            "state": "opened",
            "action": "update",
            "source_branch": "feature",
            "target_branch": "main",
            "source": {"web_url": "https://gitlab.com/shreyaspapi/hello-there"},
            "last_commit": {"id": "1f6a716aa7a618a9ffe56970d77177d99d100022"}
        }
    })
}

#[allow(dead_code)]
pub fn gitlab_merge_request_note(body: &str) -> Value {
    json!({
        "object_kind": "note",
        "user": {"username": "shreyaspapi"},
        "project": {"web_url": "https://gitlab.com/packit-service/hello-there"},
        "object_attributes": {"note": body, "noteable_type": "MergeRequest"},
        "merge_request": {
            "id": 59533079,
            "iid": 3,
            "state": "opened",
            "source": {"web_url": "https://gitlab.com/shreyaspapi/hello-there"},
            "last_commit": {"id": "1f6a716aa7a618a9ffe56970d77177d99d100022"}
        }
    })
}

#[allow(dead_code)]
pub fn gitlab_issue_note(body: &str) -> Value {
    json!({
        "object_kind": "note",
        "user": {"username": "shreyaspapi"},
        "project": {"web_url": "https://gitlab.com/packit-service/hello-there"},
        "object_attributes": {"note": body, "noteable_type": "Issue"},
        "issue": {"iid": 7, "state": "opened"}
    })
}

#[allow(dead_code)]
pub fn gitlab_push() -> Value {
    json!({
        "object_kind": "push",
        "ref": "refs/heads/main",
        "before": "0e27f070efa4bef2a7c0168f07a0ac36ef90d8cb",
        "after": "cb2859505e101785097e082529dced35bbee0c8f",
        "user_username": "shreyaspapi",
        "total_commits_count": 1,
        "commits": [{"id": "cb2859505e101785097e082529dced35bbee0c8f"}],
        "project": {"web_url": "https://gitlab.com/packit-service/hello-there"}
    })
}

#[allow(dead_code)]
pub fn copr_build_end() -> Value {
    json!({
        "topic": "org.fedoraproject.prod.copr.build.end",
        "build": COPR_BUILD_ID,
        "chroot": "fedora-rawhide-x86_64",
        "status": 1,
        "owner": "packit",
        "copr": "packit-ogr-31",
        "pkg": "ogr",
        "timestamp": 1590993237
    })
}

#[allow(dead_code)]
pub fn koji_task_change() -> Value {
    json!({
        "topic": "org.fedoraproject.prod.buildsys.task.state.change",
        "id": KOJI_TASK_ID,
        "old": "OPEN",
        "new": "CLOSED",
        "info": {
            "state": 2,
            "start_time": 1590993237,
            "completion_time": 1590993537,
            "children": [{"method": "buildArch", "id": 45270227}]
        }
    })
}

#[allow(dead_code)]
pub fn dist_git_push() -> Value {
    json!({
        "topic": "org.fedoraproject.prod.git.receive",
        "commit": {
            "namespace": "rpms",
            "repo": "python-ogr",
            "branch": "rawhide",
            "rev": "ef7b5b8e9b1a9e33a6ac4b6a6bc1d4d3df48e2a2",
            "username": "ttomecek"
        },
        "timestamp": 1590993837
    })
}

#[allow(dead_code)]
pub fn testing_farm_notification() -> Value {
    json!({"source": "testing-farm", "request_id": TF_REQUEST_ID})
}

#[allow(dead_code)]
pub fn testing_farm_details() -> Value {
    json!({
        "id": TF_REQUEST_ID,
        "state": "complete",
        "result": {"overall": "failed", "summary": "1 test failed", "xunit": null},
        "test": {"fmf": {"url": "https://github.com/packit/ogr", "ref": "main"}},
        "environments_requested": [{
            "arch": "x86_64",
            "os": {"compose": "Fedora-Rawhide"},
            "artifacts": [{"id": "2137416:fedora-rawhide-x86_64", "type": "fedora-copr-build"}]
        }]
    })
}

#[allow(dead_code)]
pub fn pagure_message(kind: &str) -> Value {
    json!({
        "topic": format!("git.stg.centos.org/{}", kind),
        "agent": "mmassari",
        "comment": {"comment": "/packit build please"},
        "pullrequest": {
            "id": 12,
            "branch": "c8s",
            "commit_stop": "bf9701dea5a167caa7a1afa0759342aa0bf0d8fd",
            "user": {"name": "mmassari"},
            "project": {
                "name": "packit-hello-world",
                "namespace": "source-git",
                "url_path": "source-git/packit-hello-world"
            },
            "repo_from": {
                "name": "packit-hello-world",
                "namespace": "source-git",
                "user": {"name": "mmassari"}
            },
            "comments": [{"comment": "looks good"}, {"comment": "/packit copr-build"}]
        },
        "branch": "c8s",
        "end_commit": "bf9701dea5a167caa7a1afa0759342aa0bf0d8fd",
        "repo": {
            "name": "packit-hello-world",
            "namespace": "source-git",
            "url_path": "source-git/packit-hello-world"
        }
    })
}

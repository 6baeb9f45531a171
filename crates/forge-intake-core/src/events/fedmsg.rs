//! Events from the Fedora message bus: dist-git pushes, Copr and Koji builds.

use super::{EventBase, EventError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

string_enum! {
    /// Bus topics handled by the webhook-path parser
    pub enum FedmsgTopic {
        DistGitPush => "org.fedoraproject.prod.git.receive",
        CoprBuildStarted => "org.fedoraproject.prod.copr.build.start",
        CoprBuildFinished => "org.fedoraproject.prod.copr.build.end",
        KojiTaskStateChange => "org.fedoraproject.prod.buildsys.task.state.change",
    }
}

string_enum! {
    pub enum CoprBuildKind {
        Start => "start",
        End => "end",
    }
}

impl CoprBuildKind {
    /// Build kind announced by a Copr topic, `None` for every other topic
    pub fn from_topic(topic: FedmsgTopic) -> Option<Self> {
        match topic {
            FedmsgTopic::CoprBuildStarted => Some(Self::Start),
            FedmsgTopic::CoprBuildFinished => Some(Self::End),
            _ => None,
        }
    }
}

string_enum! {
    /// Copr build state, numbered the way Copr reports it on the bus
    pub enum CoprBuildStatus {
        Failed => "failed",
        Succeeded => "succeeded",
        Canceled => "canceled",
        Running => "running",
        Pending => "pending",
        Skipped => "skipped",
        Starting => "starting",
        Importing => "importing",
        Forked => "forked",
        Waiting => "waiting",
    }
}

impl CoprBuildStatus {
    /// Decode Copr's integer status code (0..=9).
    pub fn from_code(code: u64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index))
            .copied()
    }

    /// Decode a bus value that is either the integer code or its name.
    pub fn from_json(value: &Value) -> Result<Self, EventError> {
        let unknown = || EventError::UnknownValue {
            kind: "CoprBuildStatus",
            value: value.to_string(),
        };
        match value {
            Value::Number(n) => n.as_u64().and_then(Self::from_code).ok_or_else(unknown),
            Value::String(s) => match s.parse::<u64>() {
                Ok(code) => Self::from_code(code).ok_or_else(unknown),
                Err(_) => s.parse(),
            },
            _ => Err(unknown()),
        }
    }
}

string_enum! {
    /// Koji task state
    pub enum KojiTaskState {
        Free => "free",
        Open => "open",
        Closed => "closed",
        Canceled => "canceled",
        Assigned => "assigned",
        Failed => "failed",
    }
}

impl KojiTaskState {
    /// Decode a bus value: the state name in any case or its integer code.
    pub fn from_json(value: &Value) -> Result<Self, EventError> {
        let unknown = || EventError::UnknownValue {
            kind: "KojiTaskState",
            value: value.to_string(),
        };
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|code| usize::try_from(code).ok())
                .and_then(|index| Self::ALL.get(index))
                .copied()
                .ok_or_else(unknown),
            Value::String(s) => s.to_ascii_lowercase().parse().map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }
}

/// New commits landed in a mirrored dist-git repository.
///
/// `repo_*`, `branch` and `project_url` describe the upstream project the
/// matching mirroring rule points at; `dg_*` describe the dist-git side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistGitCommitEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub topic: FedmsgTopic,
    pub repo_namespace: String,
    pub repo_name: String,
    pub branch: String,
    pub project_url: String,
    pub dg_repo_namespace: String,
    pub dg_repo_name: String,
    pub dg_branch: String,
    pub dg_rev: String,
    pub dg_project_url: String,
}

/// A Copr build started or finished.
///
/// Repository fields come from the build record stored when the build was
/// submitted. `build_record_found` is false when no record exists, which
/// makes the event fail its pre-check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoprBuildEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub kind: CoprBuildKind,
    pub topic: FedmsgTopic,
    pub build_id: u64,
    pub chroot: String,
    pub status: CoprBuildStatus,
    pub owner: String,
    pub project_name: String,
    pub pkg: Option<String>,
    pub base_repo_namespace: Option<String>,
    pub base_repo_name: Option<String>,
    pub pr_id: Option<u64>,
    pub git_ref: Option<String>,
    pub commit_sha: Option<String>,
    pub project_url: Option<String>,
    pub build_record_found: bool,
}

/// A Koji task changed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KojiBuildEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub build_id: u64,
    pub state: Option<KojiTaskState>,
    pub old_state: Option<KojiTaskState>,
    pub start_time: Option<String>,
    pub completion_time: Option<String>,
    /// Id of the first `buildArch` child task
    pub rpm_build_task_id: Option<u64>,
    pub project_url: Option<String>,
    pub commit_sha: Option<String>,
    pub pr_id: Option<u64>,
}

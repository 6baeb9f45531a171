//! Testing Farm result events.

use super::EventBase;
use serde::{Deserialize, Serialize};

string_enum! {
    /// Overall or per-test outcome reported by Testing Farm
    pub enum TestingFarmResult {
        Passed => "passed",
        Failed => "failed",
        Error => "error",
        Running => "running",
        Queued => "queued",
        Complete => "complete",
        Unknown => "unknown",
    }
}

/// Outcome of one test case from the xunit report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub result: TestingFarmResult,
    pub log_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestingFarmResultsEvent {
    #[serde(flatten)]
    pub base: EventBase,
    pub pipeline_id: String,
    pub result: TestingFarmResult,
    pub compose: Option<String>,
    pub summary: String,
    pub log_url: String,
    /// Empty when the run tested no Copr build
    pub copr_build_id: String,
    pub copr_chroot: String,
    pub tests: Vec<TestResult>,
    pub commit_sha: Option<String>,
    pub project_url: Option<String>,
}

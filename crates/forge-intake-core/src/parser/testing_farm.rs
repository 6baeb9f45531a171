//! Testing Farm result notifications.
//!
//! The notification only names the request. Everything else (result,
//! environment, artifacts, per-test results) is fetched from the Testing
//! Farm API and merged with the test run stored when the request was
//! submitted.

use super::{base_from, first_timestamp, malformed, ExtractContext, ParseError, Recognition};
use crate::events::{
    Event, TestResult, TestingFarmResult, TestingFarmResultsEvent, TriggerType,
};
use crate::field_access::{nested_array, nested_non_empty_str, nested_str};
use crate::services::BuildStore;
use crate::testing_farm::TestingFarmClient;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

const COPR_BUILD_ARTIFACT: &str = "fedora-copr-build";

pub(crate) async fn results(
    payload: &Value,
    ctx: &ExtractContext<'_>,
    store: &dyn BuildStore,
    client: &dyn TestingFarmClient,
) -> Result<Recognition, ParseError> {
    if nested_str(payload, &["source"]) != Some("testing-farm") {
        return Ok(Recognition::NotMine);
    }
    let Some(request_id) = nested_non_empty_str(payload, &["request_id"]) else {
        return Ok(Recognition::NotMine);
    };
    info!(request_id, "Testing farm notification event");

    let test_run = store
        .test_run(request_id)
        .await
        .map_err(ParseError::build_store)?;

    // Bounded regardless of the client's own timeout.
    let request_timeout = ctx.config.testing_farm_timeout();
    let details = timeout(request_timeout, client.get_request_details(request_id))
        .await
        .map_err(|_| {
            error!(request_id, timeout = ?request_timeout, "Testing Farm did not answer in time");
            ParseError::DependencyTimeout {
                service: "testing-farm".to_string(),
            }
        })?
        .map_err(|e| {
            error!(request_id, error = %e, "Failed to get request details from Testing Farm");
            ParseError::testing_farm(e)
        })?;

    let raw_result = nested_non_empty_str(&details, &["result", "overall"])
        .or_else(|| nested_non_empty_str(&details, &["state"]))
        .unwrap_or("unknown");
    let result: TestingFarmResult = match raw_result.parse() {
        Ok(result) => result,
        Err(_) => return Ok(malformed(format!("Unknown Testing Farm result '{}'", raw_result))),
    };
    let summary = nested_str(&details, &["result", "summary"]).unwrap_or_default();

    let environment = nested_array(&details, &["environments_requested"]).and_then(|e| e.first());
    let compose = environment.and_then(|env| nested_non_empty_str(env, &["os", "compose"]));
    let tests = nested_non_empty_str(&details, &["result", "xunit"])
        .map(parse_xunit)
        .unwrap_or_default();

    let mut commit_sha = nested_non_empty_str(&details, &["test", "fmf", "ref"]).map(str::to_string);
    let mut project_url = nested_non_empty_str(&details, &["test", "fmf", "url"]).map(str::to_string);

    // The fmf ref names the test branch; the stored run knows the tested commit.
    if let Some(run) = &test_run {
        commit_sha = Some(run.commit_sha.clone());
    }

    let (copr_build_id, mut copr_chroot) = if project_url.as_deref()
        == Some(ctx.config.testing_farm_installability_test_url.as_str())
    {
        (String::new(), String::new())
    } else {
        let artifact = environment
            .and_then(|env| nested_array(env, &["artifacts"]))
            .and_then(|a| a.first());
        let artifact_type = artifact.and_then(|a| nested_str(a, &["type"]));
        if artifact_type == Some(COPR_BUILD_ARTIFACT) {
            let Some(id) = artifact.and_then(|a| nested_non_empty_str(a, &["id"])) else {
                return Ok(malformed("Copr build artifact without an id"));
            };
            let (build_id, chroot) = id.split_once(':').unwrap_or((id, ""));
            (build_id.to_string(), chroot.to_string())
        } else {
            warn!(?artifact_type, "Artifact is not a {}", COPR_BUILD_ARTIFACT);
            (String::new(), String::new())
        }
    };

    if copr_chroot.is_empty() {
        if let Some(target) = test_run.as_ref().and_then(|run| run.target.clone()) {
            copr_chroot = target;
        }
    }

    if let Some(base_project_url) = test_run.as_ref().and_then(|run| run.base_project_url.clone()) {
        if project_url.as_deref() != Some(base_project_url.as_str()) {
            debug!(
                base_project_url = %base_project_url,
                ?project_url,
                "Using the stored base project url"
            );
            project_url = Some(base_project_url);
        }
    }

    let timestamp = first_timestamp(&details, &[&["updated"], &["created"]]);
    let base = match base_from(TriggerType::TestingFarmResults, timestamp) {
        Ok(base) => base,
        Err(e) => return Ok(malformed(e.to_string())),
    };

    let log_url = format!(
        "{}/{}",
        ctx.config.testing_farm_artifacts_url.trim_end_matches('/'),
        request_id
    );

    debug!(
        ?project_url,
        ?commit_sha,
        result = %result,
        summary,
        copr_build = %format!("{}:{}", copr_build_id, copr_chroot),
        "Testing Farm results"
    );

    Ok(Recognition::recognized(Event::TestingFarmResults(
        TestingFarmResultsEvent {
            base,
            pipeline_id: request_id.to_string(),
            result,
            compose: compose.map(str::to_string),
            summary: summary.to_string(),
            log_url,
            copr_build_id,
            copr_chroot,
            tests,
            commit_sha,
            project_url,
        },
    )))
}

// ============================================================================
// xunit
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum XunitError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Test case without a '{0}' attribute")]
    MissingAttribute(&'static str),

    #[error("Unknown test result '{0}'")]
    UnknownResult(String),

    #[error("Document ended inside <{0}>")]
    Unclosed(String),
}

#[derive(Debug, Default)]
struct PendingCase {
    name: Option<String>,
    result: Option<String>,
    logs: Vec<String>,
}

impl PendingCase {
    fn finish(self) -> Result<TestResult, XunitError> {
        let name = self.name.ok_or(XunitError::MissingAttribute("name"))?;
        let raw = self.result.ok_or(XunitError::MissingAttribute("result"))?;
        let result = raw.parse().map_err(|_| XunitError::UnknownResult(raw))?;
        let log_url = self.logs.into_iter().nth(1).unwrap_or_default();
        Ok(TestResult {
            name,
            result,
            log_url,
        })
    }
}

/// Per-test results from a Testing Farm xunit report.
///
/// Reads `testsuites/testsuite/testcase` elements. The log URL is the
/// `href` of the second `logs/log` entry of a test case. A report that
/// cannot be read yields no results; it is logged and otherwise ignored.
pub fn parse_xunit(xunit: &str) -> Vec<TestResult> {
    match read_xunit(xunit) {
        Ok(tests) => tests,
        Err(e) => {
            warn!(error = %e, xunit, "Wrongly parsed Testing Farm result xunit");
            Vec::new()
        }
    }
}

fn read_xunit(xunit: &str) -> Result<Vec<TestResult>, XunitError> {
    let mut reader = Reader::from_str(xunit);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut pending: Option<PendingCase> = None;
    let mut tests = Vec::new();

    loop {
        match reader.read_event()? {
            XmlEvent::Start(element) => {
                let name = element_name(&element);
                open_element(&name, &element, &stack, &mut pending)?;
                stack.push(name);
            }
            XmlEvent::Empty(element) => {
                let name = element_name(&element);
                open_element(&name, &element, &stack, &mut pending)?;
                if name == "testcase" && in_testsuite(&stack) {
                    if let Some(case) = pending.take() {
                        tests.push(case.finish()?);
                    }
                }
            }
            XmlEvent::End(_) => {
                let closed = stack.pop();
                if closed.as_deref() == Some("testcase") && in_testsuite(&stack) {
                    if let Some(case) = pending.take() {
                        tests.push(case.finish()?);
                    }
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XunitError::Unclosed(open));
    }
    Ok(tests)
}

fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn in_testsuite(stack: &[String]) -> bool {
    stack.len() == 2 && stack[0] == "testsuites" && stack[1] == "testsuite"
}

fn open_element(
    name: &str,
    element: &BytesStart<'_>,
    stack: &[String],
    pending: &mut Option<PendingCase>,
) -> Result<(), XunitError> {
    if name == "testcase" && in_testsuite(stack) {
        *pending = Some(PendingCase {
            name: attribute(element, "name")?,
            result: attribute(element, "result")?,
            logs: Vec::new(),
        });
    } else if name == "log" && stack.len() == 4 && stack[2] == "testcase" && stack[3] == "logs" {
        if let Some(case) = pending.as_mut() {
            case.logs.push(attribute(element, "href")?.unwrap_or_default());
        }
    }
    Ok(())
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, XunitError> {
    match element.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

#[cfg(test)]
#[path = "testing_farm_tests.rs"]
mod tests;

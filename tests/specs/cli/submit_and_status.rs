//! End-to-end submit/status/list/cancel specs against a daemon the CLI
//! spawns on first use.

use crate::prelude::*;

fn submitted_id(stdout: &str) -> String {
    stdout.trim().strip_prefix("submitted: ").expect("submitted line").trim().to_string()
}

#[test]
fn submit_then_status_reaches_completed() {
    let project = Project::empty();

    let submit = project
        .vf()
        .args(&["submit", "--prompt", "a calm river at dawn", "--duration", "30"])
        .passes();
    let request_id = submitted_id(&submit.stdout());

    let reached = wait_for(5_000, || {
        project.vf().args(&["status", &request_id]).passes().stdout_has("status:    Completed")
    });
    assert!(reached, "request never reached Completed status");
}

#[test]
fn list_includes_submitted_session() {
    let project = Project::empty();
    project.vf().args(&["submit", "--prompt", "wildlife at sunrise", "--duration", "45"]).passes();

    let listed = wait_for(2_000, || !project.vf().args(&["list"]).passes().stdout().contains("no sessions"));
    assert!(listed, "submitted session never appeared in list");
}

#[test]
fn cancel_unknown_request_id_reports_not_found() {
    let project = Project::empty();
    project.vf().args(&["health"]).passes();
    project.vf().args(&["cancel", "req-does-not-exist"]).fails().stderr_has("not found");
}

#[test]
fn status_for_unknown_request_id_fails() {
    let project = Project::empty();
    project.vf().args(&["health"]).passes();
    project.vf().args(&["status", "req-does-not-exist"]).fails();
}

#[test]
fn metrics_and_resource_usage_round_trip() {
    let project = Project::empty();
    project.vf().args(&["health"]).passes().stdout_has("ok:");
    project.vf().args(&["metrics"]).passes().stdout_has("processed:");
    project.vf().args(&["resource-usage"]).passes().stdout_has("cpu:");
}

#[test]
fn json_format_emits_parseable_output() {
    let project = Project::empty();
    let output = project.vf().args(&["--format", "json", "health"]).passes();
    let parsed: serde_json::Value = serde_json::from_str(&output.stdout()).expect("valid json");
    assert!(parsed.get("op").is_some());
}

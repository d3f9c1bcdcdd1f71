//! Processor start/pause/resume/stop lifecycle specs, driven through the
//! CLI against an embedded daemon.

use crate::prelude::*;

#[test]
fn pause_then_resume_round_trips() {
    let project = Project::empty();
    project.vf().args(&["health"]).passes();

    project.vf().args(&["pause"]).passes().stdout_has("paused");
    project.vf().args(&["resume"]).passes().stdout_has("resumed");
}

#[test]
fn paused_processor_still_accepts_submissions_into_the_queue() {
    let project = Project::empty();
    project.vf().args(&["health"]).passes();
    project.vf().args(&["pause"]).passes();

    let submit = project
        .vf()
        .args(&["submit", "--prompt", "quiet mountain lake", "--duration", "30"])
        .passes();
    assert!(submit.stdout().starts_with("submitted:"));

    let request_id = submit.stdout().trim().strip_prefix("submitted: ").unwrap().trim().to_string();
    let status = project.vf().args(&["status", &request_id]).passes();
    assert!(status.stdout().contains("state:     Queued"));

    project.vf().args(&["resume"]).passes();
    let completed = wait_for(5_000, || {
        project.vf().args(&["status", &request_id]).passes().stdout_has("status:    Completed")
    });
    assert!(completed, "request never completed after resume");
}

#[test]
fn stop_drains_in_flight_work_before_reporting_graceful() {
    let project = Project::empty();
    project.vf().args(&["health"]).passes();
    project.vf().args(&["submit", "--prompt", "coastal storm", "--duration", "30"]).passes();

    project.vf().args(&["stop", "--timeout-seconds", "5"]).passes().stdout_has("stopped");
}

#[test]
fn cleanup_reports_a_sweep_with_no_errors() {
    let project = Project::empty();
    project.vf().args(&["health"]).passes();
    project.vf().args(&["cleanup"]).passes().stdout_has("sessions cleaned:");
}

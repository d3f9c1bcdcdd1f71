//! `vf loadtest` specs: a constant-load run against the embedded daemon
//! should report every request succeeding (the pipeline uses a fast fake
//! stage agent) and land within a believable throughput range.

use crate::prelude::*;

#[test]
fn constant_load_test_reports_full_success_rate() {
    let project = Project::empty();
    let output = project
        .vf()
        .args(&[
            "loadtest",
            "--name",
            "smoke",
            "--profile",
            "constant-load",
            "--duration-seconds",
            "2",
            "--users",
            "3",
            "--requests-per-user",
            "1",
        ])
        .passes();

    let stdout = output.stdout();
    assert!(stdout.contains("total requests:    3"), "stdout: {stdout}");
    assert!(stdout.contains("success rate:      100.0%"), "stdout: {stdout}");
}

#[test]
fn loadtest_can_export_results_to_json_file() {
    let project = Project::empty();
    let out_file = tempfile::NamedTempFile::new().expect("tempfile");
    let out_path = out_file.path().to_path_buf();

    project
        .vf()
        .args(&[
            "loadtest",
            "--name",
            "export-smoke",
            "--profile",
            "constant-load",
            "--duration-seconds",
            "1",
            "--users",
            "2",
            "--requests-per-user",
            "1",
            "--output",
        ])
        .args(&[out_path.to_str().expect("utf8 path")])
        .passes();

    let contents = std::fs::read_to_string(&out_path).expect("read exported metrics");
    let parsed: serde_json::Value = serde_json::from_str(&contents).expect("valid json");
    assert_eq!(parsed["test_name"], "export-smoke");
}

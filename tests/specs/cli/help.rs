//! CLI help/usage output specs.

use crate::prelude::*;

#[test]
fn vf_help_shows_usage() {
    cli().args(&["--help"]).passes().stdout_has("Usage:");
}

#[test]
fn vf_no_args_shows_usage_and_exits_nonzero() {
    cli().fails().stderr_has("Usage:");
}

#[test]
fn vf_submit_help_lists_prompt_flag() {
    cli().args(&["submit", "--help"]).passes().stdout_has("--prompt");
}

#[test]
fn vf_unknown_command_fails() {
    cli().args(&["not-a-real-command"]).fails();
}

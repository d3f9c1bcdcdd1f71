//! Behavioral specifications for the vidforge CLI and daemon.
//!
//! Black-box: these invoke the `vf` binary (which spawns `vfd` on first
//! use) and assert on stdout/stderr/exit codes. Processor/store/governor
//! unit coverage for Scenarios A-F in the design notes lives alongside
//! each component's own crate instead of here.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/cli/help.rs"]
mod cli_help;
#[path = "specs/cli/submit_and_status.rs"]
mod cli_submit_and_status;

#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;
#[path = "specs/daemon/loadtest.rs"]
mod daemon_loadtest;

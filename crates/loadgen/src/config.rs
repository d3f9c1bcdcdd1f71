// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for a single load test run.

use crate::profile::LoadProfile;
use serde::{Deserialize, Serialize};

/// Parameters for one [`crate::LoadTester::run`] invocation. `profile`
/// picks which of the six scaling patterns in §4.7 the test follows;
/// the remaining fields are the same knobs `original_source`'s
/// `LoadTestConfig` dataclass exposes, renamed to Rust idiom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestConfig {
    pub test_name: String,
    pub profile: LoadProfile,
    pub duration_seconds: u64,
    pub max_concurrent_users: usize,
    pub ramp_up_seconds: u64,
    pub requests_per_user: usize,
    pub think_time_seconds: f64,
    pub timeout_seconds: f64,
}

impl LoadTestConfig {
    pub fn new(test_name: impl Into<String>, profile: LoadProfile) -> Self {
        Self {
            test_name: test_name.into(),
            profile,
            duration_seconds: 300,
            max_concurrent_users: 10,
            ramp_up_seconds: 60,
            requests_per_user: 1,
            think_time_seconds: 1.0,
            timeout_seconds: 300.0,
        }
    }
}

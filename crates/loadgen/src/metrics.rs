// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Results and aggregated metrics produced by a load test run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::profile::LoadProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    Preparing,
    Running,
    RampingDown,
    Completed,
    Failed,
}

/// One virtual user's single request, from submission to terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResult {
    pub request_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub success: bool,
    pub error_message: Option<String>,
    pub response_time_ms: f64,
    pub rate_limited: bool,
}

/// Per-virtual-user rollup, keyed into [`LoadTestMetrics::user_metrics`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user_id: String,
    pub requests_sent: u64,
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub total_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub rate_limited_count: u64,
}

impl UserMetrics {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), min_response_time_ms: f64::INFINITY, ..Default::default() }
    }

    fn record(&mut self, result: &RequestResult) {
        self.requests_sent += 1;
        if result.end_time.is_some() {
            self.requests_completed += 1;
            self.total_response_time_ms += result.response_time_ms;
            self.min_response_time_ms = self.min_response_time_ms.min(result.response_time_ms);
            self.max_response_time_ms = self.max_response_time_ms.max(result.response_time_ms);
        }
        if !result.success {
            self.requests_failed += 1;
        }
        if result.rate_limited {
            self.rate_limited_count += 1;
        }
    }
}

/// A periodic system-resource reading taken while a test runs (§4.7:
/// "periodic resource snapshots (every 5s)").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub network_sent_mbps: f64,
    pub network_recv_mbps: f64,
}

/// Comprehensive metrics for a load test, assembled from every virtual
/// user's [`RequestResult`]s once the run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestMetrics {
    pub test_name: String,
    pub profile: LoadProfile,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,

    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,

    pub avg_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub p50_response_time_ms: f64,
    pub p95_response_time_ms: f64,
    pub p99_response_time_ms: f64,

    pub requests_per_second: f64,
    pub peak_concurrent_users: usize,
    pub success_rate: f64,
    pub error_rate: f64,

    pub resource_snapshots: Vec<ResourceSnapshot>,
    pub user_metrics: HashMap<String, UserMetrics>,
    pub request_results: Vec<RequestResult>,

    pub phase: TestPhase,
    pub error_messages: Vec<String>,
}

impl LoadTestMetrics {
    pub fn new(test_name: String, profile: LoadProfile, start_time: DateTime<Utc>) -> Self {
        Self {
            test_name,
            profile,
            start_time,
            end_time: None,
            duration_seconds: 0.0,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rate_limited_requests: 0,
            avg_response_time_ms: 0.0,
            min_response_time_ms: 0.0,
            max_response_time_ms: 0.0,
            p50_response_time_ms: 0.0,
            p95_response_time_ms: 0.0,
            p99_response_time_ms: 0.0,
            requests_per_second: 0.0,
            peak_concurrent_users: 0,
            success_rate: 0.0,
            error_rate: 0.0,
            resource_snapshots: Vec::new(),
            user_metrics: HashMap::new(),
            request_results: Vec::new(),
            phase: TestPhase::Preparing,
            error_messages: Vec::new(),
        }
    }

    /// Folds every user's results in, then recomputes the aggregate
    /// distribution and throughput figures. Percentiles are a sorted-
    /// vector index lookup — no histogram crate needed at this scale.
    pub fn finalize(&mut self, all_results: Vec<RequestResult>) {
        for result in &all_results {
            self.user_metrics.entry(result.user_id.clone()).or_insert_with(|| UserMetrics::new(&result.user_id)).record(result);
        }
        self.request_results = all_results;

        let results = &self.request_results;
        if results.is_empty() {
            return;
        }

        self.total_requests = results.len() as u64;
        self.successful_requests = results.iter().filter(|r| r.success).count() as u64;
        self.failed_requests = self.total_requests - self.successful_requests;
        self.rate_limited_requests = results.iter().filter(|r| r.rate_limited).count() as u64;

        self.success_rate = self.successful_requests as f64 / self.total_requests as f64;
        self.error_rate = self.failed_requests as f64 / self.total_requests as f64;

        let mut response_times: Vec<f64> =
            results.iter().filter(|r| r.end_time.is_some()).map(|r| r.response_time_ms).collect();
        if !response_times.is_empty() {
            response_times.sort_by(|a, b| a.total_cmp(b));
            self.avg_response_time_ms = response_times.iter().sum::<f64>() / response_times.len() as f64;
            self.min_response_time_ms = response_times[0];
            self.max_response_time_ms = response_times[response_times.len() - 1];
            self.p50_response_time_ms = percentile(&response_times, 0.50);
            self.p95_response_time_ms = percentile(&response_times, 0.95);
            self.p99_response_time_ms = percentile(&response_times, 0.99);
        }

        if self.duration_seconds > 0.0 {
            self.requests_per_second = self.total_requests as f64 / self.duration_seconds;
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() as f64) * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(ms: f64, success: bool) -> RequestResult {
        RequestResult {
            request_id: "r".into(),
            user_id: "user_0000".into(),
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            success,
            error_message: None,
            response_time_ms: ms,
            rate_limited: false,
        }
    }

    #[test]
    fn finalize_computes_percentiles_and_rates() {
        let mut metrics = LoadTestMetrics::new("t".into(), LoadProfile::ConstantLoad, Utc::now());
        metrics.duration_seconds = 10.0;
        let results: Vec<_> = (1..=100).map(|i| result(i as f64, i <= 95)).collect();
        metrics.finalize(results);

        assert_eq!(metrics.total_requests, 100);
        assert_eq!(metrics.successful_requests, 95);
        assert_eq!(metrics.failed_requests, 5);
        assert!((metrics.success_rate - 0.95).abs() < 1e-9);
        assert_eq!(metrics.p50_response_time_ms, 51.0);
        assert_eq!(metrics.p99_response_time_ms, 100.0);
        assert_eq!(metrics.requests_per_second, 10.0);
    }

    #[test]
    fn finalize_on_empty_results_leaves_zeros() {
        let mut metrics = LoadTestMetrics::new("t".into(), LoadProfile::ConstantLoad, Utc::now());
        metrics.finalize(Vec::new());
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.success_rate, 0.0);
    }
}

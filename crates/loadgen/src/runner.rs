// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Load Generator orchestrator (§4.7): drives a [`Daemon`] through one of
//! six scaling profiles using single-threaded-cooperative virtual users —
//! the real concurrency lives in the processor being driven, not here.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vf_core::Clock;
use vf_daemon::Daemon;

use crate::config::LoadTestConfig;
use crate::generator::default_request_generator;
use crate::metrics::{LoadTestMetrics, ResourceSnapshot, TestPhase};
use crate::profile::LoadProfile;
use crate::virtual_user::{RequestGenerator, VirtualUser};

/// How often resource snapshots are sampled while a test runs (§4.7).
const RESOURCE_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);
/// Hard cap on retained snapshots per run, mirroring the teacher's
/// bounded-buffer discipline elsewhere in the workspace.
const MAX_SNAPSHOTS: usize = 1000;
/// How many completed runs `history()` keeps before trimming.
const MAX_HISTORY: usize = 100;
const HISTORY_TRIM_TO: usize = 50;

const BURST_DURATION: Duration = Duration::from_secs(30);
const BURST_REST: Duration = Duration::from_secs(60);

/// Orchestrates load tests against one [`Daemon`], tracking active and
/// historical runs the way `original_source`'s `LoadTester` does.
pub struct LoadTester<C: Clock> {
    daemon: Arc<Daemon<C>>,
    active: Mutex<Vec<LoadTestMetrics>>,
    history: Mutex<VecDeque<LoadTestMetrics>>,
}

impl<C: Clock + 'static> LoadTester<C> {
    pub fn new(daemon: Arc<Daemon<C>>) -> Arc<Self> {
        Arc::new(Self { daemon, active: Mutex::new(Vec::new()), history: Mutex::new(VecDeque::new()) })
    }

    /// Runs `config` to completion using the default request generator.
    pub async fn run(self: &Arc<Self>, config: LoadTestConfig) -> LoadTestMetrics {
        self.run_with_generator(config, Arc::new(default_request_generator)).await
    }

    /// Runs `config` to completion, sampling requests from `generator`
    /// instead of the built-in prompt/style/quality/duration set.
    pub async fn run_with_generator(self: &Arc<Self>, config: LoadTestConfig, generator: RequestGenerator) -> LoadTestMetrics {
        let start_time = Utc::now();
        let mut metrics = LoadTestMetrics::new(config.test_name.clone(), config.profile, start_time);
        metrics.phase = TestPhase::Running;
        self.active.lock().push(metrics.clone());

        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let monitor_stop = CancellationToken::new();
        let monitor_handle = {
            let governor = self.daemon.governor.clone();
            let snapshots = snapshots.clone();
            let stop = monitor_stop.clone();
            tokio::spawn(async move { sample_resources(governor, snapshots, stop).await })
        };

        info!(test = %config.test_name, profile = %config.profile, "starting load test");
        let (results, peak_concurrent_users) = self.execute(&config, generator).await;

        monitor_stop.cancel();
        let _ = monitor_handle.await;

        let end_time = Utc::now();
        metrics.resource_snapshots = std::mem::take(&mut *snapshots.lock());
        if metrics.resource_snapshots.len() > MAX_SNAPSHOTS {
            let drop_count = metrics.resource_snapshots.len() - MAX_SNAPSHOTS;
            metrics.resource_snapshots.drain(0..drop_count);
        }
        metrics.peak_concurrent_users = peak_concurrent_users;
        metrics.end_time = Some(end_time);
        metrics.duration_seconds = (end_time - start_time).num_milliseconds().max(0) as f64 / 1000.0;
        metrics.finalize(results);
        metrics.phase = TestPhase::Completed;

        info!(
            test = %config.test_name,
            total = metrics.total_requests,
            success_rate = metrics.success_rate,
            rps = metrics.requests_per_second,
            "load test completed"
        );

        self.active.lock().retain(|m| m.test_name != metrics.test_name);

        let mut history = self.history.lock();
        history.push_back(metrics.clone());
        if history.len() > MAX_HISTORY {
            let overflow = history.len() - HISTORY_TRIM_TO;
            for _ in 0..overflow {
                history.pop_front();
            }
        }
        metrics
    }

    /// Dispatches to the profile-specific scaling pattern and collects
    /// every virtual user's results plus the peak concurrent-user count
    /// observed over the run.
    async fn execute(&self, config: &LoadTestConfig, generator: RequestGenerator) -> (Vec<crate::metrics::RequestResult>, usize) {
        match config.profile {
            LoadProfile::ConstantLoad => self.run_constant_load(config, generator).await,
            LoadProfile::RampUp => self.run_ramp_up(config, generator).await,
            LoadProfile::Spike => self.run_spike(config, generator).await,
            LoadProfile::Stress => self.run_stress(config, generator).await,
            LoadProfile::Endurance => self.run_endurance(config, generator).await,
            LoadProfile::Burst => self.run_burst(config, generator).await,
        }
    }

    fn spawn_user(
        &self,
        daemon: Arc<Daemon<C>>,
        user_id: String,
        config: &LoadTestConfig,
        generator: RequestGenerator,
        stop: CancellationToken,
    ) -> tokio::task::JoinHandle<Vec<crate::metrics::RequestResult>> {
        let requests_per_user = config.requests_per_user;
        let think_time = Duration::from_secs_f64(config.think_time_seconds.max(0.0));
        let timeout = Duration::from_secs_f64(config.timeout_seconds.max(0.0));
        tokio::spawn(async move {
            let user = VirtualUser::new(user_id, daemon, requests_per_user, think_time, timeout, generator);
            user.run(stop).await
        })
    }

    async fn run_constant_load(&self, config: &LoadTestConfig, generator: RequestGenerator) -> (Vec<crate::metrics::RequestResult>, usize) {
        let stop = CancellationToken::new();
        let handles: Vec<_> = (0..config.max_concurrent_users)
            .map(|i| {
                self.spawn_user(self.daemon.clone(), format!("user_{i:04}"), config, generator.clone(), stop.clone())
            })
            .collect();
        let peak = handles.len();

        tokio::time::sleep(Duration::from_secs(config.duration_seconds)).await;
        stop.cancel();
        (join_all(handles).await, peak)
    }

    async fn run_ramp_up(&self, config: &LoadTestConfig, generator: RequestGenerator) -> (Vec<crate::metrics::RequestResult>, usize) {
        let stop = CancellationToken::new();
        let mut handles = Vec::with_capacity(config.max_concurrent_users);
        let users = config.max_concurrent_users.max(1);
        let interval = Duration::from_secs_f64(config.ramp_up_seconds as f64 / users as f64);

        for i in 0..config.max_concurrent_users {
            handles.push(self.spawn_user(self.daemon.clone(), format!("user_{i:04}"), config, generator.clone(), stop.clone()));
            if i + 1 < config.max_concurrent_users {
                tokio::time::sleep(interval).await;
            }
        }
        let peak = handles.len();

        tokio::time::sleep(Duration::from_secs(config.duration_seconds)).await;
        stop.cancel();
        (join_all(handles).await, peak)
    }

    async fn run_spike(&self, config: &LoadTestConfig, generator: RequestGenerator) -> (Vec<crate::metrics::RequestResult>, usize) {
        let stop = CancellationToken::new();
        let baseline = (config.max_concurrent_users / 4).max(1);
        let third = Duration::from_secs(config.duration_seconds / 3);

        let mut handles: Vec<_> = (0..baseline)
            .map(|i| self.spawn_user(self.daemon.clone(), format!("baseline_user_{i:04}"), config, generator.clone(), stop.clone()))
            .collect();

        tokio::time::sleep(third).await;

        let spike_users = config.max_concurrent_users.saturating_sub(baseline);
        for i in 0..spike_users {
            handles.push(self.spawn_user(self.daemon.clone(), format!("spike_user_{i:04}"), config, generator.clone(), stop.clone()));
        }
        let peak = handles.len();

        tokio::time::sleep(third).await;
        stop.cancel();
        tokio::time::sleep(third).await;
        (join_all(handles).await, peak)
    }

    async fn run_stress(&self, config: &LoadTestConfig, generator: RequestGenerator) -> (Vec<crate::metrics::RequestResult>, usize) {
        let stop = CancellationToken::new();
        let stress_users = ((config.max_concurrent_users as f64) * 1.5) as usize;
        let stress_users = stress_users.max(1);
        let interval = Duration::from_secs_f64(config.duration_seconds as f64 / stress_users as f64);

        let mut handles = Vec::with_capacity(stress_users);
        for i in 0..stress_users {
            handles.push(self.spawn_user(self.daemon.clone(), format!("stress_user_{i:04}"), config, generator.clone(), stop.clone()));
            if i + 1 < stress_users {
                tokio::time::sleep(interval).await;
            }
        }
        let peak = handles.len();

        stop.cancel();
        (join_all(handles).await, peak)
    }

    async fn run_endurance(&self, config: &LoadTestConfig, generator: RequestGenerator) -> (Vec<crate::metrics::RequestResult>, usize) {
        let stop = CancellationToken::new();
        let endurance_users = ((config.max_concurrent_users as f64) * 0.75) as usize;
        let endurance_users = endurance_users.max(1);
        let mut endurance_config = config.clone();
        endurance_config.requests_per_user = config.requests_per_user * 3;
        endurance_config.think_time_seconds = config.think_time_seconds * 2.0;

        let handles: Vec<_> = (0..endurance_users)
            .map(|i| {
                self.spawn_user(self.daemon.clone(), format!("endurance_user_{i:04}"), &endurance_config, generator.clone(), stop.clone())
            })
            .collect();
        let peak = handles.len();

        tokio::time::sleep(Duration::from_secs(config.duration_seconds)).await;
        stop.cancel();
        (join_all(handles).await, peak)
    }

    async fn run_burst(&self, config: &LoadTestConfig, generator: RequestGenerator) -> (Vec<crate::metrics::RequestResult>, usize) {
        let mut all_results = Vec::new();
        let mut peak = 0;
        let mut elapsed = Duration::ZERO;
        let total = Duration::from_secs(config.duration_seconds);
        let mut burst_count = 0u32;

        let mut burst_config = config.clone();
        burst_config.requests_per_user = 1;
        burst_config.think_time_seconds = 0.1;

        while elapsed < total {
            burst_count += 1;
            let stop = CancellationToken::new();
            let handles: Vec<_> = (0..config.max_concurrent_users)
                .map(|i| {
                    self.spawn_user(
                        self.daemon.clone(),
                        format!("burst_{burst_count}_user_{i:04}"),
                        &burst_config,
                        generator.clone(),
                        stop.clone(),
                    )
                })
                .collect();
            peak = peak.max(handles.len());

            tokio::time::sleep(BURST_DURATION).await;
            stop.cancel();
            all_results.extend(join_all(handles).await);
            elapsed += BURST_DURATION;

            if elapsed + BURST_REST < total {
                tokio::time::sleep(BURST_REST).await;
                elapsed += BURST_REST;
            } else {
                let remaining = total.saturating_sub(elapsed);
                if !remaining.is_zero() {
                    tokio::time::sleep(remaining).await;
                }
                break;
            }
        }
        (all_results, peak)
    }

    /// The run currently in flight with this name, or its completed
    /// history entry — `original_source`'s `get_test_status`.
    pub fn status(&self, test_name: &str) -> Option<LoadTestMetrics> {
        if let Some(m) = self.active.lock().iter().find(|m| m.test_name == test_name) {
            return Some(m.clone());
        }
        self.history.lock().iter().rev().find(|m| m.test_name == test_name).cloned()
    }

    pub fn history(&self) -> Vec<LoadTestMetrics> {
        self.history.lock().iter().cloned().collect()
    }
}

async fn join_all(handles: Vec<tokio::task::JoinHandle<Vec<crate::metrics::RequestResult>>>) -> Vec<crate::metrics::RequestResult> {
    let mut results = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(mut r) => results.append(&mut r),
            Err(err) => tracing::warn!(%err, "virtual user task panicked"),
        }
    }
    results
}

async fn sample_resources(governor: Arc<vf_engine::ResourceGovernor>, snapshots: Arc<Mutex<Vec<ResourceSnapshot>>>, stop: CancellationToken) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(RESOURCE_SAMPLE_INTERVAL) => {}
        }
        let sample = governor.current_usage();
        let mut snapshots = snapshots.lock();
        if snapshots.len() < MAX_SNAPSHOTS {
            snapshots.push(ResourceSnapshot {
                timestamp: sample.timestamp,
                cpu_percent: sample.cpu_percent,
                memory_percent: sample.mem_percent,
                disk_percent: sample.disk_percent,
                network_sent_mbps: sample.net_sent_mbps,
                network_recv_mbps: sample.net_recv_mbps,
            });
        }
    }
}

/// Writes `metrics` to `path` as pretty-printed JSON (§4.7: "results are
/// exportable to a JSON-equivalent file").
pub fn export_results(metrics: &LoadTestMetrics, path: &std::path::Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(metrics)?;
    std::fs::write(path, json)
}

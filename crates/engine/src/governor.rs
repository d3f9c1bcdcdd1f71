// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource Governor: samples OS resource usage, gates admission against
//! configured thresholds, and tracks a ledger of logical allocations
//! independent of live measurement.

use crate::error::GovernorError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use sysinfo::{Disks, Networks, System};
use vf_core::{AllocationId, GovernorConfig, Priority, ResourceAllocation, SessionId};

/// A single point-in-time resource reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub disk_percent: f64,
    pub mem_avail_gb: f64,
    pub disk_free_gb: f64,
    pub net_sent_mbps: f64,
    pub net_recv_mbps: f64,
    pub timestamp: DateTime<Utc>,
}

/// Source of OS resource readings, abstracted so tests can stub values
/// (Testable Property 7 / Scenario C: "stub sampler returns cpu%=99").
pub trait ResourceSampler: Send {
    fn sample(&mut self) -> ResourceSample;
}

/// Real sampler backed by `sysinfo`.
pub struct SysinfoSampler {
    system: System,
    last_net_sample: Option<DateTime<Utc>>,
    last_sent: u64,
    last_recv: u64,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self { system, last_net_sample: None, last_sent: 0, last_recv: 0 }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&mut self) -> ResourceSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let cpu_percent = self.system.global_cpu_usage() as f64;
        let total_mem = self.system.total_memory().max(1) as f64;
        let used_mem = self.system.used_memory() as f64;
        let mem_percent = used_mem / total_mem * 100.0;
        let mem_avail_gb = (total_mem - used_mem) / (1024.0 * 1024.0 * 1024.0);

        let disks = Disks::new_with_refreshed_list();
        let (disk_total, disk_avail) =
            disks.iter().fold((0u64, 0u64), |(t, a), d| (t + d.total_space(), a + d.available_space()));
        let disk_percent = if disk_total > 0 {
            (disk_total - disk_avail) as f64 / disk_total as f64 * 100.0
        } else {
            0.0
        };
        let disk_free_gb = disk_avail as f64 / (1024.0 * 1024.0 * 1024.0);

        let networks = Networks::new_with_refreshed_list();
        let (sent, recv) =
            networks.iter().fold((0u64, 0u64), |(s, r), (_, n)| (s + n.total_transmitted(), r + n.total_received()));
        let now = Utc::now();
        let (net_sent_mbps, net_recv_mbps) = match self.last_net_sample {
            Some(prev) => {
                let elapsed = (now - prev).num_milliseconds().max(1) as f64 / 1000.0;
                let sent_mbps = (sent.saturating_sub(self.last_sent) as f64 * 8.0 / 1_000_000.0) / elapsed;
                let recv_mbps = (recv.saturating_sub(self.last_recv) as f64 * 8.0 / 1_000_000.0) / elapsed;
                (sent_mbps, recv_mbps)
            }
            None => (0.0, 0.0),
        };
        self.last_net_sample = Some(now);
        self.last_sent = sent;
        self.last_recv = recv;

        ResourceSample {
            cpu_percent,
            mem_percent,
            disk_percent,
            mem_avail_gb,
            disk_free_gb,
            net_sent_mbps,
            net_recv_mbps,
            timestamp: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Cpu,
    Memory,
    Disk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub resource: ResourceKind,
    pub level: AlertLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Availability {
    pub cpu_total: f64,
    pub cpu_allocated: f64,
    pub cpu_available: f64,
    pub memory_total_mb: u64,
    pub memory_allocated_mb: u64,
    pub memory_available_mb: u64,
    pub disk_total_mb: u64,
    pub disk_allocated_mb: u64,
    pub disk_available_mb: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GcStats {
    pub bytes_freed: u64,
    pub objects_collected: u64,
}

struct Totals {
    cpu_cores: f64,
    memory_mb: u64,
    disk_mb: u64,
}

pub struct ResourceGovernor {
    config: GovernorConfig,
    sampler: Mutex<Box<dyn ResourceSampler>>,
    history: Mutex<VecDeque<ResourceSample>>,
    allocations: Mutex<HashMap<AllocationId, ResourceAllocation>>,
    alerts: Mutex<HashMap<(ResourceKind, AlertLevel), Alert>>,
}

impl ResourceGovernor {
    pub fn new(config: GovernorConfig, sampler: Box<dyn ResourceSampler>) -> Arc<Self> {
        Arc::new(Self {
            config,
            sampler: Mutex::new(sampler),
            history: Mutex::new(VecDeque::new()),
            allocations: Mutex::new(HashMap::new()),
            alerts: Mutex::new(HashMap::new()),
        })
    }

    fn history_capacity(&self) -> usize {
        let samples_per_hour = 3600 / self.config.monitor_interval_seconds.max(1);
        (samples_per_hour * self.config.history_hours) as usize
    }

    /// Take one synchronous sample, without touching history or alerts.
    pub fn current_usage(&self) -> ResourceSample {
        self.sampler.lock().sample()
    }

    /// Sample, append to the ring buffer, and evaluate thresholds. Called by
    /// the sampler loop every `monitor_interval_seconds`; exposed directly so
    /// tests can drive one iteration without a background task.
    pub fn run_sampling_once(&self) -> ResourceSample {
        let sample = self.current_usage();

        let mut history = self.history.lock();
        history.push_back(sample);
        let cap = self.history_capacity().max(1);
        while history.len() > cap {
            history.pop_front();
        }
        drop(history);

        self.evaluate_thresholds(ResourceKind::Cpu, sample.cpu_percent, self.config.cpu.warning_percent, self.config.cpu.critical_percent);
        self.evaluate_thresholds(ResourceKind::Memory, sample.mem_percent, self.config.memory.warning_percent, self.config.memory.critical_percent);
        self.evaluate_thresholds(ResourceKind::Disk, sample.disk_percent, self.config.disk.warning_percent, self.config.disk.critical_percent);

        sample
    }

    fn evaluate_thresholds(&self, resource: ResourceKind, value: f64, warning: f64, critical: f64) {
        let mut alerts = self.alerts.lock();
        if value >= critical {
            alerts.entry((resource, AlertLevel::Critical)).or_insert_with(|| Alert {
                resource,
                level: AlertLevel::Critical,
                message: format!("{resource:?} at {value:.1}% exceeds critical threshold {critical:.1}%"),
                at: Utc::now(),
            });
        } else if value >= warning {
            alerts.remove(&(resource, AlertLevel::Critical));
            alerts.entry((resource, AlertLevel::Warning)).or_insert_with(|| Alert {
                resource,
                level: AlertLevel::Warning,
                message: format!("{resource:?} at {value:.1}% exceeds warning threshold {warning:.1}%"),
                at: Utc::now(),
            });
        } else {
            alerts.remove(&(resource, AlertLevel::Warning));
            alerts.remove(&(resource, AlertLevel::Critical));
        }
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().values().cloned().collect()
    }

    /// True if the most recent sample crosses the critical threshold on any
    /// dimension. Drives the Processor's auto-pause (§4.3 admission step 2).
    pub fn any_critical(&self) -> bool {
        self.alerts.lock().keys().any(|(_, level)| *level == AlertLevel::Critical)
    }

    /// True if no dimension is at or above its warning threshold. Drives
    /// auto-resume.
    pub fn all_under_warning(&self) -> bool {
        self.alerts.lock().is_empty()
    }

    fn totals(&self) -> Totals {
        Totals {
            cpu_cores: self.config.total_cpu_cores,
            memory_mb: self.config.total_memory_mb,
            disk_mb: self.config.total_disk_mb,
        }
    }

    fn allocated(&self) -> (f64, u64, u64) {
        self.allocations.lock().values().filter(|a| a.active).fold((0.0, 0u64, 0u64), |(c, m, d), a| {
            (c + a.cpu_cores, m + a.memory_mb, d + a.disk_mb)
        })
    }

    pub fn availability(&self) -> Availability {
        let totals = self.totals();
        let (cpu_allocated, mem_allocated, disk_allocated) = self.allocated();
        Availability {
            cpu_total: totals.cpu_cores,
            cpu_allocated,
            cpu_available: (totals.cpu_cores - cpu_allocated).max(0.0),
            memory_total_mb: totals.memory_mb,
            memory_allocated_mb: mem_allocated,
            memory_available_mb: totals.memory_mb.saturating_sub(mem_allocated),
            disk_total_mb: totals.disk_mb,
            disk_allocated_mb: disk_allocated,
            disk_available_mb: totals.disk_mb.saturating_sub(disk_allocated),
        }
    }

    pub fn can_allocate(&self, cpu_cores: f64, memory_mb: u64, disk_mb: u64) -> (bool, Option<String>) {
        let availability = self.availability();
        if cpu_cores > availability.cpu_available {
            return (false, Some(format!("cpu request {cpu_cores} exceeds available {}", availability.cpu_available)));
        }
        if memory_mb > availability.memory_available_mb {
            return (
                false,
                Some(format!("memory request {memory_mb}mb exceeds available {}mb", availability.memory_available_mb)),
            );
        }
        if disk_mb > availability.disk_available_mb {
            return (false, Some(format!("disk request {disk_mb}mb exceeds available {}mb", availability.disk_available_mb)));
        }
        (true, None)
    }

    pub fn allocate(
        &self,
        session_id: SessionId,
        cpu_cores: f64,
        memory_mb: u64,
        disk_mb: u64,
        priority: Priority,
    ) -> Result<AllocationId, GovernorError> {
        let (allowed, reason) = self.can_allocate(cpu_cores, memory_mb, disk_mb);
        if !allowed {
            return Err(GovernorError::Denied { reason: reason.unwrap_or_default() });
        }
        let allocation = ResourceAllocation::new(session_id, cpu_cores, memory_mb, disk_mb, priority);
        let id = allocation.id;
        self.allocations.lock().insert(id, allocation);
        Ok(id)
    }

    pub fn deallocate(&self, id: AllocationId) -> Result<(), GovernorError> {
        let mut allocations = self.allocations.lock();
        match allocations.get_mut(&id) {
            Some(a) if a.active => {
                a.active = false;
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(GovernorError::NotFound(id)),
        }
    }

    /// Rust has no manual heap reclamation to trigger; this drops inactive
    /// allocation records from the ledger and reports that as the collected
    /// delta, matching the *shape* of the spec's GC hook without pretending
    /// to free OS memory.
    pub fn force_gc(&self) -> GcStats {
        let mut allocations = self.allocations.lock();
        let before = allocations.len();
        allocations.retain(|_, a| a.active);
        let collected = before - allocations.len();
        GcStats { bytes_freed: 0, objects_collected: collected as u64 }
    }

    pub fn usage_history(&self, hours: u64) -> Vec<ResourceSample> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        self.history.lock().iter().filter(|s| s.timestamp >= cutoff).cloned().collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct FakeSampler {
    pub sample: Arc<Mutex<ResourceSample>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeSampler {
    pub fn new(sample: ResourceSample) -> (Self, Arc<Mutex<ResourceSample>>) {
        let shared = Arc::new(Mutex::new(sample));
        (Self { sample: shared.clone() }, shared)
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ResourceSampler for FakeSampler {
    fn sample(&mut self) -> ResourceSample {
        *self.sample.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f64) -> ResourceSample {
        ResourceSample {
            cpu_percent: cpu,
            mem_percent: 10.0,
            disk_percent: 10.0,
            mem_avail_gb: 10.0,
            disk_free_gb: 100.0,
            net_sent_mbps: 0.0,
            net_recv_mbps: 0.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn can_allocate_denies_over_available() {
        let (sampler, _) = FakeSampler::new(sample(10.0));
        let gov = ResourceGovernor::new(GovernorConfig { total_cpu_cores: 4.0, ..Default::default() }, Box::new(sampler));
        let (allowed, reason) = gov.can_allocate(8.0, 0, 0);
        assert!(!allowed);
        assert!(reason.unwrap().contains("cpu"));
    }

    #[test]
    fn allocate_then_deallocate_frees_capacity() {
        let (sampler, _) = FakeSampler::new(sample(10.0));
        let gov = ResourceGovernor::new(GovernorConfig { total_cpu_cores: 4.0, ..Default::default() }, Box::new(sampler));
        let id = gov.allocate(SessionId::new(), 4.0, 0, 0, Priority::Normal).unwrap();
        assert!(!gov.can_allocate(1.0, 0, 0).0);
        gov.deallocate(id).unwrap();
        assert!(gov.can_allocate(4.0, 0, 0).0);
    }

    #[test]
    fn critical_sample_trips_alert_then_clears() {
        let (sampler, shared) = FakeSampler::new(sample(99.0));
        let gov = ResourceGovernor::new(GovernorConfig::default(), Box::new(sampler));
        gov.run_sampling_once();
        assert!(gov.any_critical());

        *shared.lock() = sample(10.0);
        gov.run_sampling_once();
        assert!(!gov.any_critical());
        assert!(gov.all_under_warning());
    }

    #[test]
    fn force_gc_drops_inactive_allocations() {
        let (sampler, _) = FakeSampler::new(sample(10.0));
        let gov = ResourceGovernor::new(GovernorConfig::default(), Box::new(sampler));
        let id = gov.allocate(SessionId::new(), 1.0, 0, 0, Priority::Normal).unwrap();
        gov.deallocate(id).unwrap();
        let stats = gov.force_gc();
        assert_eq!(stats.objects_collected, 1);
    }

    #[test]
    fn usage_history_respects_capacity() {
        let (sampler, _) = FakeSampler::new(sample(10.0));
        let gov = ResourceGovernor::new(
            GovernorConfig { monitor_interval_seconds: 3600, history_hours: 2, ..Default::default() },
            Box::new(sampler),
        );
        for _ in 0..5 {
            gov.run_sampling_once();
        }
        assert!(gov.usage_history(24).len() <= 2);
    }
}

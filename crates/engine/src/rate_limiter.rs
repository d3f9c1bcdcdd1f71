// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate Limiter: per-service token buckets with optional per-user
//! sub-buckets, plus a sliding statistics window.
//!
//! Every interaction refills before acting: `Δ = now - last_refill; L =
//! min(C, L + Δ·R)`. A request for `n` tokens succeeds iff `L ≥ n`; on
//! denial the bucket is left untouched and the reported delay is
//! `(n - L) / R` — the time until enough tokens would have accrued.

use crate::error::RateLimitError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use vf_core::{RateLimiterConfig, ServiceLimits};

const STATS_WINDOW: chrono::Duration = chrono::Duration::hours(1);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    capacity: f64,
    refill_per_second: f64,
    level: f64,
    last_refill: DateTime<Utc>,
}

impl Bucket {
    fn new(limits: ServiceLimits, now: DateTime<Utc>) -> Self {
        Self { capacity: limits.capacity, refill_per_second: limits.refill_per_second, level: limits.capacity, last_refill: now }
    }

    fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        self.level = (self.level + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;
    }

    /// Preview-only: refills and reports what `try_acquire` would do,
    /// without mutating `level`.
    fn preview(&self, now: DateTime<Utc>) -> (bool, f64, f64) {
        let mut copy = *self;
        copy.refill(now);
        let allowed = copy.level >= 1.0;
        let delay = if allowed { 0.0 } else { (1.0 - copy.level) / copy.refill_per_second.max(f64::MIN_POSITIVE) };
        (allowed, delay, copy.level)
    }

    fn try_acquire(&mut self, n: f64, now: DateTime<Utc>) -> (bool, f64) {
        self.refill(now);
        if self.level >= n {
            self.level -= n;
            (true, 0.0)
        } else {
            let delay = (n - self.level) / self.refill_per_second.max(f64::MIN_POSITIVE);
            (false, delay)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct LogEntry {
    at: DateTime<Utc>,
    success: bool,
    latency_ms: f64,
    rate_limited: bool,
}

struct ServiceState {
    limits: ServiceLimits,
    bucket: Mutex<Bucket>,
    per_user: Mutex<HashMap<String, Bucket>>,
    log: Mutex<VecDeque<LogEntry>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub allowed_rps: f64,
    pub current_rps: f64,
    pub tokens_available: f64,
    pub queue_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatistics {
    pub total_last_hour: u64,
    pub rate_limited: u64,
    pub rate_limited_pct: f64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total_last_hour: u64,
    pub rate_limited: u64,
    pub rate_limited_pct: f64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub per_service: HashMap<String, ServiceStatistics>,
}

/// Per-named-service token bucket rate limiter (§4.5).
pub struct RateLimiter {
    services: HashMap<String, ServiceState>,
    unknown_warned: Mutex<HashSet<String>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let now = Utc::now();
        let services = config
            .services
            .into_iter()
            .map(|(name, limits)| {
                (
                    name,
                    ServiceState {
                        limits,
                        bucket: Mutex::new(Bucket::new(limits, now)),
                        per_user: Mutex::new(HashMap::new()),
                        log: Mutex::new(VecDeque::new()),
                    },
                )
            })
            .collect();
        Self { services, unknown_warned: Mutex::new(HashSet::new()) }
    }

    fn warn_unknown_once(&self, service: &str) {
        let mut warned = self.unknown_warned.lock();
        if warned.insert(service.to_string()) {
            tracing::warn!(service, "rate limiter: unknown service, failing open");
        }
    }

    /// Non-mutating preview of what `acquire` would report right now.
    pub fn check(&self, service: &str, user: Option<&str>) -> (bool, f64) {
        let Some(state) = self.services.get(service) else {
            self.warn_unknown_once(service);
            return (true, 0.0);
        };
        let now = Utc::now();
        let (svc_allowed, svc_delay, _) = state.bucket.lock().preview(now);
        if !svc_allowed {
            return (false, svc_delay);
        }
        if let Some(user) = user {
            let per_user = state.per_user.lock();
            if let Some(bucket) = per_user.get(user) {
                let (allowed, delay, _) = bucket.preview(now);
                return (allowed, delay);
            }
        }
        (true, 0.0)
    }

    /// Mutating acquisition of `n` tokens. When `user` is given, the request
    /// must clear both the service-wide bucket and that user's sub-bucket —
    /// acquiring from the service bucket on a denial at the user level would
    /// violate "L is non-negative after any acquisition" by double-spending
    /// tokens no caller actually consumed, so the service bucket is only
    /// charged once the user-level check has also cleared.
    pub fn acquire(&self, service: &str, user: Option<&str>, n: f64) -> Result<(), RateLimitError> {
        let Some(state) = self.services.get(service) else {
            self.warn_unknown_once(service);
            return Ok(());
        };
        let now = Utc::now();

        if let Some(user) = user {
            let mut per_user = state.per_user.lock();
            let bucket = per_user.entry(user.to_string()).or_insert_with(|| Bucket::new(state.limits, now));
            let (allowed, delay) = bucket.try_acquire(n, now);
            if !allowed {
                return Err(RateLimitError::Denied { requested: n, available: bucket.level, delay });
            }
            drop(per_user);

            let mut svc_bucket = state.bucket.lock();
            let (allowed, delay) = svc_bucket.try_acquire(n, now);
            if !allowed {
                drop(svc_bucket);
                // Service bucket denied after the user bucket already
                // cleared — refund so the user's draw never outlives a
                // request that didn't actually go through.
                let mut per_user = state.per_user.lock();
                if let Some(bucket) = per_user.get_mut(user) {
                    bucket.level = (bucket.level + n).min(bucket.capacity);
                }
                return Err(RateLimitError::Denied { requested: n, available: 0.0, delay });
            }
            return Ok(());
        }

        let mut svc_bucket = state.bucket.lock();
        let (allowed, delay) = svc_bucket.try_acquire(n, now);
        if !allowed {
            return Err(RateLimitError::Denied { requested: n, available: svc_bucket.level, delay });
        }
        Ok(())
    }

    pub fn record(&self, service: &str, success: bool, latency_ms: f64, rate_limited: bool) {
        let Some(state) = self.services.get(service) else {
            return;
        };
        let mut log = state.log.lock();
        log.push_back(LogEntry { at: Utc::now(), success, latency_ms, rate_limited });
        Self::trim(&mut log);
    }

    fn trim(log: &mut VecDeque<LogEntry>) {
        let cutoff = Utc::now() - STATS_WINDOW;
        while log.front().map(|e| e.at < cutoff).unwrap_or(false) {
            log.pop_front();
        }
    }

    pub fn service_status(&self, service: &str) -> Option<ServiceStatus> {
        let state = self.services.get(service)?;
        let now = Utc::now();
        let tokens_available = state.bucket.lock().preview(now).2;
        let one_sec_ago = now - chrono::Duration::seconds(1);
        let current_rps = state.log.lock().iter().filter(|e| e.at >= one_sec_ago).count() as f64;
        Some(ServiceStatus {
            allowed_rps: state.limits.refill_per_second,
            current_rps,
            tokens_available,
            queue_size: 0,
        })
    }

    fn summarize(log: &VecDeque<LogEntry>) -> ServiceStatistics {
        let total = log.len() as u64;
        let rate_limited = log.iter().filter(|e| e.rate_limited).count() as u64;
        let successes = log.iter().filter(|e| e.success).count() as u64;
        let avg_latency = if total > 0 { log.iter().map(|e| e.latency_ms).sum::<f64>() / total as f64 } else { 0.0 };
        ServiceStatistics {
            total_last_hour: total,
            rate_limited,
            rate_limited_pct: if total > 0 { rate_limited as f64 / total as f64 * 100.0 } else { 0.0 },
            success_rate: if total > 0 { successes as f64 / total as f64 * 100.0 } else { 0.0 },
            avg_latency_ms: avg_latency,
        }
    }

    pub fn statistics(&self) -> Statistics {
        let mut per_service = HashMap::new();
        let mut all = VecDeque::new();
        for (name, state) in &self.services {
            let mut log = state.log.lock();
            Self::trim(&mut log);
            per_service.insert(name.clone(), Self::summarize(&log));
            all.extend(log.iter().copied());
        }
        let overall = Self::summarize(&all);
        Statistics {
            total_last_hour: overall.total_last_hour,
            rate_limited: overall.rate_limited,
            rate_limited_pct: overall.rate_limited_pct,
            success_rate: overall.success_rate,
            avg_latency_ms: overall.avg_latency_ms,
            per_service,
        }
    }

    /// Spawns a background task that discards stats-log entries older than
    /// one hour every minute, matching §4.5's "background trimmer". Callers
    /// that never spawn this still get correct statistics — every read path
    /// trims lazily — this only bounds memory between reads.
    pub fn spawn_trimmer(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                for state in self.services.values() {
                    let mut log = state.log.lock();
                    Self::trim(&mut log);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn limiter(capacity: f64, refill: f64) -> RateLimiter {
        let mut services = Map::new();
        services.insert("tts".to_string(), ServiceLimits { capacity, refill_per_second: refill, per_minute: 1000, per_hour: 10_000 });
        RateLimiter::new(RateLimiterConfig { services })
    }

    #[test]
    fn scenario_d_bucket_refill_and_drain() {
        let limiter = limiter(3.0, 1.0);
        // L=0 initially refilled to capacity by `new`; drain it first.
        for _ in 0..3 {
            limiter.acquire("tts", None, 1.0).unwrap();
        }
        let err = limiter.acquire("tts", None, 1.0).unwrap_err();
        match err {
            RateLimitError::Denied { delay, .. } => assert!((delay - 1.0).abs() < 0.05),
        }
    }

    #[test]
    fn unknown_service_fails_open() {
        let limiter = limiter(1.0, 1.0);
        let (allowed, delay) = limiter.check("unknown", None);
        assert!(allowed);
        assert_eq!(delay, 0.0);
    }

    #[test]
    fn denial_leaves_bucket_untouched() {
        let limiter = limiter(1.0, 0.001);
        limiter.acquire("tts", None, 1.0).unwrap();
        let before = limiter.service_status("tts").unwrap().tokens_available;
        assert!(limiter.acquire("tts", None, 1.0).is_err());
        let after = limiter.service_status("tts").unwrap().tokens_available;
        assert!((before - after).abs() < 1e-6);
    }

    #[test]
    fn per_user_subbucket_gates_independently_of_other_users() {
        let limiter = limiter(1.0, 0.0);
        limiter.acquire("tts", Some("alice"), 1.0).unwrap();
        assert!(limiter.acquire("tts", Some("alice"), 1.0).is_err());
        // bob has his own sub-bucket, unaffected by alice's draw.
        assert!(limiter.acquire("tts", Some("bob"), 1.0).is_ok());
    }

    #[test]
    fn record_and_statistics_aggregate() {
        let limiter = limiter(10.0, 1.0);
        limiter.record("tts", true, 120.0, false);
        limiter.record("tts", false, 50.0, true);
        let stats = limiter.statistics();
        assert_eq!(stats.total_last_hour, 2);
        assert_eq!(stats.rate_limited, 1);
        assert!((stats.success_rate - 50.0).abs() < 1e-6);
    }
}

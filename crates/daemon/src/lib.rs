// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vf-daemon: wires the Session Store, Resource Governor, Progress
//! Monitor, Rate Limiter, Concurrent Processor, and Maintenance Sweeper
//! into one running process, and dispatches the control-plane
//! [`vf_wire::Request`]/[`vf_wire::Response`] pair against them.

pub mod env;
pub mod error;
pub mod listener;
pub mod maintenance;
pub mod processor;

pub use error::{LifecycleError, ProcessorError, SessionNotFound};
pub use maintenance::{MaintenanceSweeper, SweepReport};
pub use processor::{ConcurrentProcessor, ProcessorMetricsSnapshot, ProcessorState, TaskLookup};

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use vf_adapters::{FakeStageAgent, StageRouter};
use vf_core::{CategorizedError, Clock, SystemClock, VfConfig};
use vf_engine::{ResourceGovernor, SysinfoSampler};
use vf_engine::{ProgressMonitor, RateLimiter};
use vf_storage::{ListFilters, SessionStore};
use vf_wire::{
    HealthView, ProcessorMetrics, RateLimitStatusView, Request, Response, ResourceUsageView,
    SessionDto, StatusRecord, SweepReportDto, TaskState,
};

/// Everything one running vidforge process needs, generic over the clock
/// so tests can substitute [`vf_core::FakeClock`].
pub struct Daemon<C: Clock> {
    pub config: VfConfig,
    pub store: Arc<SessionStore<C>>,
    pub governor: Arc<ResourceGovernor>,
    pub progress: Arc<ProgressMonitor<C>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub processor: Arc<ConcurrentProcessor<C>>,
    sweeper: Arc<MaintenanceSweeper<C>>,
}

impl<C: Clock + 'static> Daemon<C> {
    /// Wires every component together over an already-open store, without
    /// starting any background task. Callers that want the full running
    /// process (sampler loop, trimmer, processor, sweeper) should use
    /// [`Daemon::bootstrap`]; this constructor exists for tests that want
    /// to drive individual pieces without the ambient tasks running.
    pub fn assemble(config: VfConfig, store: Arc<SessionStore<C>>, clock: C) -> Arc<Self> {
        let sampler = Box::new(SysinfoSampler::new());
        let governor = ResourceGovernor::new(config.governor.clone(), sampler);
        let progress = Arc::new(ProgressMonitor::new(store.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limiter.clone()));
        let router = Arc::new(StageRouter::fake_for_all_stages(Arc::new(FakeStageAgent::default())));
        let processor = ConcurrentProcessor::new(
            config.processor.clone(),
            store.clone(),
            governor.clone(),
            progress.clone(),
            rate_limiter.clone(),
            router,
            clock,
        );
        let logs_dir = config.logging.log_dir.clone().unwrap_or_else(|| config.storage.temp_dir.join("logs"));
        let sweeper = Arc::new(MaintenanceSweeper::new(
            config.maintenance.clone(),
            store.clone(),
            config.storage.temp_dir.clone(),
            logs_dir,
        ));
        Arc::new(Self { config, store, governor, progress, rate_limiter, processor, sweeper })
    }

    /// Starts the processor's admission loop, the governor sampler, the
    /// rate-limiter trimmer, and the maintenance sweeper, each as its own
    /// tokio task.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        self.processor.start();
        RateLimiter::spawn_trimmer(self.rate_limiter.clone());

        let governor = self.governor.clone();
        let interval_secs = self.config.governor.monitor_interval_seconds.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                governor.run_sampling_once();
            }
        });

        let sweeper = self.sweeper.clone();
        let interval_secs = self.config.maintenance.interval_seconds.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                let report = sweeper.sweep();
                if !report.errors.is_empty() {
                    warn!(errors = ?report.errors, "maintenance sweep completed with errors");
                } else {
                    info!(
                        sessions_cleaned = report.sessions_cleaned,
                        files_deleted = report.files_deleted,
                        "maintenance sweep completed"
                    );
                }
            }
        });
    }

    /// Health view: every component is considered healthy unless the
    /// processor has stopped or the governor reports a critical resource.
    pub fn health(&self) -> HealthView {
        let mut components = std::collections::HashMap::new();
        let processor_ok = !matches!(self.processor.state(), ProcessorState::Stopped | ProcessorState::Stopping);
        let governor_ok = !self.governor.any_critical();
        components.insert("processor".to_string(), processor_ok);
        components.insert("governor".to_string(), governor_ok);
        components.insert("storage".to_string(), true);
        HealthView { ok: processor_ok && governor_ok, components }
    }

    fn status_record(&self, request_id: &str) -> Option<StatusRecord> {
        let (session_id, task_id, state) = match self.processor.lookup(request_id) {
            TaskLookup::Queued(q) => (q.session_id, q.request_id.to_string(), TaskState::Queued),
            TaskLookup::Active(t) => (t.session_id, t.task_id.to_string(), TaskState::Processing),
            TaskLookup::Completed(entry) => (entry.task.session_id, entry.task.task_id.to_string(), TaskState::Completed),
            TaskLookup::NotFound => return None,
        };
        let session = self.store.get(session_id)?;
        Some(StatusRecord {
            request_id: task_id,
            session_id,
            state,
            status: session.status,
            stage: session.stage,
            progress: session.progress,
            estimated_completion: session.estimated_completion,
            error: session.error,
        })
    }

    fn resource_usage_view(&self) -> ResourceUsageView {
        let system = self.governor.current_usage();
        let availability = self.governor.availability();
        ResourceUsageView {
            system,
            cpu_allocated: availability.cpu_allocated,
            cpu_available: availability.cpu_available,
            memory_allocated_mb: availability.memory_allocated_mb,
            memory_available_mb: availability.memory_available_mb,
            disk_allocated_mb: availability.disk_allocated_mb,
            disk_available_mb: availability.disk_available_mb,
            processor_state: format!("{:?}", self.processor.state()).to_lowercase(),
        }
    }

    fn rate_limit_status_view(&self, service: Option<&str>) -> RateLimitStatusView {
        let mut per_service = std::collections::HashMap::new();
        if let Some(service) = service {
            if let Some(status) = self.rate_limiter.service_status(service) {
                per_service.insert(service.to_string(), status);
            }
        } else {
            for name in self.config.rate_limiter.services.keys() {
                if let Some(status) = self.rate_limiter.service_status(name) {
                    per_service.insert(name.clone(), status);
                }
            }
        }
        RateLimitStatusView { per_service, statistics: self.rate_limiter.statistics() }
    }

    /// Dispatches one control-plane request against the wired components,
    /// converting every error into `Response::Error` with a stable
    /// [`vf_core::ErrorKind`] tag instead of ever unwinding.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Submit { request, user, priority } => {
                match self.processor.submit(request, user, priority.unwrap_or_default()) {
                    Ok(id) => Response::Submitted { request_id: id.to_string() },
                    Err(err) => error_response(&err),
                }
            }
            Request::Status { request_id } => match self.status_record(&request_id) {
                Some(record) => Response::Status(record),
                None => Response::NotFound,
            },
            Request::ListSessions { filters } => {
                let filters = ListFilters { user: filters.user, status: filters.status, limit: filters.limit };
                let sessions = self.store.list(&filters).into_iter().map(SessionDto::from).collect();
                Response::Sessions(sessions)
            }
            Request::Cancel { request_id } => {
                if self.processor.cancel(&request_id) {
                    Response::Cancelled
                } else {
                    Response::NotFound
                }
            }
            Request::Metrics => {
                let snapshot = self.processor.metrics();
                Response::Metrics(ProcessorMetrics {
                    total_processed: snapshot.total_processed,
                    total_failed: snapshot.total_failed,
                    total_queued: snapshot.total_queued,
                    current_active: snapshot.current_active,
                    current_queue_size: snapshot.current_queue_size,
                    avg_processing_seconds: snapshot.avg_processing_seconds,
                    peak_concurrent: snapshot.peak_concurrent,
                    uptime_seconds: snapshot.uptime_seconds,
                })
            }
            Request::ResourceUsage => Response::ResourceUsage(self.resource_usage_view()),
            Request::RateLimitStatus { service } => {
                Response::RateLimitStatus(self.rate_limit_status_view(service.as_deref()))
            }
            Request::Health => Response::Health(self.health()),
            Request::Start => Response::Started { ok: self.processor.start() },
            Request::Pause => {
                self.processor.pause();
                Response::Paused
            }
            Request::Resume => {
                self.processor.resume();
                Response::Resumed
            }
            Request::Stop { timeout_seconds } => {
                let timeout = timeout_seconds.map(Duration::from_secs).unwrap_or(Duration::from_secs(u64::MAX / 2));
                let graceful = self.processor.stop(timeout).await;
                Response::Stopped { graceful }
            }
            Request::Sweep => Response::SweepReport(sweep_report_dto(self.sweeper.sweep())),
        }
    }

    /// Runs one maintenance sweep pass immediately, outside the background
    /// interval task.
    pub fn sweep(&self) -> SweepReport {
        self.sweeper.sweep()
    }

    /// Stops the processor, draining active workers up to `timeout`.
    pub async fn shutdown(&self, timeout: Duration) {
        self.processor.stop(timeout).await;
    }
}

fn sweep_report_dto(report: SweepReport) -> SweepReportDto {
    SweepReportDto {
        sessions_cleaned: report.sessions_cleaned,
        files_deleted: report.files_deleted,
        directories_deleted: report.directories_deleted,
        bytes_freed: report.bytes_freed,
        errors: report.errors,
    }
}

impl Daemon<SystemClock> {
    /// Opens the session store at `config.storage.sessions_dir`, wires
    /// every component, and starts the background tasks. The entrypoint
    /// `vfd` binary (and any embedding-CLI `vf run`) uses this.
    pub fn bootstrap(config: VfConfig) -> Result<Arc<Self>, LifecycleError> {
        std::fs::create_dir_all(&config.storage.sessions_dir)?;
        std::fs::create_dir_all(&config.storage.temp_dir)?;
        let store = Arc::new(SessionStore::open(config.storage.sessions_dir.clone(), SystemClock)?);
        let daemon = Self::assemble(config, store, SystemClock);
        daemon.spawn_background_tasks();
        Ok(daemon)
    }
}

fn error_response(err: &(impl CategorizedError + std::fmt::Display)) -> Response {
    Response::Error { kind: format!("{:?}", err.kind()).to_lowercase(), message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{FakeClock, JobRequest, Quality};

    fn config(dir: &std::path::Path) -> VfConfig {
        let mut cfg = VfConfig::default();
        cfg.storage.sessions_dir = dir.join("sessions");
        cfg.storage.temp_dir = dir.join("temp");
        cfg.processor.max_concurrent_requests = 2;
        cfg
    }

    fn request() -> JobRequest {
        JobRequest { prompt: "p".into(), duration_seconds: 30, style: "s".into(), voice: "v".into(), quality: Quality::Medium }
    }

    fn daemon(dir: &std::path::Path) -> Arc<Daemon<FakeClock>> {
        let clock = FakeClock::default();
        let store = Arc::new(SessionStore::open(config(dir).storage.sessions_dir, clock.clone()).unwrap());
        Daemon::assemble(config(dir), store, clock)
    }

    #[tokio::test]
    async fn health_reflects_stopped_processor_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon(dir.path());
        let health = daemon.health();
        assert!(!health.components["processor"]);
    }

    #[tokio::test]
    async fn submit_then_status_round_trips_through_handle() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon(dir.path());
        daemon.processor.start();

        let response = daemon
            .handle(Request::Submit { request: request(), user: Some("alice".into()), priority: None })
            .await;
        let Response::Submitted { request_id } = response else { panic!("expected submitted") };

        let status = daemon.handle(Request::Status { request_id }).await;
        assert!(matches!(status, Response::Status(_)));
    }

    #[tokio::test]
    async fn status_for_unknown_request_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon(dir.path());
        let response = daemon.handle(Request::Status { request_id: "req-missing".into() }).await;
        assert!(matches!(response, Response::NotFound));
    }

    #[tokio::test]
    async fn submit_before_start_surfaces_categorized_capacity_error() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon(dir.path());
        let response = daemon.handle(Request::Submit { request: request(), user: None, priority: None }).await;
        match response {
            Response::Error { kind, .. } => assert_eq!(kind, "capacity"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn health_request_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon(dir.path());
        let response = daemon.handle(Request::Health).await;
        assert!(matches!(response, Response::Health(_)));
    }
}

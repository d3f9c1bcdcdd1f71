// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent Processor (§4.3): a bounded worker pool consuming a priority
//! queue, gated by the Resource Governor, driving sessions through the
//! stage pipeline. The admission loop runs as a dedicated tokio task.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vf_adapters::{StageContext, StageRouter};
use vf_core::{
    Clock, JobRequest, ProcessingTask, ProcessorConfig, Priority, Quality, QueuedRequest,
    RequestId, SessionId, SessionStatus, SessionUpdate, Stage, TaskOutcome, PIPELINE,
};
use vf_engine::{ProgressMonitor, RateLimiter, ResourceGovernor};
use vf_storage::SessionStore;

use crate::error::ProcessorError;

/// Admission loop tick when there's nothing to do.
const IDLE_TICK: Duration = Duration::from_millis(50);

/// How many [`CompletedTask`](vf_core::CompletedTask) records the processor
/// keeps in memory for `status()`/`metrics()` lookups before evicting the
/// oldest.
const COMPLETED_HISTORY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
}

struct ActiveEntry {
    task: ProcessingTask,
    cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub(crate) struct CompletedEntry {
    pub(crate) task: ProcessingTask,
    pub(crate) finished_at: DateTime<Utc>,
    pub(crate) outcome: TaskOutcome,
}

#[derive(Default)]
struct MetricsInner {
    total_processed: u64,
    total_failed: u64,
    total_queued: u64,
    peak_concurrent: usize,
    processing_seconds_sum: f64,
    processing_count: u64,
}

pub struct ProcessorMetricsSnapshot {
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_queued: u64,
    pub current_active: usize,
    pub current_queue_size: usize,
    pub avg_processing_seconds: f64,
    pub peak_concurrent: usize,
    pub uptime_seconds: u64,
}

/// Coarse lifecycle bucket for a request id, per §4.3 `status`.
pub enum TaskLookup {
    Queued(QueuedRequest),
    Active(ProcessingTask),
    Completed(CompletedEntry),
    NotFound,
}

impl ActiveEntry {
    fn duration_seconds(now: DateTime<Utc>, started_at: DateTime<Utc>) -> f64 {
        (now - started_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}

pub struct ConcurrentProcessor<C: Clock> {
    config: ProcessorConfig,
    state: Mutex<ProcessorState>,
    auto_paused: AtomicBool,
    queue: Mutex<BinaryHeap<Reverse<QueuedRequest>>>,
    active: Mutex<std::collections::HashMap<RequestId, ActiveEntry>>,
    completed: Mutex<VecDeque<CompletedEntry>>,
    metrics: Mutex<MetricsInner>,
    store: Arc<SessionStore<C>>,
    governor: Arc<ResourceGovernor>,
    progress: Arc<ProgressMonitor<C>>,
    rate_limiter: Arc<RateLimiter>,
    router: Arc<StageRouter>,
    clock: C,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    started_at: Mutex<Option<std::time::Instant>>,
    admission_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    next_worker_id: AtomicUsize,
}

impl<C: Clock + 'static> ConcurrentProcessor<C> {
    pub fn new(
        config: ProcessorConfig,
        store: Arc<SessionStore<C>>,
        governor: Arc<ResourceGovernor>,
        progress: Arc<ProgressMonitor<C>>,
        rate_limiter: Arc<RateLimiter>,
        router: Arc<StageRouter>,
        clock: C,
    ) -> Arc<Self> {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Arc::new(Self {
            config,
            state: Mutex::new(ProcessorState::Stopped),
            auto_paused: AtomicBool::new(false),
            queue: Mutex::new(BinaryHeap::new()),
            active: Mutex::new(std::collections::HashMap::new()),
            completed: Mutex::new(VecDeque::new()),
            metrics: Mutex::new(MetricsInner::default()),
            store,
            governor,
            progress,
            rate_limiter,
            router,
            clock,
            permits,
            shutdown: CancellationToken::new(),
            started_at: Mutex::new(None),
            admission_handle: Mutex::new(None),
            next_worker_id: AtomicUsize::new(0),
        })
    }

    fn wall_now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.epoch_ms() as i64).unwrap_or_else(Utc::now)
    }

    pub fn state(&self) -> ProcessorState {
        *self.state.lock()
    }

    /// stopped → starting → running. Spawns the admission loop.
    pub fn start(self: &Arc<Self>) -> bool {
        {
            let mut state = self.state.lock();
            if *state != ProcessorState::Stopped {
                return false;
            }
            *state = ProcessorState::Starting;
        }
        *self.started_at.lock() = Some(std::time::Instant::now());
        *self.state.lock() = ProcessorState::Running;
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.admission_loop().await });
        *self.admission_handle.lock() = Some(handle);
        info!("processor started");
        true
    }

    /// running → paused: halts new admissions; in-flight work continues.
    pub fn pause(&self) -> bool {
        let mut state = self.state.lock();
        if *state != ProcessorState::Running {
            return false;
        }
        *state = ProcessorState::Paused;
        true
    }

    /// paused → running.
    pub fn resume(&self) -> bool {
        let mut state = self.state.lock();
        if *state != ProcessorState::Paused {
            return false;
        }
        *state = ProcessorState::Running;
        true
    }

    /// any → stopping → stopped: cancels in-flight work, drains the worker
    /// pool up to `timeout_duration`, then joins the admission loop.
    pub async fn stop(&self, timeout_duration: Duration) -> bool {
        {
            let mut state = self.state.lock();
            if *state == ProcessorState::Stopped {
                return true;
            }
            *state = ProcessorState::Stopping;
        }
        self.shutdown.cancel();

        let deadline = tokio::time::Instant::now() + timeout_duration;
        loop {
            if self.active.lock().is_empty() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("stop timeout reached with active tasks still running");
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        if let Some(handle) = self.admission_handle.lock().take() {
            handle.abort();
        }
        *self.state.lock() = ProcessorState::Stopped;
        info!("processor stopped");
        true
    }

    /// Estimate processing duration per §4.3:
    /// `clamp(base + duration_factor*duration, 5min, 1h) * quality_multiplier`.
    fn estimate_duration_seconds(request: &JobRequest) -> u64 {
        const BASE_SECONDS: f64 = 300.0;
        const DURATION_FACTOR: f64 = 2.0;
        let base = BASE_SECONDS + DURATION_FACTOR * request.duration_seconds as f64;
        let clamped = base.clamp(300.0, 3600.0);
        (clamped * request.quality.multiplier()) as u64
    }

    pub fn submit(
        &self,
        request: JobRequest,
        user: Option<String>,
        priority: Priority,
    ) -> Result<RequestId, ProcessorError> {
        request.validate()?;
        {
            let state = *self.state.lock();
            if !matches!(state, ProcessorState::Running | ProcessorState::Paused) {
                return Err(ProcessorError::NotRunning);
            }
        }

        let max_queue = self.config.max_queue_size;
        let mut queue = self.queue.lock();
        if queue.len() >= max_queue {
            return Err(ProcessorError::QueueFull { size: queue.len(), max: max_queue });
        }

        let session = self.store.create(request.clone(), user)?;
        self.store.update_status(
            session.id,
            SessionUpdate::default()
                .status(SessionStatus::Queued)
                .stage(Stage::Initializing)
                .progress(0.0),
        )?;
        self.progress.start(session.id, None);

        let estimated_duration_seconds = Self::estimate_duration_seconds(&request);
        let request_id = RequestId::new();
        queue.push(Reverse(QueuedRequest {
            request_id,
            session_id: session.id,
            request,
            priority,
            submitted_at: self.wall_now(),
            estimated_duration_seconds,
        }));
        drop(queue);

        self.metrics.lock().total_queued += 1;
        Ok(request_id)
    }

    /// Sets the cooperative shutdown flag for one in-flight task only,
    /// leaving the rest of the pool untouched.
    pub fn cancel(&self, request_id: &str) -> bool {
        let active = self.active.lock();
        if let Some(entry) = active.values().find(|e| e.task.task_id.as_str() == request_id) {
            entry.cancel.cancel();
            return true;
        }
        // Cancelling a still-queued request: drop it from the queue and
        // mark its session cancelled directly, since no worker owns it yet.
        drop(active);
        let mut queue = self.queue.lock();
        let found = queue.iter().find(|Reverse(q)| q.request_id.as_str() == request_id).is_some();
        if found {
            let items: Vec<_> = std::mem::take(&mut *queue).into_iter().collect();
            let mut session_id = None;
            for Reverse(q) in items {
                if q.request_id.as_str() == request_id {
                    session_id = Some(q.session_id);
                    continue;
                }
                queue.push(Reverse(q));
            }
            drop(queue);
            if let Some(session_id) = session_id {
                let _ = self.store.update_status(
                    session_id,
                    SessionUpdate::default()
                        .status(SessionStatus::Cancelled)
                        .error("cancelled"),
                );
            }
            return true;
        }
        false
    }

    pub fn lookup(&self, request_id: &str) -> TaskLookup {
        if let Some(entry) = self.active.lock().values().find(|e| e.task.task_id.as_str() == request_id) {
            return TaskLookup::Active(entry.task.clone());
        }
        if let Some(entry) = self.completed.lock().iter().find(|e| e.task.task_id.as_str() == request_id) {
            return TaskLookup::Completed(entry.clone());
        }
        if let Some(q) = self.queue.lock().iter().find(|Reverse(q)| q.request_id.as_str() == request_id) {
            return TaskLookup::Queued(q.0.clone());
        }
        TaskLookup::NotFound
    }

    pub fn metrics(&self) -> ProcessorMetricsSnapshot {
        let metrics = self.metrics.lock();
        let avg = if metrics.processing_count > 0 {
            metrics.processing_seconds_sum / metrics.processing_count as f64
        } else {
            0.0
        };
        ProcessorMetricsSnapshot {
            total_processed: metrics.total_processed,
            total_failed: metrics.total_failed,
            total_queued: metrics.total_queued,
            current_active: self.active.lock().len(),
            current_queue_size: self.queue.lock().len(),
            avg_processing_seconds: avg,
            peak_concurrent: metrics.peak_concurrent,
            uptime_seconds: self.started_at.lock().map(|t| t.elapsed().as_secs()).unwrap_or(0),
        }
    }

    async fn admission_loop(self: Arc<Self>) {
        loop {
            if self.shutdown.is_cancelled() {
                debug!("admission loop observed shutdown, exiting");
                return;
            }

            let state = *self.state.lock();
            if state == ProcessorState::Stopping || state == ProcessorState::Stopped {
                return;
            }

            // Step 2: governor-induced auto-pause/auto-resume, transparent
            // to callers — accepted jobs simply sit in the queue.
            if state == ProcessorState::Running {
                if self.governor.any_critical() {
                    if !self.auto_paused.swap(true, Ordering::SeqCst) {
                        warn!("governor reports critical resource usage, auto-pausing admission");
                    }
                } else if self.auto_paused.load(Ordering::SeqCst) && self.governor.all_under_warning() {
                    self.auto_paused.store(false, Ordering::SeqCst);
                    info!("resource usage back under warning threshold, resuming admission");
                }
            }

            let paused = state == ProcessorState::Paused || self.auto_paused.load(Ordering::SeqCst);
            if paused || self.active.lock().len() >= self.config.max_concurrent_requests {
                tokio::time::sleep(IDLE_TICK).await;
                continue;
            }

            let next = self.queue.lock().pop();
            let Some(Reverse(queued)) = next else {
                tokio::time::sleep(IDLE_TICK).await;
                continue;
            };

            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                // Lost the race against another admission; put it back.
                self.queue.lock().push(Reverse(queued));
                tokio::time::sleep(IDLE_TICK).await;
                continue;
            };

            self.admit(queued, permit);
        }
    }

    fn admit(self: &Arc<Self>, queued: QueuedRequest, permit: tokio::sync::OwnedSemaphorePermit) {
        let worker_id = vf_core::WorkerId::from_string(format!(
            "wkr-{:019}",
            self.next_worker_id.fetch_add(1, Ordering::SeqCst)
        ));
        let now = self.wall_now();
        let projected_completion =
            now + chrono::Duration::seconds(queued.estimated_duration_seconds as i64);
        let task = ProcessingTask {
            task_id: queued.request_id,
            session_id: queued.session_id,
            request: queued.request.clone(),
            started_at: now,
            worker_id,
            projected_completion,
        };
        let cancel = self.shutdown.child_token();
        self.active.lock().insert(task.task_id, ActiveEntry { task: task.clone(), cancel: cancel.clone() });

        let active_count = self.active.lock().len();
        {
            let mut metrics = self.metrics.lock();
            if active_count > metrics.peak_concurrent {
                metrics.peak_concurrent = active_count;
            }
        }

        if let Err(err) = self.store.update_status(
            task.session_id,
            SessionUpdate::default()
                .status(SessionStatus::Processing)
                .stage(Stage::Researching)
                .progress(0.1),
        ) {
            warn!(%err, "failed to persist admission status update");
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.run_worker(&task, cancel).await;
            this.finish(task, outcome, permit);
        });
    }

    async fn run_worker(&self, task: &ProcessingTask, cancel: CancellationToken) -> TaskOutcome {
        let worker_timeout = Duration::from_secs(self.config.worker_timeout_seconds);
        let run = self.walk_pipeline(task, cancel.clone());
        match timeout(worker_timeout, run).await {
            Ok(outcome) => outcome,
            Err(_) => TaskOutcome::TimedOut,
        }
    }

    async fn walk_pipeline(&self, task: &ProcessingTask, cancel: CancellationToken) -> TaskOutcome {
        for stage in PIPELINE.iter().skip(1) {
            if cancel.is_cancelled() {
                return TaskOutcome::Cancelled;
            }
            if let Err(outcome) = self.run_stage(task, *stage).await {
                return outcome;
            }
            if cancel.is_cancelled() {
                return TaskOutcome::Cancelled;
            }
        }
        TaskOutcome::Completed
    }

    async fn run_stage(&self, task: &ProcessingTask, stage: Stage) -> Result<(), TaskOutcome> {
        let project_state = self.store.get_project_state(task.session_id).unwrap_or_default();
        let ctx = StageContext {
            session_id: task.session_id,
            stage,
            project_state,
            rate_limiter: Arc::clone(&self.rate_limiter),
        };
        match self.router.run_stage(&ctx).await {
            Ok(patch) => {
                if let Err(err) = self.store.update_project_state(task.session_id, patch) {
                    warn!(%err, "failed to persist project state patch");
                }
                if let Err(err) = self.progress.advance(task.session_id, stage) {
                    warn!(%err, "failed to persist progress advance");
                }
                Ok(())
            }
            Err(err) => {
                error!(session_id = %task.session_id, %stage, %err, "stage failed");
                Err(TaskOutcome::Failed(err.to_string()))
            }
        }
    }

    fn finish(&self, task: ProcessingTask, outcome: TaskOutcome, _permit: tokio::sync::OwnedSemaphorePermit) {
        self.active.lock().remove(&task.task_id);

        let finished_at = self.wall_now();
        let processing_seconds = ActiveEntry::duration_seconds(finished_at, task.started_at);
        {
            let mut metrics = self.metrics.lock();
            metrics.processing_seconds_sum += processing_seconds;
            metrics.processing_count += 1;
            match outcome {
                TaskOutcome::Completed => metrics.total_processed += 1,
                _ => metrics.total_failed += 1,
            }
        }

        let (success, error) = match &outcome {
            TaskOutcome::Completed => (true, None),
            TaskOutcome::Failed(msg) => (false, Some(msg.clone())),
            TaskOutcome::TimedOut => (false, Some("worker timed out".to_string())),
            TaskOutcome::Cancelled => (false, Some("cancelled".to_string())),
        };
        if let Err(err) = self.progress.complete(task.session_id, success, error) {
            warn!(%err, "failed to persist completion");
        }

        let mut completed = self.completed.lock();
        completed.push_back(CompletedEntry { task, finished_at, outcome });
        while completed.len() > COMPLETED_HISTORY {
            completed.pop_front();
        }
    }
}

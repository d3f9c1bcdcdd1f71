// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress Monitor: weighted per-stage progress and ETA, writing through
//! to the session store on every update.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vf_core::{SessionId, SessionUpdate, Stage, StageWeights, PIPELINE};
use vf_storage::{SessionStore, StorageError};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageProgress {
    pub progress: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProgress {
    pub overall: f64,
    pub per_stage: HashMap<String, StageProgress>,
    pub current_stage: Stage,
    pub estimated_completion: Option<DateTime<Utc>>,
}

struct Tracked {
    weights: StageWeights,
    per_stage: HashMap<Stage, StageProgress>,
    current_stage: Stage,
    started_at: DateTime<Utc>,
}

pub struct ProgressMonitor<C: vf_core::Clock> {
    store: std::sync::Arc<SessionStore<C>>,
    tracked: Mutex<HashMap<SessionId, Tracked>>,
}

impl<C: vf_core::Clock> ProgressMonitor<C> {
    pub fn new(store: std::sync::Arc<SessionStore<C>>) -> Self {
        Self { store, tracked: Mutex::new(HashMap::new()) }
    }

    pub fn start(&self, session_id: SessionId, weights: Option<StageWeights>) {
        let weights = weights.unwrap_or_default();
        let now = Utc::now();
        let mut per_stage = HashMap::new();
        per_stage.insert(Stage::Initializing, StageProgress { progress: 0.0, started_at: Some(now), completed_at: None });
        self.tracked.lock().insert(
            session_id,
            Tracked { weights, per_stage, current_stage: Stage::Initializing, started_at: now },
        );
    }

    fn overall_progress(weights: &StageWeights, per_stage: &HashMap<Stage, StageProgress>) -> f64 {
        PIPELINE
            .iter()
            .map(|stage| weights.weight(*stage) * per_stage.get(stage).map(|s| s.progress).unwrap_or(0.0))
            .sum()
    }

    /// Overall progress = Σ(completed-stage-weight) + current-stage-weight × progress-in-stage.
    pub fn update_stage_progress(
        &self,
        session_id: SessionId,
        stage: Stage,
        progress_in_stage: f64,
    ) -> Result<f64, StorageError> {
        let progress_in_stage = progress_in_stage.clamp(0.0, 1.0);
        let mut tracked_guard = self.tracked.lock();
        let tracked = tracked_guard.entry(session_id).or_insert_with(|| Tracked {
            weights: StageWeights::default(),
            per_stage: HashMap::new(),
            current_stage: stage,
            started_at: Utc::now(),
        });
        tracked.current_stage = stage;
        let entry = tracked.per_stage.entry(stage).or_insert_with(|| StageProgress { progress: 0.0, started_at: Some(Utc::now()), completed_at: None });
        entry.progress = progress_in_stage;
        if (progress_in_stage - 1.0).abs() < f64::EPSILON {
            entry.completed_at = Some(Utc::now());
        }
        let overall = Self::overall_progress(&tracked.weights, &tracked.per_stage);
        let eta = self.estimate_eta(tracked.started_at, overall);
        drop(tracked_guard);

        self.store.update_status(
            session_id,
            SessionUpdate::default().stage(stage).progress(overall).estimated_completion_opt(eta),
        )?;
        Ok(overall)
    }

    /// Marks all earlier pipeline stages complete, sets the current stage.
    pub fn advance(&self, session_id: SessionId, new_stage: Stage) -> Result<f64, StorageError> {
        let index = new_stage.pipeline_index();
        let mut tracked_guard = self.tracked.lock();
        let tracked = tracked_guard.entry(session_id).or_insert_with(|| Tracked {
            weights: StageWeights::default(),
            per_stage: HashMap::new(),
            current_stage: new_stage,
            started_at: Utc::now(),
        });
        if let Some(index) = index {
            for stage in &PIPELINE[..index] {
                let entry = tracked.per_stage.entry(*stage).or_insert_with(StageProgress::default);
                entry.progress = 1.0;
                entry.completed_at.get_or_insert(Utc::now());
            }
        }
        tracked.per_stage.entry(new_stage).or_insert_with(|| StageProgress { progress: 0.0, started_at: Some(Utc::now()), completed_at: None });
        tracked.current_stage = new_stage;
        let overall = Self::overall_progress(&tracked.weights, &tracked.per_stage);
        let eta = self.estimate_eta(tracked.started_at, overall);
        drop(tracked_guard);

        self.store.update_status(
            session_id,
            SessionUpdate::default().stage(new_stage).progress(overall).estimated_completion_opt(eta),
        )?;
        Ok(overall)
    }

    /// `success` marks every pipeline stage complete and overall progress 1.
    /// Failure preserves whatever partial overall progress had accrued.
    pub fn complete(&self, session_id: SessionId, success: bool, error: Option<String>) -> Result<(), StorageError> {
        let mut tracked_guard = self.tracked.lock();
        let overall = if let Some(tracked) = tracked_guard.get_mut(&session_id) {
            if success {
                for stage in PIPELINE.iter() {
                    let entry = tracked.per_stage.entry(*stage).or_insert_with(StageProgress::default);
                    entry.progress = 1.0;
                    entry.completed_at.get_or_insert(Utc::now());
                }
                tracked.current_stage = Stage::Completed;
                1.0
            } else {
                tracked.current_stage = Stage::Failed;
                Self::overall_progress(&tracked.weights, &tracked.per_stage)
            }
        } else if success {
            1.0
        } else {
            0.0
        };
        drop(tracked_guard);

        let status = if success { vf_core::SessionStatus::Completed } else { vf_core::SessionStatus::Failed };
        let stage = if success { Stage::Completed } else { Stage::Failed };
        let mut update = SessionUpdate::default().status(status).stage(stage).progress(overall);
        if let Some(error) = error {
            update = update.error(error);
        }
        self.store.update_status(session_id, update)?;
        Ok(())
    }

    pub fn progress(&self, session_id: SessionId) -> Option<SessionProgress> {
        let tracked_guard = self.tracked.lock();
        let tracked = tracked_guard.get(&session_id)?;
        let overall = Self::overall_progress(&tracked.weights, &tracked.per_stage);
        let per_stage = tracked
            .per_stage
            .iter()
            .map(|(stage, p)| (stage.to_string(), *p))
            .collect();
        let eta = self.estimate_eta(tracked.started_at, overall);
        Some(SessionProgress { overall, per_stage, current_stage: tracked.current_stage, estimated_completion: eta })
    }

    /// Linear extrapolation from elapsed wall time and overall progress.
    fn estimate_eta(&self, started_at: DateTime<Utc>, overall: f64) -> Option<DateTime<Utc>> {
        if overall <= 0.0 || overall >= 1.0 {
            return None;
        }
        let elapsed = Utc::now() - started_at;
        let total_estimate_ms = elapsed.num_milliseconds() as f64 / overall;
        let remaining_ms = total_estimate_ms - elapsed.num_milliseconds() as f64;
        Some(Utc::now() + chrono::Duration::milliseconds(remaining_ms.max(0.0) as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{FakeClock, JobRequest, Quality};

    fn store() -> std::sync::Arc<SessionStore<FakeClock>> {
        let dir = tempfile::tempdir().unwrap();
        std::sync::Arc::new(SessionStore::open(dir.keep(), FakeClock::default()).unwrap())
    }

    fn request() -> JobRequest {
        JobRequest { prompt: "p".into(), duration_seconds: 30, style: "s".into(), voice: "v".into(), quality: Quality::Medium }
    }

    #[test]
    fn update_stage_progress_weights_correctly() {
        let store = store();
        let session = store.create(request(), None).unwrap();
        let monitor = ProgressMonitor::new(store.clone());
        monitor.start(session.id, None);
        let overall = monitor.update_stage_progress(session.id, Stage::Researching, 0.5).unwrap();
        // initializing(0.05) fully implicit zero + researching(0.10 * 0.5) = 0.05
        assert!((overall - 0.05).abs() < 1e-9);
    }

    #[test]
    fn advance_marks_earlier_stages_complete() {
        let store = store();
        let session = store.create(request(), None).unwrap();
        let monitor = ProgressMonitor::new(store.clone());
        monitor.start(session.id, None);
        let overall = monitor.advance(session.id, Stage::AssetSourcing).unwrap();
        // initializing + researching + scripting = 0.05 + 0.10 + 0.15 = 0.30
        assert!((overall - 0.30).abs() < 1e-9);
    }

    #[test]
    fn complete_success_sets_overall_to_one() {
        let store = store();
        let session = store.create(request(), None).unwrap();
        let monitor = ProgressMonitor::new(store.clone());
        monitor.start(session.id, None);
        monitor.complete(session.id, true, None).unwrap();
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.progress, 1.0);
        assert_eq!(fetched.status, vf_core::SessionStatus::Completed);
    }

    #[test]
    fn complete_failure_preserves_partial_progress() {
        let store = store();
        let session = store.create(request(), None).unwrap();
        let monitor = ProgressMonitor::new(store.clone());
        monitor.start(session.id, None);
        monitor.advance(session.id, Stage::Scripting).unwrap();
        monitor.complete(session.id, false, Some("boom".into())).unwrap();
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.status, vf_core::SessionStatus::Failed);
        assert_eq!(fetched.error.as_deref(), Some("boom"));
        assert!(fetched.progress > 0.0);
    }
}

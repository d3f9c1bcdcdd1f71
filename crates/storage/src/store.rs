// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session store: create/read/update/list/delete over durable session
//! snapshots, plus startup crash recovery.
//!
//! A single [`parking_lot::Mutex`] guards the in-memory index. Every
//! mutation updates the index and writes the snapshot through before
//! returning, so the two never drift: a reader either sees the old value
//! or the fully-applied new one, never a partial update.

use crate::error::StorageError;
use crate::record::{self, LoadOutcome, SessionRecord, CURRENT_SNAPSHOT_VERSION};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use vf_core::{
    Clock, JobRequest, ProjectState, ProjectStatePatch, Session, SessionId, SessionStatus,
    SessionUpdate,
};

/// Filters accepted by [`SessionStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub user: Option<String>,
    pub status: Option<SessionStatus>,
    pub limit: Option<usize>,
}

struct Entry {
    session: Session,
    project_state: ProjectState,
}

fn wall_now<C: Clock>(clock: &C) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(clock.epoch_ms() as i64).unwrap_or_else(Utc::now)
}

pub struct SessionStore<C: Clock> {
    dir: PathBuf,
    clock: C,
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

impl<C: Clock> SessionStore<C> {
    /// Open (or create) the store rooted at `dir`, replaying any snapshots
    /// already present. Malformed snapshots are quarantined rather than
    /// dropped, and recovery never fails the whole open for one bad file.
    pub fn open(dir: impl Into<PathBuf>, clock: C) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io { path: dir.clone(), source })?;
        let quarantine_dir = dir.join("quarantine");
        std::fs::create_dir_all(&quarantine_dir)
            .map_err(|source| StorageError::Io { path: quarantine_dir.clone(), source })?;

        let mut sessions = HashMap::new();
        let read_dir = std::fs::read_dir(&dir).map_err(|source| StorageError::Io { path: dir.clone(), source })?;
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match record::read(&path) {
                Ok(LoadOutcome::Loaded(rec)) => {
                    sessions.insert(rec.session.id, Entry { session: rec.session, project_state: rec.project_state });
                }
                Ok(LoadOutcome::Corrupt(reason)) => {
                    tracing::warn!(path = %path.display(), %reason, "quarantining malformed session snapshot");
                    let dest = quarantine_dir.join(path.file_name().unwrap_or_default());
                    let _ = std::fs::rename(&path, &dest);
                }
                Err(source) => {
                    tracing::warn!(path = %path.display(), %source, "failed to read session snapshot, skipping");
                }
            }
        }

        Ok(Self { dir, clock, sessions: Mutex::new(sessions) })
    }

    fn path_for(&self, id: SessionId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    fn persist(&self, id: SessionId, entry: &Entry) -> Result<(), StorageError> {
        let record = SessionRecord {
            version: CURRENT_SNAPSHOT_VERSION,
            session: entry.session.clone(),
            project_state: entry.project_state.clone(),
            saved_at: wall_now(&self.clock),
        };
        let path = self.path_for(id);
        record::write_atomic(&path, &record).map_err(|source| StorageError::Io { path, source })
    }

    pub fn create(&self, request: JobRequest, submitter: Option<String>) -> Result<Session, StorageError> {
        let now = wall_now(&self.clock);
        let session = Session::new(SessionId::new(), request, submitter, now);
        let entry = Entry { session: session.clone(), project_state: ProjectState::default() };
        self.persist(session.id, &entry)?;
        self.sessions.lock().insert(session.id, entry);
        Ok(session)
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.lock().get(&id).map(|e| e.session.clone())
    }

    pub fn get_project_state(&self, id: SessionId) -> Option<ProjectState> {
        self.sessions.lock().get(&id).map(|e| e.project_state.clone())
    }

    /// Sessions matching `filters`, newest `created_at` first.
    pub fn list(&self, filters: &ListFilters) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .lock()
            .values()
            .map(|e| e.session.clone())
            .filter(|s| filters.user.is_none() || s.submitter.as_deref() == filters.user.as_deref())
            .filter(|s| filters.status.is_none() || filters.status == Some(s.status))
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filters.limit {
            sessions.truncate(limit);
        }
        sessions
    }

    /// Applies `update`, rejecting any stage transition that would move
    /// backward through the pipeline order unless the target is `failed`
    /// (§4.1 "Rejects stage transitions that would move backward").
    pub fn update_status(&self, id: SessionId, update: SessionUpdate) -> Result<Session, StorageError> {
        let mut guard = self.sessions.lock();
        let entry = guard.get_mut(&id).ok_or(StorageError::NotFound(id))?;
        if let Some(stage) = update.stage {
            if !entry.session.stage.can_transition_to(stage) {
                return Err(StorageError::InvalidStageTransition { id, from: entry.session.stage, to: stage });
            }
        }
        if let Some(status) = update.status {
            entry.session.status = status;
        }
        if let Some(stage) = update.stage {
            entry.session.stage = stage;
        }
        if let Some(progress) = update.progress {
            entry.session.progress = progress.clamp(0.0, 1.0);
        }
        if let Some(error) = update.error {
            entry.session.error = Some(error);
        }
        if let Some(eta) = update.estimated_completion {
            entry.session.estimated_completion = Some(eta);
        }
        entry.session.updated_at = wall_now(&self.clock);
        let session = entry.session.clone();
        let snapshot = Entry { session: session.clone(), project_state: entry.project_state.clone() };
        drop(guard);
        self.persist(id, &snapshot)?;
        Ok(session)
    }

    pub fn update_project_state(&self, id: SessionId, patch: ProjectStatePatch) -> Result<ProjectState, StorageError> {
        let mut guard = self.sessions.lock();
        let entry = guard.get_mut(&id).ok_or(StorageError::NotFound(id))?;
        entry.project_state.apply_patch(patch);
        entry.session.updated_at = wall_now(&self.clock);
        let project_state = entry.project_state.clone();
        let snapshot = Entry { session: entry.session.clone(), project_state: project_state.clone() };
        drop(guard);
        self.persist(id, &snapshot)?;
        Ok(project_state)
    }

    pub fn add_intermediate_file(&self, id: SessionId, path: PathBuf) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock();
        let entry = guard.get_mut(&id).ok_or(StorageError::NotFound(id))?;
        entry.project_state.add_intermediate_file(path);
        entry.session.updated_at = wall_now(&self.clock);
        let snapshot = Entry { session: entry.session.clone(), project_state: entry.project_state.clone() };
        drop(guard);
        self.persist(id, &snapshot)
    }

    /// Removes the session's snapshot. If `cleanup_files` is set, also
    /// best-effort unlinks every file in its `ProjectState.intermediate_files`
    /// — failures to unlink an individual file are logged, never fatal.
    pub fn delete(&self, id: SessionId, cleanup_files: bool) -> Result<(), StorageError> {
        let removed = self.sessions.lock().remove(&id);
        let entry = removed.ok_or(StorageError::NotFound(id))?;
        let path = self.path_for(id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| StorageError::Io { path, source })?;
        }
        if cleanup_files {
            for file in &entry.project_state.intermediate_files {
                if let Err(err) = std::fs::remove_file(file) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %file.display(), %err, "failed to remove intermediate file");
                    }
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    /// The store's notion of "now", derived from the same [`Clock`] every
    /// mutation timestamps against. Callers computing session age (e.g. the
    /// Maintenance Sweeper's retention windows) must compare against this
    /// rather than [`chrono::Utc::now()`] directly, so that swapping in a
    /// [`vf_core::FakeClock`] makes age comparisons deterministic under test.
    pub fn now(&self) -> DateTime<Utc> {
        wall_now(&self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{FakeClock, Quality, SessionStatus, Stage};

    fn request() -> JobRequest {
        JobRequest { prompt: "p".into(), duration_seconds: 30, style: "s".into(), voice: "v".into(), quality: Quality::Medium }
    }

    #[test]
    fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path(), FakeClock::default()).unwrap();
        let session = store.create(request(), Some("alice".into())).unwrap();
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.id, session.id);
        assert_eq!(fetched.status, SessionStatus::Queued);
    }

    #[test]
    fn update_status_clamps_progress_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path(), FakeClock::default()).unwrap();
        let session = store.create(request(), None).unwrap();
        let updated = store
            .update_status(session.id, SessionUpdate::default().progress(1.7).stage(Stage::Researching))
            .unwrap();
        assert_eq!(updated.progress, 1.0);
        assert_eq!(updated.stage, Stage::Researching);
    }

    #[test]
    fn update_project_state_only_touches_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path(), FakeClock::default()).unwrap();
        let session = store.create(request(), None).unwrap();
        store
            .update_project_state(
                session.id,
                ProjectStatePatch { script: Some(serde_json::json!({"scenes": 2})), ..Default::default() },
            )
            .unwrap();
        let state = store.get_project_state(session.id).unwrap();
        assert_eq!(state.script, Some(serde_json::json!({"scenes": 2})));
        assert!(state.research.is_none());
    }

    #[test]
    fn add_intermediate_file_is_idempotent_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path(), FakeClock::default()).unwrap();
        let session = store.create(request(), None).unwrap();
        let path = PathBuf::from("/tmp/clip1.mp4");
        store.add_intermediate_file(session.id, path.clone()).unwrap();
        store.add_intermediate_file(session.id, path.clone()).unwrap();
        let state = store.get_project_state(session.id).unwrap();
        assert_eq!(state.intermediate_files, vec![path]);
    }

    #[test]
    fn delete_removes_from_index_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path(), FakeClock::default()).unwrap();
        let session = store.create(request(), None).unwrap();
        let path = store.path_for(session.id);
        assert!(path.exists());
        store.delete(session.id, false).unwrap();
        assert!(store.get(session.id).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn operations_on_unknown_session_return_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path(), FakeClock::default()).unwrap();
        let err = store.update_status(SessionId::new(), SessionUpdate::default()).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn reopen_recovers_existing_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::default();
        let id = {
            let store = SessionStore::open(dir.path(), clock.clone()).unwrap();
            store.create(request(), None).unwrap().id
        };
        let reopened = SessionStore::open(dir.path(), clock).unwrap();
        assert!(reopened.get(id).is_some());
    }

    #[test]
    fn reopen_quarantines_malformed_snapshot_and_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::default();
        let good_id = {
            let store = SessionStore::open(dir.path(), clock.clone()).unwrap();
            store.create(request(), None).unwrap().id
        };
        std::fs::write(dir.path().join("not-a-uuid.json"), b"{ broken").unwrap();

        let reopened = SessionStore::open(dir.path(), clock).unwrap();
        assert!(reopened.get(good_id).is_some());
        assert!(dir.path().join("quarantine/not-a-uuid.json").exists());
    }
}

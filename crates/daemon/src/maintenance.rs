// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maintenance Sweeper (§4.6): a periodic janitor that expires old
//! sessions, reclaims temp/log disk usage, and sweeps orphaned
//! intermediate files.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;
use vf_core::{Clock, MaintenanceConfig, SessionStatus};
use vf_storage::{ListFilters, SessionStore};

#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    pub sessions_cleaned: u64,
    pub files_deleted: u64,
    pub directories_deleted: u64,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}

impl SweepReport {
    fn merge(&mut self, other: SweepReport) {
        self.sessions_cleaned += other.sessions_cleaned;
        self.files_deleted += other.files_deleted;
        self.directories_deleted += other.directories_deleted;
        self.bytes_freed += other.bytes_freed;
        self.errors.extend(other.errors);
    }
}

pub struct MaintenanceSweeper<C: Clock> {
    config: MaintenanceConfig,
    store: std::sync::Arc<SessionStore<C>>,
    temp_dir: PathBuf,
    logs_dir: PathBuf,
}

impl<C: Clock> MaintenanceSweeper<C> {
    pub fn new(
        config: MaintenanceConfig,
        store: std::sync::Arc<SessionStore<C>>,
        temp_dir: PathBuf,
        logs_dir: PathBuf,
    ) -> Self {
        Self { config, store, temp_dir, logs_dir }
    }

    /// Runs one full pass. Every step's errors are recorded but never abort
    /// later steps (§4.6: "errors never abort the pass").
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        report.merge(self.expire_sessions());
        report.merge(self.delete_stale_temp_files());
        report.merge(self.delete_empty_temp_dirs());
        report.merge(self.delete_stale_logs());
        report.merge(self.relieve_disk_pressure());
        report.merge(self.sweep_orphan_files());
        report
    }

    fn retention_hours(&self, status: SessionStatus) -> Option<u64> {
        match status {
            SessionStatus::Failed => Some(self.config.failed_retention_hours),
            SessionStatus::Completed => Some(self.config.completed_retention_hours),
            SessionStatus::Cancelled => Some(self.config.cancelled_retention_hours),
            SessionStatus::Queued | SessionStatus::Processing => None,
        }
    }

    /// Step 1: delete sessions whose (status, age) exceeds retention.
    ///
    /// Age is measured against the same [`Clock`] the session store
    /// timestamps its mutations with (`self.store.now()`), not real wall
    /// time — so a [`vf_core::FakeClock`]-backed store under test produces
    /// age comparisons that actually track the store's own notion of "now"
    /// rather than drifting against it.
    fn expire_sessions(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.store.now();
        for session in self.store.list(&ListFilters::default()) {
            let Some(hours) = self.retention_hours(session.status) else { continue };
            let age = now - session.updated_at;
            if age >= chrono::Duration::hours(hours as i64) {
                if let Err(err) = self.store.delete(session.id, true) {
                    report.errors.push(format!("expire session {}: {err}", session.id));
                } else {
                    report.sessions_cleaned += 1;
                }
            }
        }
        report
    }

    /// Steps 2/3: stale files and empty directories under the temp dir.
    fn delete_stale_temp_files(&self) -> SweepReport {
        delete_stale_files(&self.temp_dir, chrono::Duration::hours(self.config.temp_file_max_age_hours as i64))
    }

    fn delete_empty_temp_dirs(&self) -> SweepReport {
        delete_empty_dirs(&self.temp_dir, chrono::Duration::hours(self.config.temp_file_max_age_hours as i64))
    }

    /// Step 4: stale files under the logs dir.
    fn delete_stale_logs(&self) -> SweepReport {
        delete_stale_files(&self.logs_dir, chrono::Duration::days(self.config.log_file_max_age_days as i64))
    }

    /// Step 5: if disk usage is above critical, repeatedly delete the
    /// oldest completed session until below threshold or no candidates
    /// remain.
    fn relieve_disk_pressure(&self) -> SweepReport {
        let mut report = SweepReport::default();
        loop {
            let Some(percent) = disk_usage_percent(&self.temp_dir) else { break };
            if percent < self.config.disk_critical_percent {
                break;
            }
            let mut completed = self
                .store
                .list(&ListFilters { status: Some(SessionStatus::Completed), ..Default::default() });
            completed.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
            let Some(oldest) = completed.into_iter().next() else {
                warn!("disk usage above critical but no completed sessions remain to reclaim");
                break;
            };
            match self.store.delete(oldest.id, true) {
                Ok(()) => report.sessions_cleaned += 1,
                Err(err) => {
                    report.errors.push(format!("disk-pressure delete {}: {err}", oldest.id));
                    break;
                }
            }
        }
        report
    }

    /// Step 6: intermediate files under the temp dir whose embedded session
    /// id corresponds to no live session.
    fn sweep_orphan_files(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let live: std::collections::HashSet<String> =
            self.store.list(&ListFilters::default()).into_iter().map(|s| s.id.to_string()).collect();

        let Ok(entries) = std::fs::read_dir(&self.temp_dir) else { return report };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let Some(session_id) = extract_session_id(name) else { continue };
            if live.contains(&session_id) {
                continue;
            }
            let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    report.files_deleted += 1;
                    report.bytes_freed += len;
                }
                Err(err) => report.errors.push(format!("orphan sweep {}: {err}", path.display())),
            }
        }
        report
    }
}

/// Pulls a UUID-shaped prefix (the convention agents use for intermediate
/// file names: `<session-uuid>_<asset>`) out of a file stem.
fn extract_session_id(stem: &str) -> Option<String> {
    let candidate = stem.split('_').next().unwrap_or(stem);
    uuid::Uuid::parse_str(candidate).ok().map(|u| u.to_string())
}

fn modified_age(meta: &std::fs::Metadata) -> Option<chrono::Duration> {
    let modified = meta.modified().ok()?;
    let elapsed = SystemTime::now().duration_since(modified).ok()?;
    Some(chrono::Duration::from_std(elapsed).unwrap_or_default())
}

fn delete_stale_files(dir: &Path, max_age: chrono::Duration) -> SweepReport {
    let mut report = SweepReport::default();
    let Ok(entries) = std::fs::read_dir(dir) else { return report };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            report.merge(delete_stale_files(&path, max_age));
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Some(age) = modified_age(&meta) else { continue };
        if age >= max_age {
            let len = meta.len();
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    report.files_deleted += 1;
                    report.bytes_freed += len;
                }
                Err(err) => report.errors.push(format!("delete stale file {}: {err}", path.display())),
            }
        }
    }
    report
}

fn delete_empty_dirs(dir: &Path, max_age: chrono::Duration) -> SweepReport {
    let mut report = SweepReport::default();
    let Ok(entries) = std::fs::read_dir(dir) else { return report };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        report.merge(delete_empty_dirs(&path, max_age));
        let Ok(mut sub) = std::fs::read_dir(&path) else { continue };
        if sub.next().is_some() {
            continue;
        }
        let Ok(meta) = std::fs::metadata(&path) else { continue };
        let Some(age) = modified_age(&meta) else { continue };
        if age >= max_age {
            match std::fs::remove_dir(&path) {
                Ok(()) => report.directories_deleted += 1,
                Err(err) => report.errors.push(format!("delete empty dir {}: {err}", path.display())),
            }
        }
    }
    report
}

fn disk_usage_percent(path: &Path) -> Option<f64> {
    use sysinfo::Disks;
    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(&Path, &sysinfo::Disk)> = None;
    for disk in disks.iter() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            if best.map(|(m, _)| mount.as_os_str().len() > m.as_os_str().len()).unwrap_or(true) {
                best = Some((mount, disk));
            }
        }
    }
    let (_, disk) = best?;
    let total = disk.total_space();
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(disk.available_space());
    Some(used as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{FakeClock, JobRequest, Quality, SessionUpdate};

    fn request() -> JobRequest {
        JobRequest { prompt: "p".into(), duration_seconds: 30, style: "s".into(), voice: "v".into(), quality: Quality::Medium }
    }

    fn sweeper() -> (tempfile::TempDir, MaintenanceSweeper<FakeClock>) {
        let (dir, _clock, sweeper) = sweeper_with_clock(FakeClock::default());
        (dir, sweeper)
    }

    /// Like [`sweeper`], but also hands back the `FakeClock` driving the
    /// store so a test can [`FakeClock::advance`] it to construct a literal
    /// retention-age timeline.
    fn sweeper_with_clock(clock: FakeClock) -> (tempfile::TempDir, FakeClock, MaintenanceSweeper<FakeClock>) {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(SessionStore::open(dir.path().join("sessions"), clock.clone()).unwrap());
        let temp_dir = dir.path().join("temp");
        let logs_dir = dir.path().join("logs");
        std::fs::create_dir_all(&temp_dir).unwrap();
        std::fs::create_dir_all(&logs_dir).unwrap();
        let sweeper = MaintenanceSweeper::new(
            MaintenanceConfig::default(),
            store,
            temp_dir,
            logs_dir,
        );
        (dir, clock, sweeper)
    }

    #[test]
    fn scenario_f_expires_old_completed_session_but_keeps_recent() {
        let (_dir, clock, sweeper) = sweeper_with_clock(FakeClock::default());

        // old: completed at t=0.
        let old = sweeper.store.create(request(), None).unwrap();
        sweeper.store.update_status(old.id, SessionUpdate::default().status(SessionStatus::Completed)).unwrap();
        let old_file = sweeper.temp_dir.join(format!("{}_clip.mp4", old.id));
        std::fs::write(&old_file, b"data").unwrap();
        sweeper.store.add_intermediate_file(old.id, old_file.clone()).unwrap();

        // 48h later (the default completed retention), a second session
        // completes — "recent" relative to the eventual sweep time.
        clock.advance(std::time::Duration::from_secs(48 * 3600));
        let recent = sweeper.store.create(request(), None).unwrap();
        sweeper.store.update_status(recent.id, SessionUpdate::default().status(SessionStatus::Completed)).unwrap();

        // Another hour passes before the sweep runs: old is now 49h past
        // its completion, recent is 1h past its own — default retention is
        // 48h, so only old should be reclaimed (§8 Scenario F).
        clock.advance(std::time::Duration::from_secs(3600));
        let report = sweeper.sweep();
        assert_eq!(report.sessions_cleaned, 1);
        assert!(sweeper.store.get(old.id).is_none());
        assert!(sweeper.store.get(recent.id).is_some());
        assert!(!old_file.exists(), "old session's intermediate files should be cleaned up with it");

        // Second pass is a no-op: nothing new has aged past retention.
        let report2 = sweeper.sweep();
        assert_eq!(report2.sessions_cleaned, 0);
    }

    #[test]
    fn property_8_zero_retention_removes_all_non_queued_sessions() {
        let (_dir, sweeper) = sweeper();
        let old = sweeper.store.create(request(), None).unwrap();
        sweeper.store.update_status(old.id, SessionUpdate::default().status(SessionStatus::Completed)).unwrap();
        let recent = sweeper.store.create(request(), None).unwrap();
        sweeper.store.update_status(recent.id, SessionUpdate::default().status(SessionStatus::Completed)).unwrap();

        let zero_cfg = MaintenanceConfig { completed_retention_hours: 0, ..MaintenanceConfig::default() };
        let sweeper = MaintenanceSweeper::new(zero_cfg, sweeper.store.clone(), sweeper.temp_dir.clone(), sweeper.logs_dir.clone());
        let report = sweeper.sweep();
        assert_eq!(report.sessions_cleaned, 2);
        assert!(sweeper.store.get(old.id).is_none());
        assert!(sweeper.store.get(recent.id).is_none());

        // Second pass is a no-op.
        let report2 = sweeper.sweep();
        assert_eq!(report2.sessions_cleaned, 0);
    }

    #[test]
    fn queued_and_processing_sessions_are_never_expired() {
        let (_dir, sweeper) = sweeper();
        let session = sweeper.store.create(request(), None).unwrap();
        let zero_cfg = MaintenanceConfig {
            completed_retention_hours: 0,
            failed_retention_hours: 0,
            cancelled_retention_hours: 0,
            ..MaintenanceConfig::default()
        };
        let sweeper = MaintenanceSweeper::new(zero_cfg, sweeper.store.clone(), sweeper.temp_dir.clone(), sweeper.logs_dir.clone());
        let report = sweeper.sweep();
        assert_eq!(report.sessions_cleaned, 0);
        assert!(sweeper.store.get(session.id).is_some());
    }

    #[test]
    fn orphan_sweep_deletes_files_with_no_live_session() {
        let (_dir, sweeper) = sweeper();
        let live = sweeper.store.create(request(), None).unwrap();
        let orphan_id = vf_core::SessionId::new();
        std::fs::write(sweeper.temp_dir.join(format!("{orphan_id}_clip.mp4")), b"data").unwrap();
        std::fs::write(sweeper.temp_dir.join(format!("{}_clip.mp4", live.id)), b"data").unwrap();

        let report = sweeper.sweep_orphan_files();
        assert_eq!(report.files_deleted, 1);
        assert!(!sweeper.temp_dir.join(format!("{orphan_id}_clip.mp4")).exists());
        assert!(sweeper.temp_dir.join(format!("{}_clip.mp4", live.id)).exists());
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk snapshot envelope and atomic write/read for a single session.
//!
//! Grounded on the daemon's WAL snapshot persistence: write to a `.tmp`
//! sibling, rotate up to [`MAX_BAK_FILES`] numbered backups out of the way,
//! then rename the tmp file into place. A reader that crashes mid-write
//! always finds either the previous complete file or the new complete file,
//! never a half-written one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vf_core::{ProjectState, Session};

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;
const MAX_BAK_FILES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "v", default = "default_version")]
    pub version: u32,
    pub session: Session,
    #[serde(default)]
    pub project_state: ProjectState,
    pub saved_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    CURRENT_SNAPSHOT_VERSION
}

/// Pick the next `.bak` / `.bak.N` path for `path`, rotating older backups
/// out. Keeps up to [`MAX_BAK_FILES`] backups; the oldest is discarded.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("json.bak")
        } else {
            path.with_extension(format!("json.bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

/// Write `record` to `path` atomically: serialize to `<path>.tmp`, rotate
/// the previous file to a numbered backup, then rename the tmp file into
/// place.
pub fn write_atomic(path: &Path, record: &SessionRecord) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp_path, bytes)?;
    if path.exists() {
        let bak = rotate_bak_path(path);
        fs::rename(path, bak)?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// What happened when reading a snapshot file back.
pub enum LoadOutcome {
    Loaded(SessionRecord),
    Corrupt(String),
}

pub fn read(path: &Path) -> std::io::Result<LoadOutcome> {
    let bytes = fs::read(path)?;
    match serde_json::from_slice::<SessionRecord>(&bytes) {
        Ok(record) => Ok(LoadOutcome::Loaded(record)),
        Err(e) => Ok(LoadOutcome::Corrupt(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{JobRequest, Quality, SessionId};

    fn sample_record() -> SessionRecord {
        let req = JobRequest {
            prompt: "a river".into(),
            duration_seconds: 30,
            style: "doc".into(),
            voice: "calm".into(),
            quality: Quality::Medium,
        };
        let now = Utc::now();
        SessionRecord {
            version: CURRENT_SNAPSHOT_VERSION,
            session: Session::new(SessionId::new(), req, None, now),
            project_state: ProjectState::default(),
            saved_at: now,
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        let record = sample_record();
        write_atomic(&path, &record).unwrap();
        match read(&path).unwrap() {
            LoadOutcome::Loaded(r) => assert_eq!(r.session.id, record.session.id),
            LoadOutcome::Corrupt(reason) => panic!("unexpected corrupt: {reason}"),
        }
    }

    #[test]
    fn second_write_rotates_previous_into_bak() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        let mut record = sample_record();
        write_atomic(&path, &record).unwrap();
        record.session.progress = 0.5;
        write_atomic(&path, &record).unwrap();
        assert!(path.with_extension("json.bak").exists());
    }

    #[test]
    fn corrupt_file_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        fs::write(&path, b"{not json").unwrap();
        match read(&path).unwrap() {
            LoadOutcome::Corrupt(_) => {}
            LoadOutcome::Loaded(_) => panic!("expected corrupt outcome"),
        }
    }
}

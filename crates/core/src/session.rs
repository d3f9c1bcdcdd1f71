// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session: identity, status, stage, and progress of one job instance.

use crate::ids::SessionId;
use crate::job_request::JobRequest;
use crate::stage::Stage;
use crate::status::SessionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub submitter: Option<String>,
    pub request: JobRequest,
    pub status: SessionStatus,
    pub stage: Stage,
    /// Overall progress, always clamped to `[0.0, 1.0]`.
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new(id: SessionId, request: JobRequest, submitter: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            submitter,
            request,
            status: SessionStatus::Queued,
            stage: Stage::Initializing,
            progress: 0.0,
            created_at: now,
            updated_at: now,
            estimated_completion: None,
            error: None,
            metadata: HashMap::new(),
        }
    }
}

/// A requested mutation to a session, as accepted by the store's
/// `update-status` operation. Every field is optional; only fields present
/// are applied.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub stage: Option<Stage>,
    pub progress: Option<f64>,
    pub error: Option<String>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl SessionUpdate {
    pub fn status(mut self, s: SessionStatus) -> Self {
        self.status = Some(s);
        self
    }

    pub fn stage(mut self, s: Stage) -> Self {
        self.stage = Some(s);
        self
    }

    pub fn progress(mut self, p: f64) -> Self {
        self.progress = Some(p);
        self
    }

    pub fn error(mut self, e: impl Into<String>) -> Self {
        self.error = Some(e.into());
        self
    }

    pub fn estimated_completion(mut self, t: DateTime<Utc>) -> Self {
        self.estimated_completion = Some(t);
        self
    }

    /// Same as [`Self::estimated_completion`] but accepts an already-optional
    /// value, so callers computing an ETA that may not exist (e.g. overall
    /// progress at 0 or 1) don't need an `if let` before building the update.
    pub fn estimated_completion_opt(mut self, t: Option<DateTime<Utc>>) -> Self {
        self.estimated_completion = t;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Quality;

    fn req() -> JobRequest {
        JobRequest {
            prompt: "p".into(),
            duration_seconds: 30,
            style: "s".into(),
            voice: "v".into(),
            quality: Quality::Medium,
        }
    }

    #[test]
    fn new_session_is_queued_initializing_zero_progress() {
        let now = Utc::now();
        let s = Session::new(SessionId::new(), req(), None, now);
        assert_eq!(s.status, SessionStatus::Queued);
        assert_eq!(s.stage, Stage::Initializing);
        assert_eq!(s.progress, 0.0);
        assert_eq!(s.created_at, now);
        assert_eq!(s.updated_at, now);
    }
}

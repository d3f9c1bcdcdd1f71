// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An admitted job actively occupying a worker slot.

use crate::ids::{RequestId, SessionId, WorkerId};
use crate::job_request::JobRequest;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ProcessingTask {
    pub task_id: RequestId,
    pub session_id: SessionId,
    pub request: JobRequest,
    pub started_at: DateTime<Utc>,
    pub worker_id: WorkerId,
    pub projected_completion: DateTime<Utc>,
}

/// Terminal outcome of a [`ProcessingTask`], recorded once a worker
/// finishes (successfully, with an error, by timeout, or by cancellation).
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CompletedTask {
    pub task: ProcessingTask,
    pub finished_at: DateTime<Utc>,
    pub outcome: TaskOutcome,
}

impl CompletedTask {
    pub fn processing_seconds(&self) -> f64 {
        (self.finished_at - self.task.started_at).num_milliseconds() as f64 / 1000.0
    }
}

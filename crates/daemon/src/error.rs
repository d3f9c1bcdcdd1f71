// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced by the processor and the daemon lifecycle.

use thiserror::Error;
use vf_core::{CategorizedError, ErrorKind, JobRequestError, SessionId};

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("processor is not running")]
    NotRunning,
    #[error("queue is full ({size}/{max})")]
    QueueFull { size: usize, max: usize },
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] JobRequestError),
    #[error("no session found for request {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] vf_storage::StorageError),
}

impl CategorizedError for ProcessorError {
    fn kind(&self) -> ErrorKind {
        match self {
            ProcessorError::NotRunning | ProcessorError::QueueFull { .. } => ErrorKind::Capacity,
            ProcessorError::InvalidRequest(_) => ErrorKind::Validation,
            ProcessorError::NotFound(_) => ErrorKind::Validation,
            ProcessorError::Storage(e) => e.kind(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),
    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(std::path::PathBuf, std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] vf_storage::StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] vf_core::config::ConfigError),
}

/// An error raised while operating on a named session that may not exist.
#[derive(Debug, Error)]
#[error("session {0} not found")]
pub struct SessionNotFound(pub SessionId);

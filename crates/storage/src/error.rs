// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;
use vf_core::{CategorizedError, ErrorKind, SessionId, Stage};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("io error at {path}: {source}")]
    Io { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error("failed to serialize session {id}: {source}")]
    Serialize { id: SessionId, #[source] source: serde_json::Error },
    #[error("snapshot for session {id} is corrupt and has been quarantined: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("session {id} cannot move from stage {from} back to {to}")]
    InvalidStageTransition { id: SessionId, from: Stage, to: Stage },
}

impl CategorizedError for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) | StorageError::InvalidStageTransition { .. } => ErrorKind::Validation,
            StorageError::Io { .. } | StorageError::Serialize { .. } | StorageError::Corrupt { .. } => {
                ErrorKind::Storage
            }
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;
use vf_core::{CategorizedError, ErrorKind, Stage};

#[derive(Debug, Error, Clone)]
pub enum StageError {
    #[error("stage {stage} failed: {message}")]
    Failed { stage: Stage, message: String },
    #[error("no agent registered for stage {0}")]
    Unrouted(Stage),
}

impl CategorizedError for StageError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Processing
    }
}

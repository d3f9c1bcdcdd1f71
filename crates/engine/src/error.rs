// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;
use vf_core::{AllocationId, CategorizedError, ErrorKind};

#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("allocation denied: {reason}")]
    Denied { reason: String },
    #[error("allocation {0} not found")]
    NotFound(AllocationId),
}

impl CategorizedError for GovernorError {
    fn kind(&self) -> ErrorKind {
        match self {
            GovernorError::Denied { .. } => ErrorKind::Resource,
            GovernorError::NotFound(_) => ErrorKind::Validation,
        }
    }
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("requested {requested} tokens but only {available:.3} available, retry in {delay:.3}s")]
    Denied { requested: f64, available: f64, delay: f64 },
}

impl CategorizedError for RateLimitError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::RateLimited
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session status and job quality tier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    SessionStatus {
        Queued => "queued",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

/// Output quality tier, driving the processing-time estimate multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    Medium,
    High,
    Ultra,
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Medium
    }
}

impl Quality {
    /// Multiplier applied to the base processing-time estimate (§4.3).
    pub fn multiplier(self) -> f64 {
        match self {
            Quality::Low => 0.5,
            Quality::Medium => 1.0,
            Quality::High => 1.5,
            Quality::Ultra => 2.0,
        }
    }
}

crate::simple_display! {
    Quality {
        Low => "low",
        Medium => "medium",
        High => "high",
        Ultra => "ultra",
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTOs carried in [`crate::Request`]/[`crate::Response`] payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vf_core::{Priority, SessionId, SessionStatus, Stage};
use vf_engine::{ResourceSample, ServiceStatistics, ServiceStatus, Statistics};

/// Filters accepted by `list_sessions` — mirrors
/// [`vf_storage::ListFilters`] as a wire-safe DTO (no coupling from
/// `vf-wire` to `vf-storage`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilterDto {
    pub user: Option<String>,
    pub status: Option<SessionStatus>,
    pub limit: Option<usize>,
}

/// Coarse lifecycle bucket a request-id currently sits in, per §4.3
/// `status(request_id)`'s `state: queued|processing|completed` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Processing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub request_id: String,
    pub session_id: SessionId,
    pub state: TaskState,
    pub status: SessionStatus,
    pub stage: Stage,
    pub progress: f64,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProcessorMetrics {
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_queued: u64,
    pub current_active: usize,
    pub current_queue_size: usize,
    pub avg_processing_seconds: f64,
    pub peak_concurrent: usize,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsageView {
    pub system: ResourceSample,
    pub cpu_allocated: f64,
    pub cpu_available: f64,
    pub memory_allocated_mb: u64,
    pub memory_available_mb: u64,
    pub disk_allocated_mb: u64,
    pub disk_available_mb: u64,
    pub processor_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatusView {
    pub per_service: HashMap<String, ServiceStatus>,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthView {
    pub ok: bool,
    pub components: HashMap<String, bool>,
}

/// Wire-safe mirror of `vf_daemon::maintenance::SweepReport` — kept as a
/// plain DTO rather than an import so `vf-wire` doesn't depend on
/// `vf-daemon` (the dependency runs the other way).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReportDto {
    pub sessions_cleaned: u64,
    pub files_deleted: u64,
    pub directories_deleted: u64,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}

/// A session as rendered for `list_sessions`; trims `Session` down to the
/// fields an operator actually wants in a list view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDto {
    pub id: SessionId,
    pub submitter: Option<String>,
    pub status: SessionStatus,
    pub stage: Stage,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl From<vf_core::Session> for SessionDto {
    fn from(s: vf_core::Session) -> Self {
        Self {
            id: s.id,
            submitter: s.submitter,
            status: s.status,
            stage: s.stage,
            progress: s.progress,
            created_at: s.created_at,
            updated_at: s.updated_at,
            error: s.error,
        }
    }
}

#[allow(dead_code)]
fn _assert_priority_serializable(_p: Priority) {}

#[allow(dead_code)]
fn _assert_service_stats_serializable(_s: ServiceStatistics) {}

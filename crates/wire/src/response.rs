// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses the control plane returns, per §6.

use crate::{
    HealthView, ProcessorMetrics, RateLimitStatusView, ResourceUsageView, SessionDto,
    StatusRecord, SweepReportDto,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Response {
    Submitted { request_id: String },
    Status(StatusRecord),
    Sessions(Vec<SessionDto>),
    Cancelled,
    Metrics(ProcessorMetrics),
    ResourceUsage(ResourceUsageView),
    RateLimitStatus(RateLimitStatusView),
    Health(HealthView),
    Started { ok: bool },
    Paused,
    Resumed,
    /// `true` if every in-flight request drained before the requested
    /// timeout elapsed.
    Stopped { graceful: bool },
    SweepReport(SweepReportDto),
    /// The `request_id` named in a `Status`/`Cancel` request has no known
    /// session.
    NotFound,
    /// Carries a [`vf_core::ErrorKind`] name and a human-readable message;
    /// kept as plain strings rather than the error type itself so the wire
    /// format doesn't couple to every crate's error enum.
    Error { kind: String, message: String },
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vf-adapters: the Agent interface (§6) — the core's only contact surface
//! with stage logic.
//!
//! Agents are opaque pluggable workers (research, scripting, asset
//! sourcing, audio synthesis, final assembly); the core never interprets
//! what a [`StageAgent`] does beyond the [`vf_core::ProjectStatePatch`] it
//! returns. This crate defines the trait, a router that dispatches by
//! [`vf_core::Stage`], and fake implementations used by tests and the load
//! generator in place of the real (out-of-scope) research/TTS/video agents.

mod error;
mod fake;
mod router;

pub use error::StageError;
pub use fake::FakeStageAgent;
pub use router::StageRouter;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FlakyStageAgent;

use async_trait::async_trait;
use std::sync::Arc;
use vf_core::{ProjectState, ProjectStatePatch, SessionId, Stage};
use vf_engine::RateLimiter;

/// Everything a [`StageAgent`] needs to execute one pipeline stage. The
/// core hands this in and only looks at the patch the agent returns —
/// `project_state` and `rate_limiter` are for the agent's own use.
pub struct StageContext {
    pub session_id: SessionId,
    pub stage: Stage,
    pub project_state: ProjectState,
    pub rate_limiter: Arc<RateLimiter>,
}

/// One pluggable worker for one pipeline stage.
///
/// `run_stage(session_id, project_state) → project_state_patch | error`,
/// exactly as spec.md §6 names it; `session_id` and `project_state` arrive
/// bundled in [`StageContext`] alongside the rate limiter handle agents may
/// consult before calling an upstream service.
#[async_trait]
pub trait StageAgent: Send + Sync {
    async fn run_stage(&self, ctx: &StageContext) -> Result<ProjectStatePatch, StageError>;
}

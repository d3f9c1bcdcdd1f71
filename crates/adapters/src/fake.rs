// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake [`StageAgent`] implementations. The real research/scripting/asset/
//! audio/assembly agents are out of scope (spec.md Non-goals); these stand
//! in for them in tests and the load generator.

use crate::{StageAgent, StageContext, StageError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use vf_core::{ProjectStatePatch, Stage};

/// Simulates any stage with a short sleep and a synthetic patch, succeeding
/// unconditionally.
pub struct FakeStageAgent {
    delay: Duration,
}

impl FakeStageAgent {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FakeStageAgent {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}

fn synthetic_patch(stage: Stage) -> ProjectStatePatch {
    let mut patch = ProjectStatePatch::default();
    let payload = serde_json::json!({ "stage": stage.to_string(), "synthetic": true });
    match stage {
        Stage::Researching => patch.research = Some(payload),
        Stage::Scripting => patch.script = Some(payload),
        Stage::AssetSourcing => patch.assets = Some(payload),
        Stage::AudioGeneration => patch.audio = Some(payload),
        Stage::VideoAssembly | Stage::Finalizing => patch.final_artifact = Some(payload),
        Stage::Initializing | Stage::Completed | Stage::Failed => {}
    }
    patch
}

#[async_trait]
impl StageAgent for FakeStageAgent {
    async fn run_stage(&self, ctx: &StageContext) -> Result<ProjectStatePatch, StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(synthetic_patch(ctx.stage))
    }
}

/// Fails its first `fail_times` invocations (per stage) with a
/// [`StageError::Failed`], then succeeds like [`FakeStageAgent`]. Used to
/// exercise the processor's worker-failure and retry-adjacent paths.
#[cfg(any(test, feature = "test-support"))]
pub struct FlakyStageAgent {
    fail_times: u32,
    attempts: AtomicU32,
    delay: Duration,
}

#[cfg(any(test, feature = "test-support"))]
impl FlakyStageAgent {
    pub fn new(fail_times: u32) -> Self {
        Self { fail_times, attempts: AtomicU32::new(0), delay: Duration::from_millis(1) }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl StageAgent for FlakyStageAgent {
    async fn run_stage(&self, ctx: &StageContext) -> Result<ProjectStatePatch, StageError> {
        tokio::time::sleep(self.delay).await;
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            return Err(StageError::Failed { stage: ctx.stage, message: "simulated flaky failure".into() });
        }
        Ok(synthetic_patch(ctx.stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vf_core::{ProjectState, SessionId};
    use vf_engine::RateLimiter;

    fn ctx(stage: Stage) -> StageContext {
        StageContext {
            session_id: SessionId::new(),
            stage,
            project_state: ProjectState::default(),
            rate_limiter: Arc::new(RateLimiter::new(Default::default())),
        }
    }

    #[tokio::test]
    async fn fake_agent_produces_stage_appropriate_patch() {
        let agent = FakeStageAgent::new(Duration::from_millis(1));
        let patch = agent.run_stage(&ctx(Stage::AudioGeneration)).await.unwrap();
        assert!(patch.audio.is_some());
        assert!(patch.script.is_none());
    }

    #[tokio::test]
    async fn flaky_agent_fails_then_succeeds() {
        let agent = FlakyStageAgent::new(2);
        assert!(agent.run_stage(&ctx(Stage::Researching)).await.is_err());
        assert!(agent.run_stage(&ctx(Stage::Researching)).await.is_err());
        assert!(agent.run_stage(&ctx(Stage::Researching)).await.is_ok());
    }
}

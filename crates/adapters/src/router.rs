// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatches a pipeline stage to its registered [`StageAgent`].

use crate::{StageAgent, StageContext, StageError};
use std::collections::HashMap;
use std::sync::Arc;
use vf_core::{ProjectStatePatch, Stage};

/// Maps each [`Stage`] to the agent that executes it. A stage with no
/// registered agent fails with [`StageError::Unrouted`] rather than
/// silently skipping — the core never guesses at stage completion.
#[derive(Default, Clone)]
pub struct StageRouter {
    agents: HashMap<Stage, Arc<dyn StageAgent>>,
}

impl StageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, stage: Stage, agent: Arc<dyn StageAgent>) -> Self {
        self.agents.insert(stage, agent);
        self
    }

    /// Every stage in [`vf_core::PIPELINE`] routed to the same fake agent —
    /// the default wiring for tests and the load generator, mirroring
    /// `original_source/concurrent_processor.py`'s placeholder
    /// `_process_video_request` stage simulation.
    pub fn fake_for_all_stages(agent: Arc<dyn StageAgent>) -> Self {
        let mut router = Self::new();
        for stage in vf_core::PIPELINE {
            router = router.register(stage, agent.clone());
        }
        router
    }

    pub async fn run_stage(&self, ctx: &StageContext) -> Result<ProjectStatePatch, StageError> {
        let agent = self.agents.get(&ctx.stage).ok_or(StageError::Unrouted(ctx.stage))?;
        agent.run_stage(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FakeStageAgent;
    use std::time::Duration;
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
    async fn unrouted_stage_errors() {
        let router = StageRouter::new();
        let err = router.run_stage(&ctx(Stage::Researching)).await.unwrap_err();
        assert!(matches!(err, StageError::Unrouted(Stage::Researching)));
    }

    #[tokio::test]
    async fn routed_stage_delegates_to_agent() {
        let agent = Arc::new(FakeStageAgent::new(Duration::from_millis(1)));
        let router = StageRouter::fake_for_all_stages(agent);
        let patch = router.run_stage(&ctx(Stage::Scripting)).await.unwrap();
        assert!(patch.script.is_some());
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fixed pipeline of stages every session passes through.

use serde::{Deserialize, Serialize};

/// One step of the fixed video-generation pipeline.
///
/// Declaration order is the pipeline order: a stage transition is only
/// valid if it does not move backward through this list, unless the target
/// is [`Stage::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initializing,
    Researching,
    Scripting,
    AssetSourcing,
    AudioGeneration,
    VideoAssembly,
    Finalizing,
    Completed,
    Failed,
}

/// All stages a session progresses through in order, excluding the two
/// terminal pseudo-stages `Completed`/`Failed`.
pub const PIPELINE: [Stage; 7] = [
    Stage::Initializing,
    Stage::Researching,
    Stage::Scripting,
    Stage::AssetSourcing,
    Stage::AudioGeneration,
    Stage::VideoAssembly,
    Stage::Finalizing,
];

impl Stage {
    /// Position in the pipeline order, or `None` for `Completed`/`Failed`
    /// which sit outside the monotonic ordering.
    pub fn pipeline_index(self) -> Option<usize> {
        PIPELINE.iter().position(|s| *s == self)
    }

    /// True if moving from `self` to `target` would move backward through
    /// the pipeline. `Failed` and `Completed` are always legal targets — a
    /// session may terminate from any stage; only forward motion within the
    /// pipeline proper, or re-affirming the same terminal stage, is allowed
    /// otherwise.
    pub fn can_transition_to(self, target: Stage) -> bool {
        if target == Stage::Failed || target == Stage::Completed {
            return true;
        }
        match (self.pipeline_index(), target.pipeline_index()) {
            (Some(from), Some(to)) => to >= from,
            _ => {
                // self is Completed/Failed: only re-affirming the same
                // terminal stage is allowed, nothing moves past it.
                self == target
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }
}

crate::simple_display! {
    Stage {
        Initializing => "initializing",
        Researching => "researching",
        Scripting => "scripting",
        AssetSourcing => "asset_sourcing",
        AudioGeneration => "audio_generation",
        VideoAssembly => "video_assembly",
        Finalizing => "finalizing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Weight of each pipeline stage toward overall session progress.
/// Must sum to 1.0 (checked by [`StageWeights::is_valid`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageWeights {
    pub initializing: f64,
    pub researching: f64,
    pub scripting: f64,
    pub asset_sourcing: f64,
    pub audio_generation: f64,
    pub video_assembly: f64,
    pub finalizing: f64,
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            initializing: 0.05,
            researching: 0.10,
            scripting: 0.15,
            asset_sourcing: 0.25,
            audio_generation: 0.15,
            video_assembly: 0.25,
            finalizing: 0.05,
        }
    }
}

impl StageWeights {
    pub fn weight(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Initializing => self.initializing,
            Stage::Researching => self.researching,
            Stage::Scripting => self.scripting,
            Stage::AssetSourcing => self.asset_sourcing,
            Stage::AudioGeneration => self.audio_generation,
            Stage::VideoAssembly => self.video_assembly,
            Stage::Finalizing => self.finalizing,
            Stage::Completed | Stage::Failed => 0.0,
        }
    }

    /// Sum of weights, for validating a caller-supplied override.
    pub fn sum(&self) -> f64 {
        self.initializing
            + self.researching
            + self.scripting
            + self.asset_sourcing
            + self.audio_generation
            + self.video_assembly
            + self.finalizing
    }

    pub fn is_valid(&self) -> bool {
        (self.sum() - 1.0).abs() < 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!(StageWeights::default().is_valid());
    }

    #[test]
    fn forward_transitions_allowed() {
        assert!(Stage::Researching.can_transition_to(Stage::Scripting));
        assert!(Stage::Researching.can_transition_to(Stage::Researching));
    }

    #[test]
    fn backward_transitions_rejected_unless_failed() {
        assert!(!Stage::Scripting.can_transition_to(Stage::Researching));
        assert!(Stage::Scripting.can_transition_to(Stage::Failed));
    }

    #[test]
    fn pipeline_order_matches_spec() {
        assert_eq!(Stage::Initializing.pipeline_index(), Some(0));
        assert_eq!(Stage::Finalizing.pipeline_index(), Some(6));
        assert_eq!(Stage::Completed.pipeline_index(), None);
    }
}

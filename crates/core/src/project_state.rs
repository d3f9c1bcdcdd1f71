// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session accumulator for intermediate agent output.
//!
//! Every sub-structure (research, script, assets, audio, final artifact) is
//! opaque to the core — only presence and the intermediate file list matter
//! for scheduling and garbage collection.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    #[serde(default)]
    pub research: Option<serde_json::Value>,
    #[serde(default)]
    pub script: Option<serde_json::Value>,
    #[serde(default)]
    pub assets: Option<serde_json::Value>,
    #[serde(default)]
    pub audio: Option<serde_json::Value>,
    #[serde(default)]
    pub final_artifact: Option<serde_json::Value>,
    /// Files this session owns, used for cleanup (§4.6 orphan sweep).
    #[serde(default)]
    pub intermediate_files: Vec<PathBuf>,
}

/// A named-field patch applied to a [`ProjectState`]. Every field is
/// `None` by default so a patch only replaces what it names, matching
/// `update-project-state`'s "replaces named fields" contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectStatePatch {
    pub research: Option<serde_json::Value>,
    pub script: Option<serde_json::Value>,
    pub assets: Option<serde_json::Value>,
    pub audio: Option<serde_json::Value>,
    pub final_artifact: Option<serde_json::Value>,
}

impl ProjectState {
    pub fn apply_patch(&mut self, patch: ProjectStatePatch) {
        if let Some(v) = patch.research {
            self.research = Some(v);
        }
        if let Some(v) = patch.script {
            self.script = Some(v);
        }
        if let Some(v) = patch.assets {
            self.assets = Some(v);
        }
        if let Some(v) = patch.audio {
            self.audio = Some(v);
        }
        if let Some(v) = patch.final_artifact {
            self.final_artifact = Some(v);
        }
    }

    /// Idempotent: adding a path already present is a no-op.
    pub fn add_intermediate_file(&mut self, path: PathBuf) {
        if !self.intermediate_files.contains(&path) {
            self.intermediate_files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_touches_named_fields() {
        let mut state = ProjectState::default();
        state.script = Some(serde_json::json!({"scenes": 3}));
        state.apply_patch(ProjectStatePatch {
            research: Some(serde_json::json!({"topic": "rivers"})),
            ..Default::default()
        });
        assert_eq!(state.research, Some(serde_json::json!({"topic": "rivers"})));
        assert_eq!(state.script, Some(serde_json::json!({"scenes": 3})));
    }

    #[test]
    fn add_intermediate_file_is_idempotent() {
        let mut state = ProjectState::default();
        let path = PathBuf::from("/tmp/a.mp4");
        state.add_intermediate_file(path.clone());
        state.add_intermediate_file(path.clone());
        assert_eq!(state.intermediate_files, vec![path]);
    }
}

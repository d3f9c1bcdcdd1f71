// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests the control plane accepts, per §6.

use crate::SessionFilterDto;
use serde::{Deserialize, Serialize};
use vf_core::{JobRequest, Priority};

/// One control-plane request. Tagged by `op` so a peer can dispatch
/// without first deserializing into every variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Submit a new job for processing; `priority` defaults to
    /// [`Priority::Normal`] when omitted.
    Submit {
        request: JobRequest,
        user: Option<String>,
        #[serde(default)]
        priority: Option<Priority>,
    },
    Status {
        request_id: String,
    },
    ListSessions {
        #[serde(default)]
        filters: SessionFilterDto,
    },
    Cancel {
        request_id: String,
    },
    Metrics,
    ResourceUsage,
    RateLimitStatus {
        service: Option<String>,
    },
    Health,
    /// Starts the processor's admission loop if it is currently stopped.
    Start,
    /// Stop admitting new work; in-flight requests continue (§4.3 `pause`).
    Pause,
    /// Resume admission after a [`Request::Pause`].
    Resume,
    /// Stop admission and wait up to `timeout_seconds` (no limit when
    /// `None`) for in-flight work to finish before returning.
    Stop {
        #[serde(default)]
        timeout_seconds: Option<u64>,
    },
    /// Run one maintenance sweep pass immediately (§4.6).
    Sweep,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::Quality;

    fn sample_job() -> JobRequest {
        JobRequest {
            prompt: "a calm river at dawn".into(),
            duration_seconds: 60,
            style: "documentary".into(),
            voice: "neutral".into(),
            quality: Quality::Medium,
        }
    }

    #[test]
    fn submit_round_trips_with_default_priority() {
        let req = Request::Submit { request: sample_job(), user: Some("alice".into()), priority: None };
        let json = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Request::Submit { priority: None, .. }));
    }

    #[test]
    fn tag_field_is_op() {
        let req = Request::Health;
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], "health");
    }

    #[test]
    fn stop_timeout_defaults_to_none() {
        let json = serde_json::json!({"op": "stop"});
        let req: Request = serde_json::from_value(json).unwrap();
        assert!(matches!(req, Request::Stop { timeout_seconds: None }));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (gated behind `test-support`).

use crate::job_request::JobRequest;
use crate::status::Quality;

crate::builder! {
    pub struct JobRequestBuilder => JobRequest {
        into {
            prompt: String = "a calm river at dawn",
            style: String = "documentary",
            voice: String = "neutral",
        }
        set {
            duration_seconds: u32 = 30,
            quality: Quality = Quality::Medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_valid_request() {
        let req = JobRequestBuilder::default().build();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn builder_setters_override_defaults() {
        let req = JobRequestBuilder::default().duration_seconds(120).quality(Quality::High).build();
        assert_eq!(req.duration_seconds, 120);
        assert_eq!(req.quality, Quality::High);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default synthetic job-request generator, used when a caller of
//! [`crate::LoadTester::run`] doesn't supply its own.

use rand::seq::SliceRandom;
use vf_core::{JobRequest, Quality};

const PROMPTS: &[&str] = &[
    "Create a video about artificial intelligence and machine learning",
    "Make a video explaining renewable energy sources",
    "Generate a video about space exploration and Mars missions",
    "Create an educational video about climate change",
    "Make a video about the history of the internet",
    "Generate a video about healthy cooking and nutrition",
    "Create a video about wildlife conservation",
    "Make a video explaining quantum computing basics",
];

const STYLES: &[&str] = &["professional", "casual", "educational", "entertainment"];
const QUALITIES: &[Quality] = &[Quality::Medium, Quality::High];
const DURATIONS: &[u32] = &[30, 60, 90, 120];

/// Samples a [`JobRequest`] from a fixed prompt/style/quality/duration set.
pub fn default_request_generator() -> JobRequest {
    let mut rng = rand::thread_rng();
    JobRequest {
        prompt: (*PROMPTS.choose(&mut rng).unwrap_or(&PROMPTS[0])).to_string(),
        duration_seconds: *DURATIONS.choose(&mut rng).unwrap_or(&DURATIONS[0]),
        style: (*STYLES.choose(&mut rng).unwrap_or(&STYLES[0])).to_string(),
        voice: "neutral".to_string(),
        quality: *QUALITIES.choose(&mut rng).unwrap_or(&QUALITIES[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_requests_always_validate() {
        for _ in 0..50 {
            default_request_generator().validate().unwrap();
        }
    }
}

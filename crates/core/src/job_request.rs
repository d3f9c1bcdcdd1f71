// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job request a client submits and its validation.

use crate::error::ErrorKind;
use crate::status::Quality;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_DURATION_SECONDS: u32 = 10;
pub const MAX_DURATION_SECONDS: u32 = 600;

/// A client-submitted video generation request.
///
/// The core never interprets `prompt`, `style`, or `voice` beyond
/// non-emptiness — those are agent vocabulary (Non-goal: per-agent
/// prompts). `quality` is a closed set because the processor's duration
/// estimate switches on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub prompt: String,
    pub duration_seconds: u32,
    pub style: String,
    pub voice: String,
    pub quality: Quality,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobRequestError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error(
        "duration_seconds {0} out of range [{MIN_DURATION_SECONDS}, {MAX_DURATION_SECONDS}]"
    )]
    DurationOutOfRange(u32),
    #[error("style must not be empty")]
    EmptyStyle,
    #[error("voice must not be empty")]
    EmptyVoice,
}

impl crate::error::CategorizedError for JobRequestError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

impl JobRequest {
    pub fn validate(&self) -> Result<(), JobRequestError> {
        if self.prompt.trim().is_empty() {
            return Err(JobRequestError::EmptyPrompt);
        }
        if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&self.duration_seconds) {
            return Err(JobRequestError::DurationOutOfRange(self.duration_seconds));
        }
        if self.style.trim().is_empty() {
            return Err(JobRequestError::EmptyStyle);
        }
        if self.voice.trim().is_empty() {
            return Err(JobRequestError::EmptyVoice);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> JobRequest {
        JobRequest {
            prompt: "a calm river at dawn".into(),
            duration_seconds: 60,
            style: "documentary".into(),
            voice: "neutral".into(),
            quality: Quality::Medium,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn empty_prompt_rejected() {
        let mut r = sample();
        r.prompt = "   ".into();
        assert_eq!(r.validate(), Err(JobRequestError::EmptyPrompt));
    }

    #[test]
    fn duration_bounds_enforced() {
        let mut r = sample();
        r.duration_seconds = 9;
        assert!(matches!(r.validate(), Err(JobRequestError::DurationOutOfRange(9))));
        r.duration_seconds = 601;
        assert!(matches!(r.validate(), Err(JobRequestError::DurationOutOfRange(601))));
        r.duration_seconds = 600;
        assert!(r.validate().is_ok());
        r.duration_seconds = 10;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn empty_voice_rejected() {
        let mut r = sample();
        r.voice = "   ".into();
        assert_eq!(r.validate(), Err(JobRequestError::EmptyVoice));
    }
}

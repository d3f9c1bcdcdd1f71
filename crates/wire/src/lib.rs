// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vf-wire: the control-plane wire protocol (§6).
//!
//! Wire format: 4-byte big-endian length prefix + JSON payload, carrying a
//! [`Request`]/[`Response`] pair over a Unix-domain socket. The CLI also
//! uses the same `Request`/`Response` types in-process (no framing) when it
//! embeds the processor directly for single-shot/load-test runs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod framing;
mod request;
mod response;
mod types;

pub use framing::{decode, encode, read_message, write_message, ProtocolError};
pub use request::Request;
pub use response::Response;
pub use types::{
    HealthView, ProcessorMetrics, RateLimitStatusView, ResourceUsageView, SessionDto,
    SessionFilterDto, StatusRecord, SweepReportDto, TaskState,
};

#[cfg(test)]
mod property_tests;

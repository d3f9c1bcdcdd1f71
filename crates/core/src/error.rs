// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Categorized error taxonomy shared across vidforge crates.
//!
//! Every crate defines its own `thiserror` error enum for the failures it can
//! raise, but all of them converge on [`ErrorKind`] so that CLI and wire
//! layers can render a stable category regardless of which crate raised it.

use serde::{Deserialize, Serialize};

/// The kind of failure, independent of which component raised it.
///
/// Mirrors the taxonomy in the error handling design: validation and
/// capacity failures are synchronous and reported directly to the caller;
/// the rest describe what happened to a session after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Capacity,
    Resource,
    RateLimited,
    Processing,
    Timeout,
    Cancellation,
    Storage,
}

crate::simple_display! {
    ErrorKind {
        Validation => "validation",
        Capacity => "capacity",
        Resource => "resource",
        RateLimited => "rate_limited",
        Processing => "processing",
        Timeout => "timeout",
        Cancellation => "cancellation",
        Storage => "storage",
    }
}

/// Trait implemented by every crate-local error enum so call sites can ask
/// "what categorized kind is this?" without matching on every variant.
pub trait CategorizedError: std::error::Error {
    fn kind(&self) -> ErrorKind;
}

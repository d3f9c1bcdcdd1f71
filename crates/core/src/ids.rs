// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types.
//!
//! [`SessionId`] is a real UUID — the spec mandates UUID identity and
//! `<uuid>.json` snapshot filenames. Secondary ids that the spec does not
//! pin to a particular format use the lighter [`crate::define_id!`] scheme.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a session, backed by a v4 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The filename (without directory) this session's snapshot is stored
    /// under: `<uuid>.json`.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for SessionId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

crate::define_id! {
    /// Identifier for a submitted (queued or processing) request.
    pub struct RequestId("req-");
}

crate::define_id! {
    /// Identifier for a logical resource allocation held by the governor.
    pub struct AllocationId("alc-");
}

crate::define_id! {
    /// Identifier for the worker slot handling a [`crate::ProcessingTask`].
    pub struct WorkerId("wkr-");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_round_trips_through_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_file_name_is_uuid_json() {
        let id = SessionId::new();
        assert_eq!(id.file_name(), format!("{}.json", id.0));
    }

    #[test]
    fn request_id_has_prefix() {
        let id = RequestId::new();
        assert!(id.as_str().starts_with("req-"));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::LifecycleError;

/// Resolve state directory: VF_STATE_DIR > XDG_STATE_HOME/vidforge > ~/.local/state/vidforge
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("VF_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("vidforge"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/vidforge"))
}

/// Default IPC timeout for control-plane requests read from the socket.
pub fn ipc_timeout() -> Duration {
    std::env::var("VF_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Shutdown drain timeout: how long `stop()` waits for active workers before
/// giving up (default 30s, configurable via `VF_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    std::env::var("VF_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// Path to the `vidforge.toml` config file, if the operator pointed at one.
pub fn config_path() -> Option<PathBuf> {
    std::env::var("VF_CONFIG").ok().map(PathBuf::from)
}

/// Path to the single-instance lock file inside the state directory.
pub fn lock_path(state_dir: &std::path::Path) -> PathBuf {
    state_dir.join("vfd.lock")
}

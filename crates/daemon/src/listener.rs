// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-domain-socket listener for the control-plane wire protocol (§6).
//!
//! One task accepts connections; each connection gets its own task reading
//! length-prefixed [`vf_wire::Request`]s and writing back
//! [`vf_wire::Response`]s until the peer disconnects or a shutdown signal
//! fires.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vf_core::SystemClock;
use vf_wire::{decode, encode, read_message, write_message, Request, Response};

use crate::error::LifecycleError;
use crate::Daemon;

/// Binds a Unix socket at `path`, removing any stale socket file left
/// behind by a process that did not shut down cleanly.
pub fn bind(path: &Path) -> Result<UnixListener, LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(LifecycleError::Io)?;
    }
    if path.exists() {
        std::fs::remove_file(path).map_err(LifecycleError::Io)?;
    }
    UnixListener::bind(path).map_err(|source| LifecycleError::BindFailed(path.to_path_buf(), source))
}

/// Accepts connections until `shutdown` fires, dispatching each one to its
/// own task against the shared `daemon`.
pub async fn serve(
    listener: UnixListener,
    daemon: Arc<Daemon<SystemClock>>,
    socket_path: PathBuf,
    shutdown: CancellationToken,
) {
    info!(path = %socket_path.display(), "listening for control-plane connections");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("listener observed shutdown, closing");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let daemon = daemon.clone();
                        let conn_shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, daemon, conn_shutdown).await;
                        });
                    }
                    Err(err) => {
                        warn!(%err, "failed to accept control-plane connection");
                    }
                }
            }
        }
    }
    let _ = std::fs::remove_file(&socket_path);
}

async fn handle_connection(mut stream: UnixStream, daemon: Arc<Daemon<SystemClock>>, shutdown: CancellationToken) {
    loop {
        let read = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = read_message(&mut stream) => read,
        };
        let bytes = match read {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(%err, "control-plane connection closed");
                break;
            }
        };
        let request: Request = match decode(&bytes) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "failed to decode control-plane request");
                break;
            }
        };
        let response = daemon.handle(request).await;
        let payload = match encode(&response) {
            Ok(payload) => payload,
            Err(err) => {
                error!(%err, "failed to encode control-plane response");
                break;
            }
        };
        if let Err(err) = write_message(&mut stream, &payload).await {
            debug!(%err, "failed to write control-plane response");
            break;
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connects to a running `vfd` over its Unix-domain control-plane socket,
//! spawning one in the background on first use if none is reachable yet.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UnixStream;
use vf_wire::{decode, encode, read_message, write_message, Request, Response};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not determine state directory: {0}")]
    NoStateDir(#[from] std::io::Error),
    #[error("daemon is not running")]
    NotRunning,
    #[error("protocol error: {0}")]
    Protocol(#[from] vf_wire::ProtocolError),
    #[error("daemon did not become ready in time")]
    StartupTimedOut,
}

impl ClientError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NotRunning)
    }
}

fn state_dir() -> Result<PathBuf, ClientError> {
    if let Ok(dir) = std::env::var("VF_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ClientError::NoStateDir(std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory"))
    })?;
    Ok(home.join(".local/state/vidforge"))
}

fn socket_path() -> Result<PathBuf, ClientError> {
    Ok(state_dir()?.join("vfd.sock"))
}

pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    /// Connects to an already-running daemon; fails with `NotRunning` if
    /// the socket doesn't exist or no one is listening on it.
    pub async fn connect() -> Result<Self, ClientError> {
        let path = socket_path()?;
        let stream = UnixStream::connect(&path).await.map_err(|_| ClientError::NotRunning)?;
        Ok(Self { stream })
    }

    /// Connects, spawning `vfd` in the background and retrying briefly if
    /// no daemon is reachable yet.
    pub async fn connect_or_start() -> Result<Self, ClientError> {
        if let Ok(client) = Self::connect().await {
            return Ok(client);
        }
        let vfd_path = find_vfd_binary();
        Command::new(&vfd_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(ClientError::NoStateDir)?;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = Self::connect().await {
                return Ok(client);
            }
        }
        Err(ClientError::StartupTimedOut)
    }

    async fn call(&mut self, request: Request) -> Result<Response, ClientError> {
        let payload = encode(&request)?;
        write_message(&mut self.stream, &payload).await?;
        let bytes = read_message(&mut self.stream).await?;
        Ok(decode(&bytes)?)
    }

    pub async fn submit(
        &mut self,
        request: vf_core::JobRequest,
        user: Option<String>,
        priority: Option<vf_core::Priority>,
    ) -> Result<Response, ClientError> {
        self.call(Request::Submit { request, user, priority }).await
    }

    pub async fn status(&mut self, request_id: String) -> Result<Response, ClientError> {
        self.call(Request::Status { request_id }).await
    }

    pub async fn list_sessions(&mut self, filters: vf_wire::SessionFilterDto) -> Result<Response, ClientError> {
        self.call(Request::ListSessions { filters }).await
    }

    pub async fn cancel(&mut self, request_id: String) -> Result<Response, ClientError> {
        self.call(Request::Cancel { request_id }).await
    }

    pub async fn metrics(&mut self) -> Result<Response, ClientError> {
        self.call(Request::Metrics).await
    }

    pub async fn resource_usage(&mut self) -> Result<Response, ClientError> {
        self.call(Request::ResourceUsage).await
    }

    pub async fn rate_limit_status(&mut self, service: Option<String>) -> Result<Response, ClientError> {
        self.call(Request::RateLimitStatus { service }).await
    }

    pub async fn health(&mut self) -> Result<Response, ClientError> {
        self.call(Request::Health).await
    }

    pub async fn start(&mut self) -> Result<Response, ClientError> {
        self.call(Request::Start).await
    }

    pub async fn pause(&mut self) -> Result<Response, ClientError> {
        self.call(Request::Pause).await
    }

    pub async fn resume(&mut self) -> Result<Response, ClientError> {
        self.call(Request::Resume).await
    }

    pub async fn stop(&mut self, timeout_seconds: Option<u64>) -> Result<Response, ClientError> {
        self.call(Request::Stop { timeout_seconds }).await
    }

    pub async fn sweep(&mut self) -> Result<Response, ClientError> {
        self.call(Request::Sweep).await
    }
}

/// Locates the `vfd` binary: a debug-build sibling of the running `vf`
/// binary under `target/debug`, otherwise a same-directory sibling,
/// otherwise a bare `vfd` resolved against `PATH`.
fn find_vfd_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("vfd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("vfd")
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single virtual user's request lifecycle (§4.7): submit, poll status
//! at 1Hz until a terminal state or timeout, record the outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use vf_core::{Clock, JobRequest, Priority, SessionStatus};
use vf_daemon::Daemon;
use vf_wire::{Request, Response};

use crate::metrics::RequestResult;

pub type RequestGenerator = Arc<dyn Fn() -> JobRequest + Send + Sync>;

/// One simulated client issuing [`crate::LoadTestConfig::requests_per_user`]
/// requests against a shared [`Daemon`], think-time apart.
pub struct VirtualUser<C: Clock> {
    pub user_id: String,
    daemon: Arc<Daemon<C>>,
    requests_per_user: usize,
    think_time: Duration,
    timeout: Duration,
    generator: RequestGenerator,
}

impl<C: Clock + 'static> VirtualUser<C> {
    pub fn new(
        user_id: impl Into<String>,
        daemon: Arc<Daemon<C>>,
        requests_per_user: usize,
        think_time: Duration,
        timeout: Duration,
        generator: RequestGenerator,
    ) -> Self {
        Self { user_id: user_id.into(), daemon, requests_per_user, think_time, timeout, generator }
    }

    /// Runs every configured request in sequence, stopping early if `stop`
    /// fires between requests or while waiting out think-time.
    pub async fn run(&self, stop: CancellationToken) -> Vec<RequestResult> {
        let mut results = Vec::with_capacity(self.requests_per_user);
        for i in 0..self.requests_per_user {
            if stop.is_cancelled() {
                break;
            }
            results.push(self.send_request(&stop).await);
            if i + 1 < self.requests_per_user {
                tokio::select! {
                    _ = tokio::time::sleep(self.think_time) => {}
                    _ = stop.cancelled() => break,
                }
            }
        }
        results
    }

    async fn send_request(&self, stop: &CancellationToken) -> RequestResult {
        let start_time = Utc::now();
        let job = (self.generator)();

        let submitted = self
            .daemon
            .handle(Request::Submit { request: job, user: Some(self.user_id.clone()), priority: Some(Priority::Normal) })
            .await;

        let request_id = match submitted {
            Response::Submitted { request_id } => request_id,
            Response::Error { kind, message } => {
                return self.failure(start_time, String::new(), format!("{kind}: {message}"), kind == "rate_limited");
            }
            other => {
                return self.failure(start_time, String::new(), format!("unexpected response: {other:?}"), false);
            }
        };

        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let status = self.daemon.handle(Request::Status { request_id: request_id.clone() }).await;
            if let Response::Status(record) = status {
                match record.status {
                    SessionStatus::Completed => return self.success(start_time, request_id),
                    SessionStatus::Failed => {
                        let message = record.error.unwrap_or_else(|| "processing failed".to_string());
                        return self.failure(start_time, request_id, message, false);
                    }
                    SessionStatus::Cancelled => {
                        return self.failure(start_time, request_id, "cancelled".to_string(), false);
                    }
                    SessionStatus::Queued | SessionStatus::Processing => {}
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return self.failure(start_time, request_id, "request timeout".to_string(), false);
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = stop.cancelled() => {
                    return self.failure(start_time, request_id, "cancelled".to_string(), false);
                }
            }
        }
    }

    fn success(&self, start_time: chrono::DateTime<Utc>, request_id: String) -> RequestResult {
        let end_time = Utc::now();
        RequestResult {
            request_id,
            user_id: self.user_id.clone(),
            start_time,
            end_time: Some(end_time),
            success: true,
            error_message: None,
            response_time_ms: elapsed_ms(start_time, end_time),
            rate_limited: false,
        }
    }

    fn failure(&self, start_time: chrono::DateTime<Utc>, request_id: String, message: String, rate_limited: bool) -> RequestResult {
        let end_time = Utc::now();
        RequestResult {
            request_id,
            user_id: self.user_id.clone(),
            start_time,
            end_time: Some(end_time),
            success: false,
            error_message: Some(message),
            response_time_ms: elapsed_ms(start_time, end_time),
            rate_limited,
        }
    }
}

fn elapsed_ms(start: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64
}

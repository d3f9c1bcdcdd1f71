// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A submitted job waiting for admission into a worker slot.

use crate::ids::{RequestId, SessionId};
use crate::job_request::JobRequest;
use crate::priority::Priority;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A request sitting in the processor's priority queue.
///
/// Ordering is lexicographic on `(priority, submitted_at)` — lower tuple
/// sorts first, so [`std::collections::BinaryHeap`] (a max-heap) must wrap
/// this in `std::cmp::Reverse` to dequeue in the right order.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub request: JobRequest,
    pub priority: Priority,
    pub submitted_at: DateTime<Utc>,
    pub estimated_duration_seconds: u64,
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.submitted_at == other.submitted_at
    }
}
impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.submitted_at.cmp(&other.submitted_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Quality;
    use std::collections::BinaryHeap;
    use std::cmp::Reverse;

    fn req(priority: Priority, secs_offset: i64) -> QueuedRequest {
        QueuedRequest {
            request_id: RequestId::new(),
            session_id: SessionId::new(),
            request: JobRequest {
                prompt: "p".into(),
                duration_seconds: 30,
                style: "s".into(),
                voice: "v".into(),
                quality: Quality::Medium,
            },
            priority,
            submitted_at: DateTime::from_timestamp(1_000_000 + secs_offset, 0).unwrap(),
            estimated_duration_seconds: 300,
        }
    }

    #[test]
    fn urgent_beats_fifo_within_class() {
        let a = req(Priority::Normal, 0);
        let b = req(Priority::Normal, 1);
        let c = req(Priority::Urgent, 2);

        let mut heap = BinaryHeap::new();
        heap.push(Reverse(a.clone()));
        heap.push(Reverse(b.clone()));
        heap.push(Reverse(c.clone()));

        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|Reverse(r)| r.request_id))
            .collect();
        assert_eq!(order, vec![c.request_id, a.request_id, b.request_id]);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A logical resource reservation tracked by the resource governor.
//!
//! Logical allocations are independent of live OS measurement: `can-allocate`
//! reasons about the sum of active allocations against configured totals,
//! not about instantaneous sampled usage.

use crate::ids::{AllocationId, SessionId};
use crate::priority::Priority;

#[derive(Debug, Clone)]
pub struct ResourceAllocation {
    pub id: AllocationId,
    pub session_id: SessionId,
    pub cpu_cores: f64,
    pub memory_mb: u64,
    pub disk_mb: u64,
    pub priority: Priority,
    pub active: bool,
}

impl ResourceAllocation {
    pub fn new(
        session_id: SessionId,
        cpu_cores: f64,
        memory_mb: u64,
        disk_mb: u64,
        priority: Priority,
    ) -> Self {
        Self {
            id: AllocationId::new(),
            session_id,
            cpu_cores,
            memory_mb,
            disk_mb,
            priority,
            active: true,
        }
    }
}

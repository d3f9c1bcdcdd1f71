// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The six load profiles §4.7 drives the processor under.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadProfile {
    /// N virtual users, each issuing K requests with a fixed think-time
    /// for the test duration.
    ConstantLoad,
    /// Users added linearly over the ramp-up window up to N, held at N
    /// for the remaining duration.
    RampUp,
    /// Baseline 25%·N for the first third; add 75%·N instantaneously for
    /// the second third; back to baseline for the last third.
    Spike,
    /// Users added linearly up to 1.5·N over the full duration.
    Stress,
    /// 0.75·N users with 2x think-time, 3x requests/user.
    Endurance,
    /// Repeated 30s bursts at full N separated by 60s rest.
    Burst,
}

vf_core::simple_display! {
    LoadProfile {
        ConstantLoad => "constant_load",
        RampUp => "ramp_up",
        Spike => "spike",
        Stress => "stress",
        Endurance => "endurance",
        Burst => "burst",
    }
}

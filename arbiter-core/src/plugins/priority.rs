/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Priority policy: higher priority schedules first and may take capacity
//! from strictly lower priority.

use crate::plugins::Plugin;
use crate::session::Session;

/// Orders jobs and tasks by priority (descending) and allows preemption
/// only down the priority ladder.
pub struct PriorityPlugin;

impl Plugin for PriorityPlugin {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn on_session_open(&self, ssn: &mut Session) {
        ssn.add_job_order_fn(|l, r| r.priority.cmp(&l.priority));
        ssn.add_task_order_fn(|l, r| r.priority.cmp(&l.priority));
        // Strictly greater: equal-priority tasks never displace each other.
        ssn.add_preemptable_fn(|preemptor, preemptee| preemptor.priority > preemptee.priority);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

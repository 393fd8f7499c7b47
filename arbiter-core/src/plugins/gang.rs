/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Gang policy: a job dispatches only once enough of its tasks can run
//! together.

use crate::plugins::Plugin;
use crate::session::Session;

/// Declares a job ready when at least `min_available` of its tasks are
/// allocated (or further along).
pub struct GangPlugin;

impl Plugin for GangPlugin {
    fn name(&self) -> &'static str {
        "gang"
    }

    fn on_session_open(&self, ssn: &mut Session) {
        ssn.add_job_ready_fn(|job| job.ready_task_num() >= job.min_available as usize);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

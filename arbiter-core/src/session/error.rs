/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Structured error types for session operations.
//!
//! Only cache failures travel upward as errors — they are the one failure
//! class the caller can meaningfully react to (skip the job, try the next
//! round).  The other failure classes never become `Err`:
//!
//! | Failure | Handling |
//! |---|---|
//! | Invariant violation (duplicate add, unknown task) | `error!` log, no-op |
//! | Index miss (job/node absent from the session) | `warn!` log, that side skipped |
//! | Preemption denial | normal outcome, re-queue logic in the action |
//!
//! In-session state mutated before a cache failure is **not** rolled back;
//! the next snapshot reconciles.

use thiserror::Error;

use crate::task::TaskId;

/// Failure of a session operation, always rooted in a cache call.
#[derive(Debug, Error)]
pub enum SchedError {
    /// The cache refused or failed to bind a task to its chosen node.
    ///
    /// Raised by the dispatch step of an allocation; the task keeps its
    /// in-session `Allocated` status.
    #[error("binding task '{task}' to node '{node}' failed")]
    BindFailed {
        task: TaskId,
        node: String,
        #[source]
        source: anyhow::Error,
    },

    /// The cache refused or failed to evict a preemptee.
    ///
    /// The preempt action treats this as a non-preemption and moves on.
    #[error("evicting task '{task}' failed")]
    EvictFailed {
        task: TaskId,
        #[source]
        source: anyhow::Error,
    },
}

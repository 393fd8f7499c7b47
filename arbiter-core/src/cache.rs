/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! The cluster cache contract.
//!
//! The cache is an external collaborator: it watches cluster objects,
//! materialises them into the snapshot types the session consumes, and
//! applies binding and eviction decisions back to the cluster.  Only the
//! contract lives here; production implementations are wired in by the
//! embedding binary, and the simulators ship their own in-memory one.

use anyhow::Result;

use crate::job::JobInfo;
use crate::node::NodeInfo;
use crate::task::TaskInfo;

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// A point-in-time view of the cluster, deeply owned by the caller.
///
/// A session may freely mutate its copy without affecting the source; the
/// cache must not retain references into a snapshot it hands out.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub jobs: Vec<JobInfo>,
    pub nodes: Vec<NodeInfo>,
}

// ── Cache ─────────────────────────────────────────────────────────────────────

/// The contract between the scheduling core and the cluster.
///
/// All three calls are synchronous and blocking from the session's point of
/// view; the cache owns whatever synchronisation it needs internally.
pub trait Cache {
    /// Produces a point-in-time snapshot of jobs and nodes.
    fn snapshot(&self) -> Snapshot;

    /// Durably assigns `task` to the node named `hostname` in the cluster.
    fn bind(&self, task: &TaskInfo, hostname: &str) -> Result<()>;

    /// Asks the cluster to stop `task`.  Success means the request has been
    /// accepted, not that the eviction has completed; the outcome surfaces
    /// as a `Releasing` task in a later snapshot.
    fn evict(&self, task: &TaskInfo) -> Result<()>;
}

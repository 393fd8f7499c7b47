/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Core task data structures for the arbiter scheduler.
//!
//! A [`TaskInfo`] is the unit the session places; its [`TaskStatus`] drives
//! both the per-job status index and the node accounting:
//!
//! ```text
//! Pending ──allocate──► Allocated ──dispatch──► Binding ──► Bound ──► Running
//!    │                      │                                            │
//!    └──pipeline──► Pipelined                              evict ──► Releasing
//!                                                                        │
//!                                              Succeeded / Failed / Unknown
//! ```
//!
//! # Ownership model
//! Tasks are **owned** by their [`JobInfo`](crate::job::JobInfo); nodes keep
//! their own accounting copies.  The backing cluster object ([`PodRef`]) is
//! shared through an `Arc` and treated as immutable for the lifetime of a
//! session, so cloning a task never copies it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::resource::Resource;

/// Process-wide unique task identifier, derived from the backing cluster
/// object by [`pod_key`].
pub type TaskId = String;

/// Unique identifier of the job owning a task.
pub type JobId = String;

// ── TaskStatus ────────────────────────────────────────────────────────────────

/// Lifecycle status of a task.
///
/// The middle band (Allocated → Running) is what counts against a node's
/// `Used` vector; `Releasing` additionally counts against `Releasing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    /// Not yet placed by any session.
    #[default]
    Pending,
    /// A session chose a node; the cache has not been asked to bind yet.
    Allocated,
    /// Capacity recycled from a not-yet-freed preemptee on the same node.
    Pipelined,
    /// The cache's `bind` call has been issued.
    Binding,
    /// The cluster reports the task as bound to its node.
    Bound,
    /// The task is executing.
    Running,
    /// An eviction has been accepted; the capacity is on its way back.
    Releasing,
    /// Terminal: completed successfully.
    Succeeded,
    /// Terminal: completed with failure.
    Failed,
    /// Terminal: the cluster cannot account for the task.
    Unknown,
}

impl TaskStatus {
    /// Statuses that count toward a node's `Used` vector.
    pub fn occupies_node(self) -> bool {
        matches!(
            self,
            TaskStatus::Allocated
                | TaskStatus::Pipelined
                | TaskStatus::Binding
                | TaskStatus::Bound
                | TaskStatus::Running
                | TaskStatus::Releasing
        )
    }

    /// Statuses at or beyond `Allocated` — the set gang-readiness counts.
    ///
    /// `Releasing` tasks are on their way out and `Succeeded` tasks no
    /// longer hold resources, so neither belongs here.
    pub fn at_least_allocated(self) -> bool {
        matches!(
            self,
            TaskStatus::Allocated
                | TaskStatus::Pipelined
                | TaskStatus::Binding
                | TaskStatus::Bound
                | TaskStatus::Running
        )
    }

    /// Statuses the task can never leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Unknown
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "allocated" => Ok(TaskStatus::Allocated),
            "pipelined" => Ok(TaskStatus::Pipelined),
            "binding" => Ok(TaskStatus::Binding),
            "bound" => Ok(TaskStatus::Bound),
            "running" => Ok(TaskStatus::Running),
            "releasing" => Ok(TaskStatus::Releasing),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            "unknown" => Ok(TaskStatus::Unknown),
            other => Err(format!("unrecognised task status '{other}'")),
        }
    }
}

// ── PodRef ────────────────────────────────────────────────────────────────────

/// Reference to the backing cluster object.
///
/// Opaque to the scheduling core: the session never inspects it beyond
/// deriving the stable task identity, and never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

/// Derives the stable [`TaskId`] from a cluster object reference.
pub fn pod_key(pod: &PodRef) -> TaskId {
    format!("{}/{}", pod.namespace, pod.name)
}

// ── TaskInfo ──────────────────────────────────────────────────────────────────

/// A single schedulable unit.
///
/// # Lifecycle
/// Materialised by the cluster cache into a snapshot, owned by its job for
/// the duration of a session, mutated only through
/// [`Session`](crate::session::Session) operations.  `resreq` is immutable
/// after creation.
#[derive(Debug, Clone, Default)]
pub struct TaskInfo {
    /// Process-wide unique identifier (see [`pod_key`]).
    pub uid: TaskId,

    /// The owning job's UID.
    pub job: JobId,

    /// Display name.
    pub name: String,

    /// Display namespace.
    pub namespace: String,

    /// Assigned node.  Empty until a session allocates or pipelines the
    /// task.
    pub node_name: String,

    /// Task-level priority, consumed by ordering and preemption policies.
    pub priority: i32,

    /// Resource request.
    pub resreq: Resource,

    /// Lifecycle status.
    pub status: TaskStatus,

    /// Backing cluster object.  Shared, never copied on clone; `None` for
    /// purely synthetic tasks in tests.
    pub pod: Option<Arc<PodRef>>,
}

impl TaskInfo {
    /// Builds a task from its backing cluster object, deriving `uid`,
    /// `name`, and `namespace` from the reference.
    pub fn from_pod(pod: Arc<PodRef>, job: impl Into<JobId>, resreq: Resource) -> Self {
        Self {
            uid: pod_key(&pod),
            job: job.into(),
            name: pod.name.clone(),
            namespace: pod.namespace.clone(),
            node_name: String::new(),
            priority: 0,
            resreq,
            status: TaskStatus::Pending,
            pod: Some(pod),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Job aggregation over tasks.
//!
//! [`JobInfo`] owns its tasks and maintains an inverted index from status to
//! task ids.  The index stores identifiers, not references, so the invariant
//! "every task appears in exactly the bucket matching its status" can be
//! upheld without interior mutability: all mutation goes through the methods
//! below, and the task collection has a single owner.
//!
//! Buckets are `BTreeSet`s so iterating a bucket (e.g. when a gang dispatch
//! walks the `Allocated` tasks) is deterministic.

use std::collections::{BTreeSet, HashMap};

use tracing::{error, warn};

use crate::task::{JobId, TaskId, TaskInfo, TaskStatus};

// ── JobInfo ───────────────────────────────────────────────────────────────────

/// A group of tasks scheduled together.
#[derive(Debug, Clone, Default)]
pub struct JobInfo {
    /// Process-wide unique identifier.
    pub uid: JobId,

    /// Display name.
    pub name: String,

    /// Display namespace.
    pub namespace: String,

    /// Logical partitioning tag (queue the job was submitted to).
    pub queue: String,

    /// Job-level priority, consumed by ordering policies.
    pub priority: i32,

    /// Minimum number of simultaneously allocated tasks for the job to be
    /// considered ready to dispatch.  The actual readiness predicate is
    /// plugin-provided; this is the knob the gang policy reads.
    pub min_available: u32,

    /// Owned task collection, keyed by task id.
    tasks: HashMap<TaskId, TaskInfo>,

    /// Inverted index over `tasks` by status.
    status_index: HashMap<TaskStatus, BTreeSet<TaskId>>,
}

impl JobInfo {
    /// Creates an empty job with the given UID.
    pub fn new(uid: impl Into<JobId>) -> Self {
        Self {
            uid: uid.into(),
            ..Self::default()
        }
    }

    // ── Task collection ───────────────────────────────────────────────────────

    /// Inserts `task` into the job, replacing any task with the same id.
    pub fn add_task_info(&mut self, task: TaskInfo) {
        if !task.job.is_empty() && task.job != self.uid {
            warn!(
                job = %self.uid,
                task = %task.uid,
                task_job = %task.job,
                "adding task whose job field names a different job"
            );
        }
        if let Some(old) = self.tasks.remove(&task.uid) {
            self.unindex(&old.uid, old.status);
        }
        self.status_index
            .entry(task.status)
            .or_default()
            .insert(task.uid.clone());
        self.tasks.insert(task.uid.clone(), task);
    }

    /// Removes the task with id `uid` from the job and its status bucket.
    ///
    /// Removing an unknown task is an invariant violation: logged, no-op.
    pub fn delete_task_info(&mut self, uid: &TaskId) -> Option<TaskInfo> {
        match self.tasks.remove(uid) {
            Some(task) => {
                self.unindex(uid, task.status);
                Some(task)
            }
            None => {
                error!(job = %self.uid, task = %uid, "delete of a task not in this job");
                None
            }
        }
    }

    /// Moves the task atomically between status buckets and updates its
    /// status field.  The task identity is preserved across the transition.
    ///
    /// Updating an unknown task is an invariant violation: logged, no-op.
    pub fn update_task_status(&mut self, uid: &TaskId, status: TaskStatus) -> bool {
        let Some(task) = self.tasks.get_mut(uid) else {
            error!(job = %self.uid, task = %uid, "status update for a task not in this job");
            return false;
        };
        let old = task.status;
        task.status = status;
        self.unindex(uid, old);
        self.status_index
            .entry(status)
            .or_default()
            .insert(uid.clone());
        true
    }

    /// Records the node a task has been placed on.
    pub fn set_task_node_name(&mut self, uid: &TaskId, node_name: &str) -> bool {
        match self.tasks.get_mut(uid) {
            Some(task) => {
                task.node_name = node_name.to_string();
                true
            }
            None => {
                error!(job = %self.uid, task = %uid, "node assignment for a task not in this job");
                false
            }
        }
    }

    fn unindex(&mut self, uid: &TaskId, status: TaskStatus) {
        let present = self
            .status_index
            .get_mut(&status)
            .map(|bucket| bucket.remove(uid))
            .unwrap_or(false);
        if !present {
            error!(
                job = %self.uid,
                task = %uid,
                status = %status,
                "status index out of sync with task collection"
            );
        }
    }

    // ── Read access ───────────────────────────────────────────────────────────

    /// The task with id `uid`, if the job owns it.
    pub fn task(&self, uid: &TaskId) -> Option<&TaskInfo> {
        self.tasks.get(uid)
    }

    /// All tasks of the job, in no particular order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskInfo> {
        self.tasks.values()
    }

    /// Number of tasks in the job.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks currently in `status`, in deterministic (task-id) order.
    pub fn tasks_with_status(&self, status: TaskStatus) -> impl Iterator<Item = &TaskInfo> {
        self.status_index
            .get(&status)
            .into_iter()
            .flatten()
            .filter_map(|uid| self.tasks.get(uid))
    }

    /// Number of tasks currently in `status`.
    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.status_index
            .get(&status)
            .map(BTreeSet::len)
            .unwrap_or(0)
    }

    /// Tasks at or beyond `Allocated` — the count gang-readiness policies
    /// compare against `min_available`.
    pub fn ready_task_num(&self) -> usize {
        self.status_index
            .iter()
            .filter(|(status, _)| status.at_least_allocated())
            .map(|(_, bucket)| bucket.len())
            .sum()
    }

    /// Tasks in any non-terminal status.
    pub fn valid_task_num(&self) -> usize {
        self.status_index
            .iter()
            .filter(|(status, _)| !status.is_terminal())
            .map(|(_, bucket)| bucket.len())
            .sum()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

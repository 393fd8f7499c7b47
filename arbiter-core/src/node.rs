/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Per-node resource accounting.
//!
//! [`NodeInfo`] tracks one machine with three live vectors:
//!
//! * `used` — everything held by occupying tasks, including capacity that is
//!   on its way back (`Releasing` tasks).
//! * `releasing` — the subset of `used` held by `Releasing` tasks.
//! * `idle` — what a plain allocation may still claim.
//!
//! Invariant while a real backing node is set and only
//! [`add_task`](NodeInfo::add_task) / [`remove_task`](NodeInfo::remove_task)
//! have run: `used + idle = allocatable`, componentwise, with `releasing`
//! equal to the summed requests of the `Releasing` tasks.
//!
//! [`NodeInfo::pipeline_task`] is the odd one out: it claims capacity that a
//! preemptee is still freeing, so it moves quantity from `releasing` into
//! `used` without touching `idle` — `idle` already grew when the preemptee
//! entered `Releasing`, and growing it again would double-count.

use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::resource::Resource;
use crate::task::{TaskId, TaskInfo, TaskStatus};

// ── NodeRef ───────────────────────────────────────────────────────────────────

/// Reference to the backing cluster machine object.
///
/// Carries the capacity figures the cluster reports; everything else about
/// the machine is opaque to the scheduling core.
#[derive(Debug, Clone, Default)]
pub struct NodeRef {
    pub name: String,

    /// Total hardware capacity.
    pub capability: Resource,

    /// The schedulable subset of `capability`.
    pub allocatable: Resource,
}

// ── NodeInfo ──────────────────────────────────────────────────────────────────

/// One machine in the snapshot, with live idle/used/releasing accounting.
///
/// A `NodeInfo` without a backing [`NodeRef`] is a "virtual" node: it still
/// collects tasks (tests and not-yet-synced cluster state use this), but no
/// accounting is performed until [`set_node`](Self::set_node) is called.
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub name: String,

    node: Option<NodeRef>,

    capability: Resource,
    allocatable: Resource,

    idle: Resource,
    used: Resource,
    releasing: Resource,

    /// Tasks currently accounted on this node.  `BTreeMap` so the replay in
    /// `set_node` and debug output are deterministic.
    tasks: BTreeMap<TaskId, TaskInfo>,
}

impl NodeInfo {
    /// Creates a virtual node with no backing object and zero capacity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a node directly from its backing cluster object.
    pub fn from_node(node: NodeRef) -> Self {
        let mut info = Self::new(node.name.clone());
        info.set_node(node);
        info
    }

    // ── Backing object ────────────────────────────────────────────────────────

    /// Binds (or re-binds) the backing cluster object.
    ///
    /// Recomputes `capability` and `allocatable`, seeds `idle` from
    /// `allocatable`, then replays every held task against the accounting
    /// vectors: all held tasks add to `used` and subtract from `idle`;
    /// `Releasing` tasks additionally add to `releasing`.
    pub fn set_node(&mut self, node: NodeRef) {
        self.name = node.name.clone();
        self.capability = node.capability.clone();
        self.allocatable = node.allocatable.clone();
        self.node = Some(node);

        self.idle = self.allocatable.clone();
        self.used = Resource::empty();
        self.releasing = Resource::empty();

        for task in self.tasks.values() {
            self.used.add(&task.resreq);
            self.idle.sub(&task.resreq);
            if task.status == TaskStatus::Releasing {
                self.releasing.add(&task.resreq);
            }
        }
    }

    /// Returns `true` once a real backing object is set.
    pub fn has_node(&self) -> bool {
        self.node.is_some()
    }

    pub fn node(&self) -> Option<&NodeRef> {
        self.node.as_ref()
    }

    // ── Accounting vectors ────────────────────────────────────────────────────

    pub fn capability(&self) -> &Resource {
        &self.capability
    }

    pub fn allocatable(&self) -> &Resource {
        &self.allocatable
    }

    pub fn idle(&self) -> &Resource {
        &self.idle
    }

    pub fn used(&self) -> &Resource {
        &self.used
    }

    pub fn releasing(&self) -> &Resource {
        &self.releasing
    }

    // ── Task accounting ───────────────────────────────────────────────────────

    /// Accounts `task` on this node.
    ///
    /// Adding a task already present is an invariant violation: logged,
    /// no-op.  On a real node the task's request moves from `idle` to
    /// `used`; a `Releasing` task also adds to `releasing`.
    pub fn add_task(&mut self, task: TaskInfo) {
        if self.tasks.contains_key(&task.uid) {
            error!(node = %self.name, task = %task.uid, "task already accounted on this node");
            return;
        }
        if self.node.is_some() {
            self.idle.sub(&task.resreq);
            self.used.add(&task.resreq);
            if task.status == TaskStatus::Releasing {
                self.releasing.add(&task.resreq);
            }
        }
        debug!(node = %self.name, task = %task.uid, status = %task.status, "task added to node");
        self.tasks.insert(task.uid.clone(), task);
    }

    /// Removes the task with id `uid`, reversing [`add_task`](Self::add_task).
    ///
    /// The reversal uses the stored copy of the task, so the accounting is
    /// exactly symmetric even if the caller's view of the task has drifted.
    /// Removing an unknown task is an invariant violation: logged, no-op.
    pub fn remove_task(&mut self, uid: &TaskId) -> Option<TaskInfo> {
        let Some(task) = self.tasks.remove(uid) else {
            error!(node = %self.name, task = %uid, "removal of a task not on this node");
            return None;
        };
        if self.node.is_some() {
            self.idle.add(&task.resreq);
            self.used.sub(&task.resreq);
            if task.status == TaskStatus::Releasing {
                self.releasing.sub(&task.resreq);
            }
        }
        debug!(node = %self.name, task = %uid, "task removed from node");
        Some(task)
    }

    /// Accounts a task that recycles capacity still being freed by a
    /// preemptee: moves its request from `releasing` into `used` and leaves
    /// `idle` untouched.
    ///
    /// Adding a task already present is an invariant violation: logged,
    /// no-op.
    pub fn pipeline_task(&mut self, task: TaskInfo) {
        if self.tasks.contains_key(&task.uid) {
            error!(node = %self.name, task = %task.uid, "task already accounted on this node");
            return;
        }
        if self.node.is_some() {
            self.releasing.sub(&task.resreq);
            self.used.add(&task.resreq);
        }
        debug!(node = %self.name, task = %task.uid, "task pipelined onto node");
        self.tasks.insert(task.uid.clone(), task);
    }

    // ── Read access ───────────────────────────────────────────────────────────

    /// The accounted task with id `uid`, if present.
    pub fn task(&self, uid: &TaskId) -> Option<&TaskInfo> {
        self.tasks.get(uid)
    }

    /// All tasks accounted on this node, in task-id order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskInfo> {
        self.tasks.values()
    }

    /// Number of tasks accounted on this node.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

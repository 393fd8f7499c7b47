/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Shared test fixtures: a recording cache fake and entity builders.
//!
//! Only compiled for tests.  The cache fake records every `bind` / `evict`
//! call and can be told to fail either, which is all the scenario tests need
//! to observe a session from the outside.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use anyhow::bail;

use crate::cache::{Cache, Snapshot};
use crate::job::JobInfo;
use crate::node::{NodeInfo, NodeRef};
use crate::resource::Resource;
use crate::task::{PodRef, TaskId, TaskInfo, TaskStatus};

// ── RecordingCache ────────────────────────────────────────────────────────────

/// A `Cache` fake that hands out a canned snapshot and records decisions.
pub struct RecordingCache {
    snapshot: Snapshot,
    pub binds: RefCell<Vec<(TaskId, String)>>,
    pub evicts: RefCell<Vec<TaskId>>,
    pub fail_bind: Cell<bool>,
    pub fail_evict: Cell<bool>,
}

impl RecordingCache {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            binds: RefCell::new(Vec::new()),
            evicts: RefCell::new(Vec::new()),
            fail_bind: Cell::new(false),
            fail_evict: Cell::new(false),
        }
    }

    /// A cache with an empty cluster.
    pub fn empty() -> Self {
        Self::new(Snapshot::default())
    }
}

impl Cache for RecordingCache {
    fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    fn bind(&self, task: &TaskInfo, hostname: &str) -> anyhow::Result<()> {
        if self.fail_bind.get() {
            bail!("injected bind failure");
        }
        self.binds
            .borrow_mut()
            .push((task.uid.clone(), hostname.to_string()));
        Ok(())
    }

    fn evict(&self, task: &TaskInfo) -> anyhow::Result<()> {
        if self.fail_evict.get() {
            bail!("injected evict failure");
        }
        self.evicts.borrow_mut().push(task.uid.clone());
        Ok(())
    }
}

// ── Entity builders ───────────────────────────────────────────────────────────

/// A task in namespace `default` with a CPU-only request and a backing pod.
pub fn make_task(name: &str, job: &str, status: TaskStatus, milli_cpu: f64) -> TaskInfo {
    let pod = Arc::new(PodRef {
        namespace: "default".to_string(),
        name: name.to_string(),
        uid: format!("pod-{name}"),
    });
    TaskInfo {
        uid: format!("default/{name}"),
        job: job.to_string(),
        name: name.to_string(),
        namespace: "default".to_string(),
        node_name: String::new(),
        priority: 0,
        resreq: Resource::new(milli_cpu, 0.0),
        status,
        pod: Some(pod),
    }
}

/// A job in namespace `default` owning `tasks`.
pub fn make_job(uid: &str, priority: i32, min_available: u32, tasks: Vec<TaskInfo>) -> JobInfo {
    let mut job = JobInfo::new(uid);
    job.name = uid.to_string();
    job.namespace = "default".to_string();
    job.queue = "default".to_string();
    job.priority = priority;
    job.min_available = min_available;
    for task in tasks {
        job.add_task_info(task);
    }
    job
}

/// A node with a real backing object and a CPU-only capacity.
pub fn make_node(name: &str, milli_cpu: f64) -> NodeInfo {
    NodeInfo::from_node(NodeRef {
        name: name.to_string(),
        capability: Resource::new(milli_cpu, 0.0),
        allocatable: Resource::new(milli_cpu, 0.0),
    })
}

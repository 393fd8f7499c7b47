/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! The scheduling session: one decision round over one snapshot.
//!
//! A [`Session`] is a short-lived, single-threaded context.  Opening it
//! takes a consistent snapshot from the [`Cache`], indexes jobs by UID and
//! nodes by name, and collects the plugin-supplied policy functions.
//! Actions then drive the decision operations ([`allocate`], [`pipeline`],
//! [`preempt`]); the only externally visible effects are the `bind` / `evict`
//! calls issued back to the cache.  Closing the session drops everything —
//! a session is never reused.
//!
//! # Policy aggregation
//! * Order functions fire in registration order; the first non-equal answer
//!   wins, and a total tie falls back to UID ascending so identical
//!   snapshots always produce identical schedules.
//! * Preemption predicates are AND-ed; with none registered preemption is
//!   disallowed.
//! * Readiness predicates are AND-ed; with none registered a job is always
//!   ready.
//! * Event handlers fire synchronously in registration order, before the
//!   operation returns.  Handlers receive an immutable [`Event`] record and
//!   must not call back into session-mutating methods.
//!
//! [`allocate`]: Session::allocate
//! [`pipeline`]: Session::pipeline
//! [`preempt`]: Session::preempt

pub mod error;

pub use error::SchedError;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tracing::{debug, error, info, warn};

use crate::cache::Cache;
use crate::job::JobInfo;
use crate::node::NodeInfo;
use crate::queue::CompareFn;
use crate::task::{JobId, TaskId, TaskInfo, TaskStatus};

// ── Plugin function types ─────────────────────────────────────────────────────

/// Job comparator: `Less` means the left job schedules first.
///
/// `Rc` so the action layer can clone the aggregate ordering into its own
/// queues and keep using it while mutating the session.
pub type JobOrderFn = Rc<dyn Fn(&JobInfo, &JobInfo) -> Ordering>;

/// Task comparator, same contract as [`JobOrderFn`].
pub type TaskOrderFn = Rc<dyn Fn(&TaskInfo, &TaskInfo) -> Ordering>;

/// Preemption predicate over `(preemptor, preemptee)`.
pub type PreemptableFn = Box<dyn Fn(&TaskInfo, &TaskInfo) -> bool>;

/// Gang-readiness predicate over a job.
pub type JobReadyFn = Box<dyn Fn(&JobInfo) -> bool>;

// ── Events ────────────────────────────────────────────────────────────────────

/// Immutable record handed to event handlers.
#[derive(Debug, Clone)]
pub struct Event {
    pub task: TaskInfo,
}

/// Event callback.  Must not call back into session-mutating methods.
pub type EventFn = Box<dyn Fn(&Event)>;

/// Paired allocation / eviction callbacks so external bookkeeping (e.g.
/// queue-level fair-share accountants) can follow the session's decisions.
#[derive(Default)]
pub struct EventHandler {
    pub allocate_fn: Option<EventFn>,
    pub evict_fn: Option<EventFn>,
}

// ── Session ───────────────────────────────────────────────────────────────────

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

/// One decision round's context: snapshot-scoped state plus the registered
/// policy surface.
pub struct Session<'c> {
    uid: String,
    cache: &'c dyn Cache,

    jobs: HashMap<JobId, JobInfo>,
    nodes: BTreeMap<String, NodeInfo>,

    job_order_fns: Vec<JobOrderFn>,
    task_order_fns: Vec<TaskOrderFn>,
    preemptable_fns: Vec<PreemptableFn>,
    job_ready_fns: Vec<JobReadyFn>,
    event_handlers: Vec<EventHandler>,
}

impl<'c> Session<'c> {
    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Opens a session: allocates a fresh UID, snapshots the cache, and
    /// indexes jobs by UID and nodes by name.
    pub fn open(cache: &'c dyn Cache) -> Self {
        let seq = SESSION_SEQ.fetch_add(1, AtomicOrdering::Relaxed);
        let uid = format!("ssn-{seq:06}");

        let snapshot = cache.snapshot();
        let mut jobs = HashMap::new();
        for job in snapshot.jobs {
            jobs.insert(job.uid.clone(), job);
        }
        let mut nodes = BTreeMap::new();
        for node in snapshot.nodes {
            nodes.insert(node.name.clone(), node);
        }

        info!(
            session = %uid,
            jobs = jobs.len(),
            nodes = nodes.len(),
            "session opened"
        );

        Self {
            uid,
            cache,
            jobs,
            nodes,
            job_order_fns: Vec::new(),
            task_order_fns: Vec::new(),
            preemptable_fns: Vec::new(),
            job_ready_fns: Vec::new(),
            event_handlers: Vec::new(),
        }
    }

    /// Closes the session, dropping all snapshot state and registered
    /// policies.
    pub fn close(self) {
        info!(session = %self.uid, "session closed");
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    // ── Read access ───────────────────────────────────────────────────────────

    /// All jobs in the snapshot, in no particular order.
    pub fn jobs(&self) -> impl Iterator<Item = &JobInfo> {
        self.jobs.values()
    }

    pub fn job(&self, uid: &str) -> Option<&JobInfo> {
        self.jobs.get(uid)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// All nodes in the snapshot, in node-name order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    pub fn node(&self, name: &str) -> Option<&NodeInfo> {
        self.nodes.get(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ── Plugin registration (append-only) ─────────────────────────────────────

    pub fn add_job_order_fn<F>(&mut self, f: F)
    where
        F: Fn(&JobInfo, &JobInfo) -> Ordering + 'static,
    {
        self.job_order_fns.push(Rc::new(f));
    }

    pub fn add_task_order_fn<F>(&mut self, f: F)
    where
        F: Fn(&TaskInfo, &TaskInfo) -> Ordering + 'static,
    {
        self.task_order_fns.push(Rc::new(f));
    }

    pub fn add_preemptable_fn<F>(&mut self, f: F)
    where
        F: Fn(&TaskInfo, &TaskInfo) -> bool + 'static,
    {
        self.preemptable_fns.push(Box::new(f));
    }

    pub fn add_job_ready_fn<F>(&mut self, f: F)
    where
        F: Fn(&JobInfo) -> bool + 'static,
    {
        self.job_ready_fns.push(Box::new(f));
    }

    pub fn add_event_handler(&mut self, handler: EventHandler) {
        self.event_handlers.push(handler);
    }

    // ── Policy aggregation ────────────────────────────────────────────────────

    /// Returns `true` iff job `l` should be scheduled before job `r`.
    pub fn job_order(&self, l: &JobInfo, r: &JobInfo) -> bool {
        for f in &self.job_order_fns {
            match f(l, r) {
                Ordering::Equal => continue,
                ord => return ord == Ordering::Less,
            }
        }
        l.uid < r.uid
    }

    /// Returns `true` iff task `l` should be scheduled before task `r`.
    pub fn task_order(&self, l: &TaskInfo, r: &TaskInfo) -> bool {
        for f in &self.task_order_fns {
            match f(l, r) {
                Ordering::Equal => continue,
                ord => return ord == Ordering::Less,
            }
        }
        l.uid < r.uid
    }

    /// Conjunction of every registered preemption predicate; `false` when
    /// none are registered (preemption must be opted into).
    pub fn preemptable(&self, preemptor: &TaskInfo, preemptee: &TaskInfo) -> bool {
        if self.preemptable_fns.is_empty() {
            return false;
        }
        self.preemptable_fns.iter().all(|f| f(preemptor, preemptee))
    }

    /// Conjunction of every registered readiness predicate; `true` when none
    /// are registered.
    pub fn job_ready(&self, job: &JobInfo) -> bool {
        self.job_ready_fns.iter().all(|f| f(job))
    }

    /// The aggregate job ordering as a standalone comparator, usable by an
    /// action's private queues while the session itself is being mutated.
    pub fn job_less_fn(&self) -> CompareFn<JobInfo> {
        let fns = self.job_order_fns.clone();
        Box::new(move |l, r| {
            for f in &fns {
                match f(l, r) {
                    Ordering::Equal => continue,
                    ord => return ord == Ordering::Less,
                }
            }
            l.uid < r.uid
        })
    }

    /// The reverse of [`job_less_fn`](Self::job_less_fn) — worst job first.
    pub fn job_greater_fn(&self) -> CompareFn<JobInfo> {
        let less = self.job_less_fn();
        Box::new(move |l, r| less(r, l))
    }

    /// The aggregate task ordering as a standalone comparator.
    pub fn task_less_fn(&self) -> CompareFn<TaskInfo> {
        let fns = self.task_order_fns.clone();
        Box::new(move |l, r| {
            for f in &fns {
                match f(l, r) {
                    Ordering::Equal => continue,
                    ord => return ord == Ordering::Less,
                }
            }
            l.uid < r.uid
        })
    }

    /// The reverse of [`task_less_fn`](Self::task_less_fn) — least important
    /// task first.
    pub fn task_greater_fn(&self) -> CompareFn<TaskInfo> {
        let less = self.task_less_fn();
        Box::new(move |l, r| less(r, l))
    }

    // ── Decision operations ───────────────────────────────────────────────────

    /// Places `task` on `hostname`.
    ///
    /// Moves the task into the owning job's `Allocated` bucket, accounts it
    /// on the node, and fires every allocate handler.  If the owning job's
    /// readiness predicates then all hold, every task in the `Allocated`
    /// bucket is dispatched to the cache — gang dispatch is atomic: tasks
    /// accumulate in the bucket and cross to the cache together.
    ///
    /// # Errors
    /// Only a failed cache `bind` during dispatch is returned; in-session
    /// state is not rolled back.
    pub fn allocate(&mut self, task: &TaskInfo, hostname: &str) -> Result<(), SchedError> {
        let placed = self.place(task, hostname, TaskStatus::Allocated);

        match self.nodes.get_mut(hostname) {
            Some(node) => node.add_task(placed.clone()),
            None => warn!(
                session = %self.uid,
                task = %placed.uid,
                node = %hostname,
                "allocate: node not in session index — accounting skipped"
            ),
        }

        debug!(session = %self.uid, task = %placed.uid, node = %hostname, "task allocated");
        self.fire_allocate_event(&placed);

        let ready_tasks: Option<Vec<TaskId>> = match self.jobs.get(&task.job) {
            Some(job) if self.job_ready(job) => Some(
                job.tasks_with_status(TaskStatus::Allocated)
                    .map(|t| t.uid.clone())
                    .collect(),
            ),
            _ => None,
        };
        if let Some(uids) = ready_tasks {
            debug!(
                session = %self.uid,
                job = %task.job,
                tasks = uids.len(),
                "job ready — dispatching allocated tasks"
            );
            for uid in uids {
                self.dispatch(&task.job, &uid)?;
            }
        }
        Ok(())
    }

    /// Places `task` on `hostname` by recycling capacity a preemptee is
    /// still freeing: the task enters the `Pipelined` bucket and the node
    /// moves the request from `releasing` into `used` without touching
    /// `idle`.
    ///
    /// Pipelined tasks are not dispatched — their capacity is not yet free
    /// to bind against.
    pub fn pipeline(&mut self, task: &TaskInfo, hostname: &str) -> Result<(), SchedError> {
        let placed = self.place(task, hostname, TaskStatus::Pipelined);

        match self.nodes.get_mut(hostname) {
            Some(node) => node.pipeline_task(placed.clone()),
            None => warn!(
                session = %self.uid,
                task = %placed.uid,
                node = %hostname,
                "pipeline: node not in session index — accounting skipped"
            ),
        }

        debug!(session = %self.uid, task = %placed.uid, node = %hostname, "task pipelined");
        self.fire_allocate_event(&placed);
        Ok(())
    }

    /// Evicts `preemptee` through the cache on behalf of `preemptor`.
    ///
    /// On success the allocate handlers fire with the preemptor and the
    /// evict handlers with the preemptee.  The preemptee's transition to
    /// `Releasing` and the node-side capacity movement arrive with the next
    /// snapshot; a caller that must claim the released capacity immediately
    /// follows up with [`pipeline`](Self::pipeline).
    pub fn preempt(&mut self, preemptor: &TaskInfo, preemptee: &TaskInfo) -> Result<(), SchedError> {
        if let Err(source) = self.cache.evict(preemptee) {
            return Err(SchedError::EvictFailed {
                task: preemptee.uid.clone(),
                source,
            });
        }

        info!(
            session = %self.uid,
            preemptor = %preemptor.uid,
            preemptee = %preemptee.uid,
            "preemption issued"
        );

        for handler in &self.event_handlers {
            if let Some(f) = &handler.allocate_fn {
                f(&Event {
                    task: preemptor.clone(),
                });
            }
            if let Some(f) = &handler.evict_fn {
                f(&Event {
                    task: preemptee.clone(),
                });
            }
        }
        Ok(())
    }

    /// Applies the job-side half of a placement and returns the updated
    /// task.  A job missing from the index is logged and skipped; the
    /// returned copy still carries the placement so the node side and the
    /// event handlers see a consistent task.
    fn place(&mut self, task: &TaskInfo, hostname: &str, status: TaskStatus) -> TaskInfo {
        match self.jobs.get_mut(&task.job) {
            Some(job) => {
                job.set_task_node_name(&task.uid, hostname);
                job.update_task_status(&task.uid, status);
                if let Some(updated) = job.task(&task.uid) {
                    return updated.clone();
                }
                // set_task_node_name already logged the unknown task
                let mut placed = task.clone();
                placed.node_name = hostname.to_string();
                placed.status = status;
                placed
            }
            None => {
                warn!(
                    session = %self.uid,
                    task = %task.uid,
                    job = %task.job,
                    "job not in session index — job-side update skipped"
                );
                let mut placed = task.clone();
                placed.node_name = hostname.to_string();
                placed.status = status;
                placed
            }
        }
    }

    /// Sends one allocated task to the cache.
    ///
    /// On bind success the task moves to `Binding`; on failure the error is
    /// surfaced to the caller of the enclosing operation and the task keeps
    /// its current status.  No in-session retry.
    fn dispatch(&mut self, job_uid: &JobId, task_uid: &TaskId) -> Result<(), SchedError> {
        let task = match self.jobs.get(job_uid).and_then(|j| j.task(task_uid)) {
            Some(task) => task.clone(),
            None => {
                error!(
                    session = %self.uid,
                    job = %job_uid,
                    task = %task_uid,
                    "dispatch of a task the session does not know"
                );
                return Ok(());
            }
        };

        if let Err(source) = self.cache.bind(&task, &task.node_name) {
            return Err(SchedError::BindFailed {
                task: task.uid.clone(),
                node: task.node_name.clone(),
                source,
            });
        }

        if let Some(job) = self.jobs.get_mut(job_uid) {
            job.update_task_status(task_uid, TaskStatus::Binding);
        }
        debug!(session = %self.uid, task = %task_uid, node = %task.node_name, "task dispatched");
        Ok(())
    }

    fn fire_allocate_event(&self, task: &TaskInfo) {
        for handler in &self.event_handlers {
            if let Some(f) = &handler.allocate_fn {
                f(&Event { task: task.clone() });
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! The allocate action.
//!
//! Walks jobs in the session's job order and each job's pending tasks in
//! the session's task order, placing every task on the first node (by name)
//! whose idle capacity fits the request.  Fit checks read the node's *live*
//! accounting, so earlier placements in the same round are visible to later
//! ones.
//!
//! A task that fits nowhere is skipped for the round; freeing capacity for
//! it is the preempt action's business.

use tracing::{debug, warn};

use crate::actions::Action;
use crate::job::JobInfo;
use crate::queue::PriorityQueue;
use crate::session::Session;
use crate::task::TaskStatus;

// ── AllocateAction ────────────────────────────────────────────────────────────

/// Places pending tasks onto nodes with free capacity.
pub struct AllocateAction;

impl Action for AllocateAction {
    fn name(&self) -> &'static str {
        "allocate"
    }

    fn execute(&mut self, ssn: &mut Session) {
        let mut jobs: PriorityQueue<JobInfo> = PriorityQueue::new(ssn.job_less_fn());
        for job in ssn.jobs() {
            jobs.push(job.clone());
        }

        while let Some(job) = jobs.pop() {
            let mut pending = PriorityQueue::new(ssn.task_less_fn());
            for task in job.tasks_with_status(TaskStatus::Pending) {
                pending.push(task.clone());
            }
            if pending.is_empty() {
                continue;
            }
            debug!(session = %ssn.uid(), job = %job.uid, pending = pending.len(), "allocating job");

            while let Some(task) = pending.pop() {
                let hostname = ssn
                    .nodes()
                    .find(|node| task.resreq.less_equal(node.idle()))
                    .map(|node| node.name.clone());

                match hostname {
                    Some(hostname) => {
                        if let Err(err) = ssn.allocate(&task, &hostname) {
                            warn!(
                                session = %ssn.uid(),
                                task = %task.uid,
                                node = %hostname,
                                error = %err,
                                "allocation failed"
                            );
                        }
                    }
                    None => debug!(
                        session = %ssn.uid(),
                        task = %task.uid,
                        "no node fits the task this round"
                    ),
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! The round driver.
//!
//! One [`Scheduler::run_once`] call is one decision round: open a session
//! over the cache, let every plugin register its policies, run the
//! configured actions in order, let the plugins tear down, close the
//! session.  Pacing between rounds is the embedding binary's business.

use tracing::{info, warn};

use crate::actions;
use crate::cache::Cache;
use crate::config::SchedulerConf;
use crate::plugins::Plugin;
use crate::session::Session;

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Owns the round configuration and the plugin stack.
pub struct Scheduler {
    conf: SchedulerConf,
    plugins: Vec<Box<dyn Plugin>>,
}

impl Scheduler {
    pub fn new(conf: SchedulerConf) -> Self {
        Self {
            conf,
            plugins: Vec::new(),
        }
    }

    /// Appends a plugin.  Registration order is policy order.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn conf(&self) -> &SchedulerConf {
        &self.conf
    }

    /// Executes one scheduling round against `cache`.
    pub fn run_once(&self, cache: &dyn Cache) {
        let mut ssn = Session::open(cache);

        for plugin in &self.plugins {
            plugin.on_session_open(&mut ssn);
        }

        for name in &self.conf.actions {
            match actions::new_action(name) {
                Some(mut action) => {
                    info!(session = %ssn.uid(), action = action.name(), "executing action");
                    action.initialize();
                    action.execute(&mut ssn);
                    action.un_initialize();
                }
                None => warn!(
                    session = %ssn.uid(),
                    action = %name,
                    "unknown action in configuration — skipping"
                ),
            }
        }

        for plugin in &self.plugins {
            plugin.on_session_close(&mut ssn);
        }
        ssn.close();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Snapshot;
    use crate::plugins::{GangPlugin, PriorityPlugin};
    use crate::task::TaskStatus;
    use crate::test_util::{make_job, make_node, make_task, RecordingCache};

    #[test]
    fn a_round_allocates_pending_work() {
        let task = make_task("t1", "job-a", TaskStatus::Pending, 1000.0);
        let cache = RecordingCache::new(Snapshot {
            jobs: vec![make_job("job-a", 1, 1, vec![task.clone()])],
            nodes: vec![make_node("n1", 4000.0)],
        });

        let mut scheduler = Scheduler::new(SchedulerConf::default());
        scheduler.add_plugin(Box::new(PriorityPlugin));
        scheduler.add_plugin(Box::new(GangPlugin));
        scheduler.run_once(&cache);

        assert_eq!(
            cache.binds.borrow().as_slice(),
            &[(task.uid.clone(), "n1".to_string())]
        );
    }

    #[test]
    fn a_round_preempts_when_allocation_cannot_fit() {
        // Full node: the high-priority pending task cannot allocate, so the
        // preempt action takes the low-priority running task.
        let mut preemptor = make_task("hi-0", "job-hi", TaskStatus::Pending, 2000.0);
        preemptor.priority = 10;
        let preemptee = make_task("lo-0", "job-lo", TaskStatus::Running, 2000.0);
        let mut node = make_node("n1", 2000.0);
        node.add_task(preemptee.clone());

        let cache = RecordingCache::new(Snapshot {
            jobs: vec![
                make_job("job-hi", 10, 1, vec![preemptor]),
                make_job("job-lo", 1, 1, vec![preemptee.clone()]),
            ],
            nodes: vec![node],
        });

        let mut scheduler = Scheduler::new(SchedulerConf::default());
        scheduler.add_plugin(Box::new(PriorityPlugin));
        scheduler.run_once(&cache);

        assert!(cache.binds.borrow().is_empty());
        assert_eq!(cache.evicts.borrow().as_slice(), &[preemptee.uid.clone()]);
    }

    #[test]
    fn unknown_actions_are_skipped() {
        let cache = RecordingCache::empty();
        let scheduler = Scheduler::new(SchedulerConf {
            actions: vec!["backfill".to_string(), "allocate".to_string()],
            schedule_interval_ms: 1,
        });
        // Must not panic; the unknown action is logged and skipped.
        scheduler.run_once(&cache);
    }
}

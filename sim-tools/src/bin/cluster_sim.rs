/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Cluster cache simulator.
//!
//! Stands in for the production cluster cache so scheduling rounds can be
//! exercised end to end on a laptop:
//!
//! * Seeds an in-memory cluster from a cluster-state YAML file.
//! * `bind` marks the task `Bound` on its node; `evict` marks it
//!   `Releasing`.  Both become visible in the *next* snapshot, which is
//!   exactly the lazy reconciliation the session design assumes.
//! * Between rounds, accepted evictions complete: `Releasing` tasks leave
//!   the cluster and their capacity returns.
//! * Runs N rounds with the configured actions and logs every decision.
//!
//! Example cluster-state file:
//! ```yaml
//! nodes:
//!   node01: { milli_cpu: 4000, memory: 8589934592 }
//! jobs:
//!   - name: analytics
//!     priority: 10
//!     min_available: 2
//!     tasks:
//!       - { name: analytics-0, milli_cpu: 1000, memory: 1073741824 }
//!       - { name: analytics-1, milli_cpu: 1000, memory: 1073741824 }
//!   - name: batch-report
//!     priority: 1
//!     tasks:
//!       - { name: report-0, status: running, node: node01, milli_cpu: 4000 }
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arbiter_core::cache::{Cache, Snapshot};
use arbiter_core::config::SchedulerConf;
use arbiter_core::job::JobInfo;
use arbiter_core::node::{NodeInfo, NodeRef};
use arbiter_core::plugins::{GangPlugin, PriorityPlugin};
use arbiter_core::resource::Resource;
use arbiter_core::scheduler::Scheduler;
use arbiter_core::task::{JobId, PodRef, TaskId, TaskInfo, TaskStatus};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "cluster-sim",
    about = "Runs scheduling rounds against a YAML-seeded simulated cluster"
)]
struct Args {
    /// Cluster-state YAML file (nodes and jobs).
    #[arg(long)]
    cluster_state: PathBuf,

    /// Scheduler configuration YAML; defaults apply when omitted.
    #[arg(long)]
    scheduler_conf: Option<PathBuf>,

    /// Number of scheduling rounds to run.
    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Overrides the configured pause between rounds, in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,
}

// ── Cluster-state YAML types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ClusterFile {
    #[serde(default)]
    nodes: BTreeMap<String, NodeEntry>,
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    milli_cpu: f64,
    #[serde(default)]
    memory: f64,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    name: String,
    #[serde(default = "default_namespace")]
    namespace: String,
    #[serde(default)]
    queue: String,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_min_available")]
    min_available: u32,
    #[serde(default)]
    tasks: Vec<TaskEntry>,
}

#[derive(Debug, Deserialize)]
struct TaskEntry {
    name: String,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    node: Option<String>,
    milli_cpu: f64,
    #[serde(default)]
    memory: f64,
    #[serde(default)]
    priority: i32,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_min_available() -> u32 {
    1
}

fn default_status() -> String {
    "pending".to_string()
}

// ── SimCache ──────────────────────────────────────────────────────────────────

/// Mutable model of one simulated task.
#[derive(Debug, Clone)]
struct SimTask {
    job: JobId,
    name: String,
    namespace: String,
    node_name: String,
    priority: i32,
    resreq: Resource,
    status: TaskStatus,
}

#[derive(Debug, Clone)]
struct SimJob {
    name: String,
    namespace: String,
    queue: String,
    priority: i32,
    min_available: u32,
}

/// In-memory stand-in for the cluster cache.
///
/// Single-threaded on purpose: the scheduling session is single-threaded,
/// and the simulator drives it from one thread, so interior mutability via
/// `RefCell` is all the synchronisation this needs.
#[derive(Debug)]
struct SimCache {
    nodes: BTreeMap<String, Resource>,
    jobs: BTreeMap<JobId, SimJob>,
    tasks: RefCell<BTreeMap<TaskId, SimTask>>,
}

impl SimCache {
    fn from_file(file: ClusterFile) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for (name, entry) in file.nodes {
            nodes.insert(name, Resource::new(entry.milli_cpu, entry.memory));
        }

        let mut jobs = BTreeMap::new();
        let mut tasks = BTreeMap::new();
        for job in file.jobs {
            let job_uid = format!("{}/{}", job.namespace, job.name);
            for task in &job.tasks {
                let status: TaskStatus = task
                    .status
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!(e))
                    .with_context(|| format!("task '{}' in job '{job_uid}'", task.name))?;
                let node_name = task.node.clone().unwrap_or_default();
                if status.occupies_node() && node_name.is_empty() {
                    bail!(
                        "task '{}' in job '{job_uid}' is {status:?} but names no node",
                        task.name
                    );
                }
                let uid = format!("{}/{}", job.namespace, task.name);
                tasks.insert(
                    uid,
                    SimTask {
                        job: job_uid.clone(),
                        name: task.name.clone(),
                        namespace: job.namespace.clone(),
                        node_name,
                        priority: task.priority,
                        resreq: Resource::new(task.milli_cpu, task.memory),
                        status,
                    },
                );
            }
            jobs.insert(
                job_uid,
                SimJob {
                    name: job.name,
                    namespace: job.namespace,
                    queue: job.queue,
                    priority: job.priority,
                    min_available: job.min_available,
                },
            );
        }

        Ok(Self {
            nodes,
            jobs,
            tasks: RefCell::new(tasks),
        })
    }

    fn materialise_task(uid: &TaskId, sim: &SimTask) -> TaskInfo {
        let pod = Arc::new(PodRef {
            namespace: sim.namespace.clone(),
            name: sim.name.clone(),
            uid: format!("pod-{}", sim.name),
        });
        TaskInfo {
            uid: uid.clone(),
            job: sim.job.clone(),
            name: sim.name.clone(),
            namespace: sim.namespace.clone(),
            node_name: sim.node_name.clone(),
            priority: sim.priority,
            resreq: sim.resreq.clone(),
            status: sim.status,
            pod: Some(pod),
        }
    }

    /// Completes accepted evictions: `Releasing` tasks terminate and leave
    /// the cluster.  The driver calls this between rounds, playing the part
    /// of the cluster actually stopping the evicted pods.
    fn reconcile_evictions(&self) {
        let mut tasks = self.tasks.borrow_mut();
        tasks.retain(|uid, task| {
            if task.status == TaskStatus::Releasing {
                info!(task = %uid, node = %task.node_name, "cluster: eviction completed");
                false
            } else {
                true
            }
        });
    }

    /// Counts of simulated tasks per status, for the round report.
    fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for task in self.tasks.borrow().values() {
            *counts.entry(task.status.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

impl Cache for SimCache {
    fn snapshot(&self) -> Snapshot {
        let tasks = self.tasks.borrow();

        let mut jobs: BTreeMap<JobId, JobInfo> = BTreeMap::new();
        for (uid, sim) in &self.jobs {
            let mut job = JobInfo::new(uid.clone());
            job.name = sim.name.clone();
            job.namespace = sim.namespace.clone();
            job.queue = sim.queue.clone();
            job.priority = sim.priority;
            job.min_available = sim.min_available;
            jobs.insert(uid.clone(), job);
        }
        for (uid, sim) in tasks.iter() {
            if let Some(job) = jobs.get_mut(&sim.job) {
                job.add_task_info(Self::materialise_task(uid, sim));
            }
        }

        let mut nodes = Vec::new();
        for (name, capacity) in &self.nodes {
            let mut node = NodeInfo::from_node(NodeRef {
                name: name.clone(),
                capability: capacity.clone(),
                allocatable: capacity.clone(),
            });
            for (uid, sim) in tasks.iter() {
                if sim.node_name == *name && sim.status.occupies_node() {
                    node.add_task(Self::materialise_task(uid, sim));
                }
            }
            nodes.push(node);
        }

        Snapshot {
            jobs: jobs.into_values().collect(),
            nodes,
        }
    }

    fn bind(&self, task: &TaskInfo, hostname: &str) -> Result<()> {
        let mut tasks = self.tasks.borrow_mut();
        let Some(sim) = tasks.get_mut(&task.uid) else {
            bail!("bind of unknown task '{}'", task.uid);
        };
        sim.node_name = hostname.to_string();
        sim.status = TaskStatus::Bound;
        info!(task = %task.uid, node = %hostname, "cluster: task bound");
        Ok(())
    }

    fn evict(&self, task: &TaskInfo) -> Result<()> {
        let mut tasks = self.tasks.borrow_mut();
        let Some(sim) = tasks.get_mut(&task.uid) else {
            bail!("evict of unknown task '{}'", task.uid);
        };
        sim.status = TaskStatus::Releasing;
        info!(task = %task.uid, node = %sim.node_name, "cluster: task releasing");
        Ok(())
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut conf = match &args.scheduler_conf {
        Some(path) => SchedulerConf::load_from_file(path)?,
        None => SchedulerConf::default(),
    };
    if let Some(interval_ms) = args.interval_ms {
        conf.schedule_interval_ms = interval_ms;
    }

    let content = std::fs::read_to_string(&args.cluster_state).with_context(|| {
        format!(
            "cannot open cluster-state file: {}",
            args.cluster_state.display()
        )
    })?;
    let file: ClusterFile = serde_yaml::from_str(&content).with_context(|| {
        format!(
            "failed to parse cluster-state file: {}",
            args.cluster_state.display()
        )
    })?;
    let cache = SimCache::from_file(file)?;

    if cache.nodes.is_empty() {
        warn!("cluster-state file declares no nodes — nothing will be schedulable");
    }
    info!(
        nodes = cache.nodes.len(),
        jobs = cache.jobs.len(),
        tasks = cache.tasks.borrow().len(),
        "simulated cluster seeded"
    );

    let mut scheduler = Scheduler::new(conf);
    scheduler.add_plugin(Box::new(PriorityPlugin));
    scheduler.add_plugin(Box::new(GangPlugin));

    for round in 1..=args.rounds {
        info!(round, "=== scheduling round ===");
        scheduler.run_once(&cache);
        info!(round, counts = ?cache.status_counts(), "round complete");

        if round < args.rounds {
            thread::sleep(Duration::from_millis(scheduler.conf().schedule_interval_ms));
            cache.reconcile_evictions();
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Scheduler configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! actions: [allocate, preempt]
//! schedule_interval_ms: 1000
//! ```
//!
//! Both fields are optional; a missing field falls back to its default, so
//! a file containing only `{}` yields the default configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

// ── Private YAML deserialization types ────────────────────────────────────────

/// On-disk layout.  Kept private — callers work with [`SchedulerConf`].
#[derive(Debug, Deserialize)]
struct ConfFile {
    #[serde(default = "default_actions")]
    actions: Vec<String>,
    #[serde(default = "default_interval_ms")]
    schedule_interval_ms: u64,
}

fn default_actions() -> Vec<String> {
    vec!["allocate".to_string(), "preempt".to_string()]
}

fn default_interval_ms() -> u64 {
    1_000
}

// ── SchedulerConf ─────────────────────────────────────────────────────────────

/// Round configuration: which actions run, in which order, and how long the
/// driver sleeps between rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConf {
    /// Action names, executed in list order each round.  Unknown names are
    /// skipped with a warning by the driver.
    pub actions: Vec<String>,

    /// Pause between rounds, in milliseconds.
    pub schedule_interval_ms: u64,
}

impl Default for SchedulerConf {
    fn default() -> Self {
        Self {
            actions: default_actions(),
            schedule_interval_ms: default_interval_ms(),
        }
    }
}

impl SchedulerConf {
    /// Parses `path` into a configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the YAML is
    /// structurally invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot open configuration file: {}", path.display()))?;

        let file: ConfFile = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML file: {}", path.display()))?;

        let conf = Self {
            actions: file.actions,
            schedule_interval_ms: file.schedule_interval_ms,
        };
        info!(
            actions = ?conf.actions,
            interval_ms = conf.schedule_interval_ms,
            "scheduler configuration loaded"
        );
        Ok(conf)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn default_runs_allocate_then_preempt() {
        let conf = SchedulerConf::default();
        assert_eq!(conf.actions, vec!["allocate", "preempt"]);
        assert_eq!(conf.schedule_interval_ms, 1_000);
    }

    #[test]
    fn load_full_file() {
        let f = yaml_tempfile("actions: [preempt]\nschedule_interval_ms: 250\n");
        let conf = SchedulerConf::load_from_file(f.path()).unwrap();
        assert_eq!(conf.actions, vec!["preempt"]);
        assert_eq!(conf.schedule_interval_ms, 250);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let f = yaml_tempfile("schedule_interval_ms: 5000\n");
        let conf = SchedulerConf::load_from_file(f.path()).unwrap();
        assert_eq!(conf.actions, vec!["allocate", "preempt"]);
        assert_eq!(conf.schedule_interval_ms, 5_000);
    }

    #[test]
    fn missing_file_returns_error() {
        let result = SchedulerConf::load_from_file(Path::new("/nonexistent/arbiter.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("actions: [unterminated\n");
        assert!(SchedulerConf::load_from_file(f.path()).is_err());
    }
}

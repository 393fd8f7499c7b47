/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Scheduling policy plugins.
//!
//! A plugin registers zero or more policy functions (ordering, readiness,
//! preemption predicates, event handlers) when a session opens, and may
//! tear external bookkeeping down when it closes.  Plugins query the
//! session read-only; all mutation happens through the session's documented
//! operations.
//!
//! Two small built-in policies ship here; everything richer (fair-share,
//! queue quotas, reservation) belongs to the embedding binary.

pub mod gang;
pub mod priority;

pub use gang::GangPlugin;
pub use priority::PriorityPlugin;

use crate::session::Session;

// ── Plugin ────────────────────────────────────────────────────────────────────

/// A named bundle of policy registrations.
pub trait Plugin {
    /// Stable plugin name, for logs and configuration.
    fn name(&self) -> &'static str;

    /// Called once per round, right after the session opens.  This is where
    /// the plugin registers its policy functions.
    fn on_session_open(&self, ssn: &mut Session);

    /// Called once per round, right before the session closes.
    fn on_session_close(&self, _ssn: &mut Session) {}
}

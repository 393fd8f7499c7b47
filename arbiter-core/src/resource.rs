/*
SPDX-FileCopyrightText: Copyright 2026 Arbiter Project Contributors
SPDX-License-Identifier: MIT
*/

//! Additive resource vectors.
//!
//! [`Resource`] models both sides of every fit decision with one comparable
//! vector: the request of a task (`resreq`) and the capacity accounting of a
//! node (`idle` / `used` / `releasing`).  Dimensions are CPU in millicores,
//! memory in bytes, and zero or more named scalar extensions (accelerator
//! counts, ephemeral storage, ...).
//!
//! Arithmetic is total over non-negative operands.  Subtracting more than is
//! available is a caller bug: the operation logs at error level and leaves
//! the vector untouched, so one misbehaving job cannot poison the accounting
//! of a whole scheduling round.

use std::collections::BTreeMap;

use tracing::error;

// ── Resource ──────────────────────────────────────────────────────────────────

/// A fixed-arity additive vector over named resource dimensions.
///
/// `scalars` uses `BTreeMap` (not `HashMap`) so equality checks and debug
/// output are deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    /// CPU in millicores (1000 = one core).
    pub milli_cpu: f64,

    /// Memory in bytes.
    pub memory: f64,

    /// Scalar extension dimensions, keyed by resource name.
    pub scalars: BTreeMap<String, f64>,
}

impl Resource {
    /// The zero vector.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A vector with the two built-in dimensions set and no scalars.
    pub fn new(milli_cpu: f64, memory: f64) -> Self {
        Self {
            milli_cpu,
            memory,
            scalars: BTreeMap::new(),
        }
    }

    /// Builder-style helper for scalar extension dimensions.
    pub fn with_scalar(mut self, name: impl Into<String>, quantity: f64) -> Self {
        self.scalars.insert(name.into(), quantity);
        self
    }

    /// Returns `true` if every dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.milli_cpu == 0.0 && self.memory == 0.0 && self.scalars.values().all(|&v| v == 0.0)
    }

    /// Componentwise addition, in place.  Scalar dimensions absent from
    /// `self` are created.
    pub fn add(&mut self, other: &Resource) -> &mut Self {
        self.milli_cpu += other.milli_cpu;
        self.memory += other.memory;
        for (name, quantity) in &other.scalars {
            *self.scalars.entry(name.clone()).or_insert(0.0) += quantity;
        }
        self
    }

    /// Componentwise subtraction, in place.
    ///
    /// Subtracting more than is available breaks the no-negative-component
    /// invariant; the call logs at error level and leaves `self` unchanged.
    pub fn sub(&mut self, other: &Resource) -> &mut Self {
        if !other.less_equal(self) {
            error!(
                have = ?self,
                want = ?other,
                "resource subtraction would go negative — operation skipped"
            );
            return self;
        }
        self.milli_cpu -= other.milli_cpu;
        self.memory -= other.memory;
        for (name, quantity) in &other.scalars {
            if let Some(v) = self.scalars.get_mut(name) {
                *v -= quantity;
            }
        }
        self
    }

    /// Componentwise `≤`.  A scalar dimension missing from `other` counts as
    /// zero on that side.
    pub fn less_equal(&self, other: &Resource) -> bool {
        if self.milli_cpu > other.milli_cpu || self.memory > other.memory {
            return false;
        }
        self.scalars
            .iter()
            .all(|(name, &quantity)| quantity <= other.scalars.get(name).copied().unwrap_or(0.0))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_all_zero() {
        let r = Resource::empty();
        assert_eq!(r.milli_cpu, 0.0);
        assert_eq!(r.memory, 0.0);
        assert!(r.scalars.is_empty());
        assert!(r.is_empty());
    }

    #[test]
    fn add_sums_all_dimensions() {
        let mut a = Resource::new(1000.0, 512.0).with_scalar("gpu", 1.0);
        let b = Resource::new(500.0, 256.0)
            .with_scalar("gpu", 2.0)
            .with_scalar("fpga", 1.0);
        a.add(&b);

        assert_eq!(a.milli_cpu, 1500.0);
        assert_eq!(a.memory, 768.0);
        assert_eq!(a.scalars["gpu"], 3.0);
        assert_eq!(a.scalars["fpga"], 1.0);
    }

    #[test]
    fn sub_is_exact_inverse_of_add() {
        let original = Resource::new(4000.0, 1024.0).with_scalar("gpu", 2.0);
        let delta = Resource::new(1500.0, 512.0).with_scalar("gpu", 1.0);

        let mut r = original.clone();
        r.add(&delta);
        r.sub(&delta);
        assert_eq!(r, original);
    }

    #[test]
    fn sub_below_zero_is_a_no_op() {
        let mut r = Resource::new(1000.0, 512.0);
        let too_much = Resource::new(2000.0, 0.0);
        r.sub(&too_much);

        assert_eq!(r, Resource::new(1000.0, 512.0), "vector must be untouched");
    }

    #[test]
    fn sub_below_zero_on_scalar_is_a_no_op() {
        let mut r = Resource::new(4000.0, 1024.0).with_scalar("gpu", 1.0);
        let too_much = Resource::new(0.0, 0.0).with_scalar("gpu", 2.0);
        r.sub(&too_much);

        assert_eq!(r.scalars["gpu"], 1.0);
        assert_eq!(r.milli_cpu, 4000.0);
    }

    #[test]
    fn less_equal_is_componentwise() {
        let small = Resource::new(1000.0, 256.0);
        let big = Resource::new(2000.0, 512.0);
        assert!(small.less_equal(&big));
        assert!(!big.less_equal(&small));

        // Equal vectors satisfy ≤ in both directions
        assert!(small.less_equal(&small));
    }

    #[test]
    fn less_equal_fails_when_one_dimension_exceeds() {
        let a = Resource::new(1000.0, 2048.0); // memory exceeds
        let b = Resource::new(2000.0, 1024.0);
        assert!(!a.less_equal(&b));
    }

    #[test]
    fn less_equal_treats_missing_scalar_as_zero() {
        let with_gpu = Resource::new(100.0, 0.0).with_scalar("gpu", 1.0);
        let without_gpu = Resource::new(1000.0, 0.0);

        assert!(!with_gpu.less_equal(&without_gpu), "gpu demand cannot fit");
        assert!(
            without_gpu.clone().sub(&Resource::new(500.0, 0.0)).less_equal(&without_gpu),
            "absent scalars on both sides are fine"
        );
    }

    #[test]
    fn zero_valued_scalar_entry_is_still_empty() {
        let r = Resource::empty().with_scalar("gpu", 0.0);
        assert!(r.is_empty());
    }
}

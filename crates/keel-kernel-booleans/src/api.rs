//! Public API types and entry point for boolean operations.

use std::time::{Duration, Instant};

use keel_kernel_primitives::BRepSolid;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::bbox;
use crate::pipeline::{brep_boolean, non_overlapping_boolean};

/// CSG boolean operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    /// Union: combine both solids.
    Union,
    /// Subtract: remove the tool (B) from the target (A).
    Subtract,
    /// Intersect: keep only the overlapping region.
    Intersect,
}

/// Options shared by every boolean path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BooleanOptions {
    /// Distance under which points are merged and faces count as touching.
    pub tolerance: f64,
    /// Try the external kernel first when one is loaded.
    pub use_external: bool,
    /// Time both paths on every hybrid call and log the verdict.
    pub benchmark: bool,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            use_external: true,
            benchmark: false,
        }
    }
}

/// Result of a boolean operation.
///
/// Degeneracies met along the way land in `errors` without failing the
/// operation; `success` is false only when no solid could be produced.
#[derive(Debug, Clone)]
pub struct BooleanOutcome {
    /// The resulting solid, if any.
    pub solid: Option<BRepSolid>,
    /// True when `solid` is present.
    pub success: bool,
    /// Non-fatal problems, or the fatal one when `success` is false.
    pub errors: Vec<String>,
    /// Face/face intersection segments found.
    pub intersection_count: usize,
    /// Wall-clock time spent.
    pub execution_time: Duration,
}

impl BooleanOutcome {
    /// A successful outcome.
    pub fn solved(solid: BRepSolid, errors: Vec<String>, intersection_count: usize) -> Self {
        Self {
            solid: Some(solid),
            success: true,
            errors,
            intersection_count,
            execution_time: Duration::ZERO,
        }
    }

    /// A failed outcome carrying the reason.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            solid: None,
            success: false,
            errors: vec![error.into()],
            intersection_count: 0,
            execution_time: Duration::ZERO,
        }
    }

    pub(crate) fn timed(mut self, started: Instant) -> Self {
        self.execution_time = started.elapsed();
        self
    }
}

/// Perform a CSG boolean operation on two B-rep solids with the native
/// engine. Neither input is modified.
///
/// Disjoint operands take a shortcut; overlapping ones go through the
/// split / classify / sew pipeline.
#[instrument(skip_all, fields(op = ?op))]
pub fn boolean_operation(
    a: &BRepSolid,
    b: &BRepSolid,
    op: BooleanOp,
    options: &BooleanOptions,
) -> BooleanOutcome {
    let started = Instant::now();
    let aabb_a = bbox::solid_aabb(a);
    let aabb_b = bbox::solid_aabb(b);

    let outcome = if aabb_a.is_empty() || aabb_b.is_empty() || !aabb_a.overlaps(&aabb_b) {
        debug!("operands are disjoint");
        non_overlapping_boolean(a, b, op, options)
    } else {
        brep_boolean(a, b, op, options)
    };
    let outcome = outcome.timed(started);
    if !outcome.errors.is_empty() {
        warn!(
            count = outcome.errors.len(),
            success = outcome.success,
            "boolean finished with degeneracies"
        );
    }
    debug!(
        intersections = outcome.intersection_count,
        elapsed_us = outcome.execution_time.as_micros() as u64,
        "boolean finished"
    );
    outcome
}

#![warn(missing_docs)]

//! Structural checks and topological invariants for keel shells and solids.
//!
//! Everything here reads the graph only, except [`orient_faces`], which
//! flips faces to make a shell's winding consistent.

mod genus;
mod manifold;
mod orient;
mod solid;

pub use genus::{calculate_genus, euler_characteristic, solid_genus, GenusError};
pub use manifold::validate_manifold;
pub use orient::orient_faces;
pub use solid::validate_solid;

use keel_kernel_topo::{EdgeId, HalfEdgeId, LoopId, ShellId, VertexId};
use thiserror::Error;

/// One structural defect found by a validation pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFinding {
    /// An edge bounds more than two faces.
    #[error("edge {edge:?} is shared by {faces} faces")]
    NonManifoldEdge {
        /// Offending edge.
        edge: EdgeId,
        /// Number of incident faces.
        faces: usize,
    },
    /// The faces around a vertex do not form a single fan.
    #[error("vertex {0:?} joins more than one fan of faces")]
    NonManifoldVertex(VertexId),
    /// A loop's chain is broken or does not close.
    #[error("loop {0:?} is not a closed chain")]
    OpenLoop(LoopId),
    /// A half-edge and its twin disagree on direction or on each other.
    #[error("half-edge {0:?} does not mirror its twin")]
    TwinMismatch(HalfEdgeId),
    /// A key points at an entity that no longer exists.
    #[error("dangling reference: {0}")]
    DanglingReference(String),
    /// A shell's faces do not form one edge-connected component.
    #[error("shell {shell:?} falls apart into {components} edge-connected components")]
    DisconnectedShell {
        /// Offending shell.
        shell: ShellId,
        /// Number of components found.
        components: usize,
    },
    /// A shell is typed inconsistently with its role in the solid.
    #[error("shell {0:?} has the wrong shell type for its role")]
    ShellType(ShellId),
    /// A void shell reaches outside the outer shell.
    #[error("void shell {0:?} is not inside the outer shell")]
    VoidOutside(ShellId),
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// True when no findings were recorded.
    pub is_valid: bool,
    /// Every defect found, in discovery order.
    pub errors: Vec<ValidationFinding>,
}

impl ValidationReport {
    /// Build a report from collected findings.
    pub fn from_findings(errors: Vec<ValidationFinding>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Number of findings.
    pub fn issue_count(&self) -> usize {
        self.errors.len()
    }

    /// True if any finding matches `pred`.
    pub fn has(&self, pred: impl Fn(&ValidationFinding) -> bool) -> bool {
        self.errors.iter().any(pred)
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid {
            return write!(f, "valid");
        }
        writeln!(f, "{} issue(s):", self.errors.len())?;
        for e in &self.errors {
            writeln!(f, "  - {e}")?;
        }
        Ok(())
    }
}

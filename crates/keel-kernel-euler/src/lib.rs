#![warn(missing_docs)]

//! Euler operators for the keel half-edge topology.
//!
//! Each operator changes the vertex / edge / face counts in a way that keeps
//! `V - E + F` (and so the genus) fixed, and each has a dual that undoes it:
//!
//! | Operator | Dual |
//! |---|---|
//! | [`split_edge`] | [`merge_edges`] |
//! | [`make_edge_vertex`] (MEV) | [`kill_edge_vertex`] (KEV) |
//! | [`make_edge_face`] (MEF) | [`kill_edge_face`] (KEF) |
//!
//! [`split_face`] is MEF that releases the original face and returns two
//! fresh ones.
//!
//! All preconditions are checked before the graph is touched: an `Err`
//! return means nothing changed.

mod edge;
mod face;
mod vertex;

pub use edge::{merge_edges, split_edge};
pub use face::{kill_edge_face, make_edge_face, split_face};
pub use vertex::{kill_edge_vertex, make_edge_vertex};

use keel_kernel_topo::TopoError;
use thiserror::Error;

/// Precondition failures of the Euler operators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EulerError {
    /// Split parameter outside the open interval (0, 1).
    #[error("split parameter {0} must lie strictly between 0 and 1")]
    InvalidParameter(f64),
    /// The edges cannot be merged into one.
    #[error("edges cannot be merged: {0}")]
    NotMergeable(String),
    /// The face cannot be split between the given vertices.
    #[error("face cannot be split: {0}")]
    NotSplittable(String),
    /// The edge (and vertex or face) cannot be removed.
    #[error("cannot kill: {0}")]
    NotKillable(String),
    /// The vertex is not visited by the given loop.
    #[error("vertex is not on the given loop")]
    VertexNotOnLoop,
    /// A key was stale or construction failed underneath.
    #[error(transparent)]
    Topo(#[from] TopoError),
}

/// Result alias for Euler operators.
pub type Result<T> = std::result::Result<T, EulerError>;

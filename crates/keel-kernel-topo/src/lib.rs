#![warn(missing_docs)]

//! Half-edge topology graph for the keel B-rep kernel.
//!
//! Every entity lives in a [`slotmap`] arena owned by a [`Topology`] and
//! refers to its neighbours through typed keys. Geometry is referenced by id
//! into a separate [`keel_kernel_geom::GeometryStore`], so one carrier can be
//! shared by several edges or faces.
//!
//! Hierarchy: Solid → Shell → Face → Loop → HalfEdge → Vertex.
//! Each [`Edge`] owns a pair of twin half-edges running in opposite
//! directions.
//!
//! Constructors on [`Topology`] do not validate the shape they build; use
//! `keel-kernel-validate` for that. They only reject stale keys.

mod topology;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use keel_kernel_geom::{CurveId, SurfaceId};
use keel_kernel_math::Point3;
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

pub use topology::LoopIter;

new_key_type! {
    /// Key of a [`Vertex`].
    pub struct VertexId;
    /// Key of a [`HalfEdge`].
    pub struct HalfEdgeId;
    /// Key of an [`Edge`].
    pub struct EdgeId;
    /// Key of a [`Loop`].
    pub struct LoopId;
    /// Key of a [`Face`].
    pub struct FaceId;
    /// Key of a [`Shell`].
    pub struct ShellId;
    /// Key of a [`Solid`].
    pub struct SolidId;
}

/// Stable identifier drawn from a [`Session`] counter.
///
/// Arena keys are reused after removal; entity ids never are within one
/// session, which makes them suitable for logs and external references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Modeling session: owns the id counter for every topology built in it.
///
/// Cloning the handle shares the counter. Independent sessions never share
/// a counter, so ids from two sessions may coincide.
#[derive(Debug, Clone, Default)]
pub struct Session {
    next_id: Arc<AtomicU64>,
}

impl Session {
    /// Start a fresh session whose first id is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> EntityId {
        EntityId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// True if both handles share one counter.
    pub fn same_session(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.next_id, &other.next_id)
    }
}

/// Errors from topology construction and lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopoError {
    /// Vertex key is not in the arena.
    #[error("unknown vertex {0:?}")]
    MissingVertex(VertexId),
    /// Half-edge key is not in the arena.
    #[error("unknown half-edge {0:?}")]
    MissingHalfEdge(HalfEdgeId),
    /// Edge key is not in the arena.
    #[error("unknown edge {0:?}")]
    MissingEdge(EdgeId),
    /// Loop key is not in the arena.
    #[error("unknown loop {0:?}")]
    MissingLoop(LoopId),
    /// Face key is not in the arena.
    #[error("unknown face {0:?}")]
    MissingFace(FaceId),
    /// Shell key is not in the arena.
    #[error("unknown shell {0:?}")]
    MissingShell(ShellId),
    /// Solid key is not in the arena.
    #[error("unknown solid {0:?}")]
    MissingSolid(SolidId),
    /// Both half-edges of the edge already bound a loop.
    #[error("both half-edges of edge {0:?} are already in use")]
    HalfEdgeInUse(EdgeId),
    /// The same directed side appears twice in one vertex cycle.
    #[error("side {0:?} -> {1:?} appears twice in one face")]
    DuplicateSide(VertexId, VertexId),
    /// Consecutive vertices of a face cycle coincide.
    #[error("degenerate side at vertex {0:?}")]
    DegenerateSide(VertexId),
    /// A loop needs at least one half-edge; a face needs three vertices.
    #[error("need at least {needed} elements, got {actual}")]
    TooFew {
        /// Minimum count.
        needed: usize,
        /// Supplied count.
        actual: usize,
    },
    /// The shell is a solid's outer shell and cannot be removed on its own.
    #[error("shell {0:?} is the outer shell of its solid")]
    OuterShell(ShellId),
}

/// Result alias for topology operations.
pub type Result<T> = std::result::Result<T, TopoError>;

/// A topological vertex: a point in 3D space.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Session-unique id.
    pub id: EntityId,
    /// 3D position.
    pub point: Point3,
    /// Incident edges (back-references; the degree is their count).
    pub edges: Vec<EdgeId>,
}

/// One directed side of an edge.
#[derive(Debug, Clone)]
pub struct HalfEdge {
    /// Start vertex.
    pub origin: VertexId,
    /// Opposite half-edge of the same edge.
    pub twin: HalfEdgeId,
    /// Parent edge.
    pub edge: EdgeId,
    /// Loop this half-edge bounds, if any.
    pub loop_id: Option<LoopId>,
    /// Next half-edge in the loop.
    pub next: Option<HalfEdgeId>,
    /// Previous half-edge in the loop.
    pub prev: Option<HalfEdgeId>,
}

/// Reference from an edge to a shared curve carrier.
///
/// The edge runs from `t_start` (at `Edge::vertices.0`) to `t_end` (at
/// `Edge::vertices.1`); `t_start > t_end` means the curve is used backwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCurve {
    /// Carrier in the geometry store.
    pub curve: CurveId,
    /// Parameter at the start vertex.
    pub t_start: f64,
    /// Parameter at the end vertex.
    pub t_end: f64,
}

impl EdgeCurve {
    /// Curve parameter for a normalized position `s ∈ [0, 1]` along the edge.
    pub fn parameter_at(&self, s: f64) -> f64 {
        self.t_start + (self.t_end - self.t_start) * s
    }
}

/// An undirected edge: the pair of twin half-edges plus its carrier.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Session-unique id.
    pub id: EntityId,
    /// The owned half-edge pair; `.0` starts at `vertices.0`.
    pub half_edges: (HalfEdgeId, HalfEdgeId),
    /// End vertices in carrier direction.
    pub vertices: (VertexId, VertexId),
    /// Optional curve carrier. `None` means the straight chord.
    pub curve: Option<EdgeCurve>,
    /// Incident faces. Two for a closed manifold shell.
    pub faces: Vec<FaceId>,
}

/// A closed cycle of half-edges bounding a face region.
#[derive(Debug, Clone)]
pub struct Loop {
    /// Session-unique id.
    pub id: EntityId,
    /// Any half-edge of the cycle; traversal starts here.
    pub half_edge: HalfEdgeId,
    /// Owning face.
    pub face: Option<FaceId>,
}

/// Orientation of a face relative to its surface normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Outward normal agrees with the surface normal.
    #[default]
    Forward,
    /// Outward normal is opposite the surface normal.
    Reversed,
}

impl Orientation {
    /// The other orientation.
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Reversed,
            Orientation::Reversed => Orientation::Forward,
        }
    }
}

/// A trimmed region of one surface carrier.
#[derive(Debug, Clone)]
pub struct Face {
    /// Session-unique id.
    pub id: EntityId,
    /// Outer boundary.
    pub outer_loop: LoopId,
    /// Holes.
    pub inner_loops: Vec<LoopId>,
    /// Surface carrier, if bound.
    pub surface: Option<SurfaceId>,
    /// Orientation relative to the surface normal.
    pub orientation: Orientation,
    /// Owning shell.
    pub shell: Option<ShellId>,
}

/// Kind of shell within a solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    /// Outer boundary of the solid.
    Outer,
    /// Boundary of a void.
    Inner,
}

/// A set of edge-connected faces.
#[derive(Debug, Clone)]
pub struct Shell {
    /// Session-unique id.
    pub id: EntityId,
    /// Faces of this shell.
    pub faces: Vec<FaceId>,
    /// Outer or void shell.
    pub shell_type: ShellType,
    /// Owning solid.
    pub solid: Option<SolidId>,
}

/// A solid: one outer shell plus void shells.
#[derive(Debug, Clone)]
pub struct Solid {
    /// Session-unique id.
    pub id: EntityId,
    /// Outer boundary shell.
    pub outer_shell: ShellId,
    /// Void shells.
    pub inner_shells: Vec<ShellId>,
}

/// Arena-backed B-rep topology.
#[derive(Debug, Clone)]
pub struct Topology {
    session: Session,
    /// Vertex arena.
    pub vertices: SlotMap<VertexId, Vertex>,
    /// Half-edge arena.
    pub half_edges: SlotMap<HalfEdgeId, HalfEdge>,
    /// Edge arena.
    pub edges: SlotMap<EdgeId, Edge>,
    /// Loop arena.
    pub loops: SlotMap<LoopId, Loop>,
    /// Face arena.
    pub faces: SlotMap<FaceId, Face>,
    /// Shell arena.
    pub shells: SlotMap<ShellId, Shell>,
    /// Solid arena.
    pub solids: SlotMap<SolidId, Solid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_sequential() {
        let session = Session::new();
        assert_eq!(session.next_id(), EntityId(1));
        assert_eq!(session.next_id(), EntityId(2));
    }

    #[test]
    fn test_cloned_session_shares_counter() {
        let a = Session::new();
        let b = a.clone();
        let first = a.next_id();
        let second = b.next_id();
        assert_ne!(first, second);
        assert!(a.same_session(&b));
    }

    #[test]
    fn test_independent_sessions_do_not_interact() {
        let a = Session::new();
        let b = Session::new();
        a.next_id();
        a.next_id();
        assert_eq!(b.next_id(), EntityId(1));
        assert!(!a.same_session(&b));
    }

    #[test]
    fn test_orientation_flip() {
        assert_eq!(Orientation::Forward.flipped(), Orientation::Reversed);
        assert_eq!(Orientation::Reversed.flipped(), Orientation::Forward);
    }
}

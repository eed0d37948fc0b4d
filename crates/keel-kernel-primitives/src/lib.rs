#![warn(missing_docs)]

//! B-rep primitive solid construction for the keel kernel.
//!
//! Every builder produces a closed, outward-oriented solid with planar
//! face carriers and line edge carriers: boxes, tetrahedra, and arbitrary
//! polyhedra given as a vertex list plus face index cycles.

use keel_kernel_geom::{Curve, GeometryStore, Plane, Surface};
use keel_kernel_math::{newell_normal, Aabb3, Point3, Transform};
use keel_kernel_topo::{
    EdgeCurve, EdgeId, FaceId, Session, ShellType, SolidId, Topology, TopoError,
};
use keel_kernel_validate::{orient_faces, validate_manifold};
use thiserror::Error;
use tracing::debug;

/// Why a primitive could not be built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrimitiveError {
    /// A dimension was zero, negative or not finite.
    #[error("dimension {0} must be positive and finite")]
    NonPositiveDimension(f64),
    /// A face cycle referenced a point that does not exist.
    #[error("face {face} uses point index {index}, but only {len} points exist")]
    IndexOutOfRange {
        /// Face position in the input.
        face: usize,
        /// Offending index.
        index: usize,
        /// Number of points supplied.
        len: usize,
    },
    /// A face cycle has no area.
    #[error("face {0} is degenerate")]
    DegenerateFace(usize),
    /// The faces do not form a manifold shell.
    #[error("faces do not form a manifold shell: {0}")]
    NotManifold(String),
    /// Construction failed underneath.
    #[error(transparent)]
    Topo(#[from] TopoError),
}

/// Result of constructing a B-rep primitive: topology + geometry.
///
/// The arena belongs to this body alone. Every solid in it is one lump of
/// the body: primitives have exactly one, while a boolean can leave
/// several disjoint pieces. `solid_id` names the primary lump.
#[derive(Debug, Clone)]
pub struct BRepSolid {
    /// The topological structure.
    pub topology: Topology,
    /// The geometric data (surfaces, curves).
    pub geometry: GeometryStore,
    /// The primary solid entity.
    pub solid_id: SolidId,
}

impl BRepSolid {
    /// A solid with an empty outer shell (the result of an empty boolean).
    pub fn empty(session: &Session) -> Result<Self, PrimitiveError> {
        let mut topo = Topology::new(session);
        let shell = topo.add_shell(Vec::new(), ShellType::Outer)?;
        let solid_id = topo.add_solid(shell, Vec::new())?;
        Ok(Self {
            topology: topo,
            geometry: GeometryStore::new(),
            solid_id,
        })
    }

    /// The session the topology draws ids from.
    pub fn session(&self) -> &Session {
        self.topology.session()
    }

    /// Every lump of the body, the primary one first.
    pub fn lumps(&self) -> Vec<SolidId> {
        std::iter::once(self.solid_id)
            .chain(self.topology.solids.keys().filter(|s| *s != self.solid_id))
            .collect()
    }

    /// All faces of every lump, each lump's outer shell first.
    pub fn faces(&self) -> Vec<FaceId> {
        self.lumps()
            .into_iter()
            .filter_map(|s| self.topology.solid_faces(s).ok())
            .flatten()
            .collect()
    }

    /// True if the solid has no faces.
    pub fn is_empty(&self) -> bool {
        self.faces().is_empty()
    }

    /// Bounding box of the solid's vertices.
    pub fn bounding_box(&self) -> Aabb3 {
        let mut aabb = Aabb3::empty();
        let shells = self
            .lumps()
            .into_iter()
            .filter_map(|s| self.topology.solid_shells(s).ok())
            .flatten();
        for s in shells {
            for v in self.topology.shell_vertices(s) {
                if let Some(p) = self.topology.vertex_point(v) {
                    aabb.include_point(&p);
                }
            }
        }
        aabb
    }

    /// Enclosed volume, exact for planar faces.
    ///
    /// Sums signed tetrahedra from the origin over a fan of every loop, so
    /// holes and voids subtract through their winding.
    pub fn polyhedral_volume(&self) -> f64 {
        signed_volume(&self.topology, &self.faces())
    }

    /// A transformed copy with fresh entity ids from the same session.
    ///
    /// Mirroring transforms keep faces outward by reversing every loop.
    pub fn transformed(&self, t: &Transform) -> Self {
        let mut copy = self.clone();
        copy.topology.reissue_ids();
        for v in copy.topology.vertices.values_mut() {
            v.point = t.apply_point(&v.point);
        }
        copy.geometry.transform_all(t);
        if t.is_mirroring() {
            for s in copy.geometry.surfaces.values_mut() {
                if matches!(s, Surface::Nurbs(_)) {
                    *s = s.reversed();
                }
            }
            for f in copy.faces() {
                if copy.topology.flip_face(f).is_ok() {
                    let face = &mut copy.topology.faces[f];
                    face.orientation = face.orientation.flipped();
                }
            }
        }
        copy
    }

    /// A translated copy.
    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Self {
        self.transformed(&Transform::translation(dx, dy, dz))
    }
}

/// Signed volume bounded by `faces`, summed as a fan over every loop.
///
/// Positive for an outward-wound closed skin, negative for an inward-wound
/// one such as the wall of a cavity.
pub fn signed_volume(topo: &Topology, faces: &[FaceId]) -> f64 {
    let mut six_v = 0.0;
    for &f in faces {
        for l in topo.face_loops(f) {
            let pts = topo.loop_points(l);
            for i in 1..pts.len().saturating_sub(1) {
                six_v += pts[0].coords.dot(&pts[i].coords.cross(&pts[i + 1].coords));
            }
        }
    }
    six_v / 6.0
}

fn check_dimension(d: f64) -> Result<(), PrimitiveError> {
    if d.is_finite() && d > 0.0 {
        Ok(())
    } else {
        Err(PrimitiveError::NonPositiveDimension(d))
    }
}

/// Build a polyhedron from points and face index cycles.
///
/// Each cycle becomes a planar face; shared sides become shared edges
/// with line carriers. Inconsistent windings are repaired and the result
/// is turned outward, so cycles may be given in either direction as long
/// as they close into a manifold shell.
pub fn make_polyhedron(
    session: &Session,
    points: &[Point3],
    faces: &[Vec<usize>],
) -> Result<BRepSolid, PrimitiveError> {
    for (fi, cycle) in faces.iter().enumerate() {
        if let Some(&index) = cycle.iter().find(|&&i| i >= points.len()) {
            return Err(PrimitiveError::IndexOutOfRange {
                face: fi,
                index,
                len: points.len(),
            });
        }
        let pts: Vec<Point3> = cycle.iter().map(|&i| points[i]).collect();
        if newell_normal(&pts).norm() < 1e-12 {
            return Err(PrimitiveError::DegenerateFace(fi));
        }
    }

    let mut topo = Topology::new(session);
    let mut geom = GeometryStore::new();
    let verts: Vec<_> = points.iter().map(|p| topo.add_vertex(*p)).collect();

    let mut face_ids = Vec::with_capacity(faces.len());
    for cycle in faces {
        let pts: Vec<Point3> = cycle.iter().map(|&i| points[i]).collect();
        let plane = Plane::from_normal(pts[0], newell_normal(&pts));
        let surface = geom.add_surface(Surface::Plane(plane));
        let vs: Vec<_> = cycle.iter().map(|&i| verts[i]).collect();
        face_ids.push(topo.add_face_from_vertices(&vs, Some(surface))?);
    }

    let edges: Vec<EdgeId> = topo.edges.keys().collect();
    for e in edges {
        let (a, b) = topo.edges[e].vertices;
        let (pa, pb) = (topo.vertices[a].point, topo.vertices[b].point);
        let curve = geom.add_curve(Curve::line(pa, pb));
        topo.set_edge_curve(
            e,
            Some(EdgeCurve {
                curve,
                t_start: 0.0,
                t_end: 1.0,
            }),
        )?;
    }

    let shell = topo.add_shell(face_ids.clone(), ShellType::Outer)?;
    let flipped = orient_faces(&mut topo, shell);
    if signed_volume(&topo, &face_ids) < 0.0 {
        for &f in &face_ids {
            topo.flip_face(f)?;
        }
    }
    let report = validate_manifold(&topo, shell);
    if !report.is_valid {
        return Err(PrimitiveError::NotManifold(report.to_string()));
    }
    let solid_id = topo.add_solid(shell, Vec::new())?;

    debug!(
        vertices = topo.vertices.len(),
        faces = face_ids.len(),
        flipped,
        "polyhedron built"
    );
    Ok(BRepSolid {
        topology: topo,
        geometry: geom,
        solid_id,
    })
}

/// Build a box with corner at the origin and dimensions `(sx, sy, sz)`.
///
/// The box has 6 planar faces, 12 edges, and 8 vertices.
/// Vertex layout:
/// ```text
///     v7----v6
///    /|    /|
///   v4----v5|    z
///   | v3--|-v2   | y
///   |/    |/     |/
///   v0----v1     +---x
/// ```
pub fn make_cube(session: &Session, sx: f64, sy: f64, sz: f64) -> Result<BRepSolid, PrimitiveError> {
    for d in [sx, sy, sz] {
        check_dimension(d)?;
    }
    let points = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(sx, 0.0, 0.0),
        Point3::new(sx, sy, 0.0),
        Point3::new(0.0, sy, 0.0),
        Point3::new(0.0, 0.0, sz),
        Point3::new(sx, 0.0, sz),
        Point3::new(sx, sy, sz),
        Point3::new(0.0, sy, sz),
    ];
    // counter-clockwise seen from outside
    let faces = vec![
        vec![0, 3, 2, 1],
        vec![4, 5, 6, 7],
        vec![0, 1, 5, 4],
        vec![2, 3, 7, 6],
        vec![0, 4, 7, 3],
        vec![1, 2, 6, 5],
    ];
    make_polyhedron(session, &points, &faces)
}

/// Build the corner tetrahedron with legs of length `size` along the axes.
pub fn make_tetrahedron(session: &Session, size: f64) -> Result<BRepSolid, PrimitiveError> {
    check_dimension(size)?;
    let points = [
        Point3::origin(),
        Point3::new(size, 0.0, 0.0),
        Point3::new(0.0, size, 0.0),
        Point3::new(0.0, 0.0, size),
    ];
    let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3], vec![0, 3, 2]];
    make_polyhedron(session, &points, &faces)
}

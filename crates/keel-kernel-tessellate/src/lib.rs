#![warn(missing_docs)]

//! B-rep to triangle mesh tessellation for the keel kernel.
//!
//! Planar faces are triangulated from their boundary loops (curved edges
//! sampled, holes bridged into the outer loop, then ear-clipped). NURBS
//! faces are sampled on a UV grid over their full domain. Sampling density
//! for both comes from a linear (chord height) and an angular deflection.

use keel_kernel_geom::{Curve, GeometryStore, Surface};
use keel_kernel_math::{newell_normal, Point2, Point3, Vec3};
use keel_kernel_primitives::BRepSolid;
use keel_kernel_topo::{FaceId, LoopId, Orientation, Topology};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound on segments per curve or grid direction.
const MAX_SEGMENTS: usize = 512;
/// Samples used to estimate the length and turning of a curve.
const PROBE_SAMPLES: usize = 16;

/// Output triangle mesh for rendering and export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32).
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]` (u32).
    pub indices: Vec<u32>,
    /// Flat array of vertex normals: `[nx0, ny0, nz0, ...]` (f32). Same
    /// length as `vertices`, or empty when normals were not requested.
    pub normals: Vec<f32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|&i| i + offset));
    }

    fn push_vertex(&mut self, p: &Point3) {
        self.vertices
            .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
    }

    fn push_normal(&mut self, n: &Vec3) {
        self.normals
            .extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
    }

    fn vertex(&self, i: u32) -> Vec3 {
        let i = i as usize * 3;
        Vec3::new(
            self.vertices[i] as f64,
            self.vertices[i + 1] as f64,
            self.vertices[i + 2] as f64,
        )
    }

    fn triangles(&self) -> impl Iterator<Item = (Vec3, Vec3, Vec3)> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| (self.vertex(t[0]), self.vertex(t[1]), self.vertex(t[2])))
    }

    /// Signed enclosed volume (divergence theorem). Positive for a closed,
    /// outward-wound mesh.
    pub fn volume(&self) -> f64 {
        self.triangles()
            .map(|(a, b, c)| a.dot(&b.cross(&c)))
            .sum::<f64>()
            / 6.0
    }

    /// Total triangle area.
    pub fn surface_area(&self) -> f64 {
        self.triangles()
            .map(|(a, b, c)| (b - a).cross(&(c - a)).norm())
            .sum::<f64>()
            / 2.0
    }
}

/// Tessellation parameters controlling mesh quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationParams {
    /// Maximum distance between a curve or surface and its chords.
    pub linear_deflection: f64,
    /// Maximum turning angle (radians) across one segment.
    pub angular_deflection: f64,
    /// Emit per-vertex normals.
    pub compute_normals: bool,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            linear_deflection: 0.01,
            angular_deflection: 0.5,
            compute_normals: true,
        }
    }
}

impl TessellationParams {
    /// Segments needed for a stretch of `length` that turns by `turning`
    /// radians in total.
    pub fn segments(&self, length: f64, turning: f64) -> usize {
        if turning <= 1e-9 || length <= 0.0 {
            return 1;
        }
        let max_angle = if self.angular_deflection > 0.0 {
            self.angular_deflection
        } else {
            Self::default().angular_deflection
        };
        let mut step = max_angle;
        let radius = length / turning;
        if self.linear_deflection > 0.0 && self.linear_deflection < radius {
            // chord height of an arc of angle a is r (1 - cos(a / 2))
            step = step.min(2.0 * (1.0 - self.linear_deflection / radius).acos());
        }
        ((turning / step).ceil() as usize).clamp(1, MAX_SEGMENTS)
    }
}

/// Length and total turning of `f` over `[t0, t1]`, from a coarse probe.
fn probe(f: impl Fn(f64) -> Point3, t0: f64, t1: f64) -> (f64, f64) {
    let pts: Vec<Point3> = (0..=PROBE_SAMPLES)
        .map(|i| f(t0 + (t1 - t0) * i as f64 / PROBE_SAMPLES as f64))
        .collect();
    let chords: Vec<Vec3> = pts.windows(2).map(|w| w[1] - w[0]).collect();
    let length = chords.iter().map(|c| c.norm()).sum();
    let turning = chords
        .windows(2)
        .filter(|w| w[0].norm() > 1e-14 && w[1].norm() > 1e-14)
        .map(|w| w[0].angle(&w[1]))
        .sum();
    (length, turning)
}

/// Boundary polyline of a loop: vertex positions plus interior samples of
/// curved edges, in loop order.
fn loop_polyline(
    topo: &Topology,
    geom: &GeometryStore,
    l: LoopId,
    params: &TessellationParams,
) -> Vec<Point3> {
    let mut out = Vec::new();
    for h in topo.loop_half_edges(l) {
        let Some(he) = topo.half_edges.get(h) else {
            continue;
        };
        let Some(start) = topo.vertex_point(he.origin) else {
            continue;
        };
        out.push(start);

        let Some(edge) = topo.edges.get(he.edge) else {
            continue;
        };
        let Some(ec) = edge.curve else {
            continue;
        };
        let Some(curve @ Curve::Nurbs(_)) = geom.curve(ec.curve) else {
            continue;
        };
        let forward = he.origin == edge.vertices.0;
        let at = |s: f64| curve.evaluate(ec.parameter_at(if forward { s } else { 1.0 - s }));
        let (length, turning) = probe(&at, 0.0, 1.0);
        let n = params.segments(length, turning);
        out.extend((1..n).map(|i| at(i as f64 / n as f64)));
    }
    out
}

/// Tessellate an entire B-rep solid (outer and void shells) into a
/// triangle mesh.
pub fn tessellate_solid(brep: &BRepSolid, params: &TessellationParams) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    for face_id in brep.faces() {
        let face_mesh = tessellate_face(&brep.topology, &brep.geometry, face_id, params);
        mesh.merge(&face_mesh);
    }
    debug!(
        triangles = mesh.num_triangles(),
        vertices = mesh.num_vertices(),
        "solid tessellated"
    );
    mesh
}

/// Tessellate a single B-rep face.
///
/// Planar faces (and faces without a carrier) follow their loops, whose
/// winding already encodes the face side. NURBS faces are sampled over the
/// whole surface domain and flipped when the face is `Reversed`.
pub fn tessellate_face(
    topo: &Topology,
    geom: &GeometryStore,
    face_id: FaceId,
    params: &TessellationParams,
) -> TriangleMesh {
    let Some(face) = topo.faces.get(face_id) else {
        return TriangleMesh::new();
    };
    match face.surface.and_then(|s| geom.surface(s)) {
        Some(surface @ Surface::Nurbs(_)) => tessellate_surface_grid(
            surface,
            face.orientation == Orientation::Reversed,
            params,
        ),
        _ => {
            let outer = loop_polyline(topo, geom, face.outer_loop, params);
            let holes: Vec<Vec<Point3>> = face
                .inner_loops
                .iter()
                .map(|&l| loop_polyline(topo, geom, l, params))
                .filter(|h| h.len() >= 3)
                .collect();
            tessellate_planar_polygon(&outer, &holes, params)
        }
    }
}

/// Triangulate a planar polygon with holes. Triangles wind like `outer`.
fn tessellate_planar_polygon(
    outer: &[Point3],
    holes: &[Vec<Point3>],
    params: &TessellationParams,
) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    if outer.len() < 3 {
        return mesh;
    }
    let normal = newell_normal(outer);
    if normal.norm() < 1e-14 {
        return mesh;
    }
    let n = normal.normalize();
    let helper = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    let u_axis = helper.cross(&n).normalize();
    let v_axis = n.cross(&u_axis);
    let origin = outer[0];

    let mut points: Vec<Point3> = outer.to_vec();
    let mut rings: Vec<Vec<usize>> = Vec::with_capacity(holes.len());
    for hole in holes {
        let start = points.len();
        points.extend_from_slice(hole);
        rings.push((start..points.len()).collect());
    }
    let flat: Vec<Point2> = points
        .iter()
        .map(|p| {
            let d = p - origin;
            Point2::new(d.dot(&u_axis), d.dot(&v_axis))
        })
        .collect();

    let mut polygon: Vec<usize> = (0..outer.len()).collect();
    for ring in &mut rings {
        // holes run clockwise in the outer loop's frame
        if signed_area(&flat, ring) > 0.0 {
            ring.reverse();
        }
    }
    rings.sort_by(|a, b| max_x(&flat, b).total_cmp(&max_x(&flat, a)));
    for i in 0..rings.len() {
        polygon = bridge_hole(&flat, polygon, &rings[i], &rings[i + 1..]);
    }

    for p in &points {
        mesh.push_vertex(p);
        if params.compute_normals {
            mesh.push_normal(&n);
        }
    }
    for [a, b, c] in ear_clip(&flat, polygon) {
        mesh.indices.extend_from_slice(&[a as u32, b as u32, c as u32]);
    }
    mesh
}

fn signed_area(pts: &[Point2], ring: &[usize]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (pts[ring[i]], pts[ring[(i + 1) % n]]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

fn max_x(pts: &[Point2], ring: &[usize]) -> f64 {
    ring.iter().map(|&i| pts[i].x).fold(f64::MIN, f64::max)
}

fn cross2(o: Point2, a: Point2, b: Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// True if the open segments `p1 p2` and `q1 q2` cross.
fn segments_cross(p1: Point2, p2: Point2, q1: Point2, q2: Point2) -> bool {
    let eps = 1e-12;
    let d1 = cross2(q1, q2, p1);
    let d2 = cross2(q1, q2, p2);
    let d3 = cross2(p1, p2, q1);
    let d4 = cross2(p1, p2, q2);
    ((d1 > eps && d2 < -eps) || (d1 < -eps && d2 > eps))
        && ((d3 > eps && d4 < -eps) || (d3 < -eps && d4 > eps))
}

/// Splice `ring` into `polygon` through the shortest bridge that crosses
/// neither the polygon nor any of the `pending` holes.
fn bridge_hole(
    pts: &[Point2],
    polygon: Vec<usize>,
    ring: &[usize],
    pending: &[Vec<usize>],
) -> Vec<usize> {
    let Some(hi) = (0..ring.len()).max_by(|&a, &b| pts[ring[a]].x.total_cmp(&pts[ring[b]].x))
    else {
        return polygon;
    };
    let h = pts[ring[hi]];

    let edges = |poly: &[usize]| -> Vec<(usize, usize)> {
        (0..poly.len())
            .map(|i| (poly[i], poly[(i + 1) % poly.len()]))
            .collect()
    };
    let mut blockers = edges(&polygon);
    blockers.extend(edges(ring));
    for other in pending {
        blockers.extend(edges(other));
    }

    let mut order: Vec<usize> = (0..polygon.len()).collect();
    order.sort_by(|&a, &b| {
        (pts[polygon[a]] - h)
            .norm_squared()
            .total_cmp(&(pts[polygon[b]] - h).norm_squared())
    });
    let visible = order.iter().copied().find(|&j| {
        let p = pts[polygon[j]];
        blockers.iter().all(|&(a, b)| {
            let touches = [a, b].iter().any(|&k| {
                (pts[k] - p).norm_squared() < 1e-24 || (pts[k] - h).norm_squared() < 1e-24
            });
            touches || !segments_cross(h, p, pts[a], pts[b])
        })
    });
    let j = visible.unwrap_or(order[0]);

    let mut merged = Vec::with_capacity(polygon.len() + ring.len() + 2);
    merged.extend_from_slice(&polygon[..=j]);
    merged.extend((0..ring.len()).map(|k| ring[(hi + k) % ring.len()]));
    merged.push(ring[hi]);
    merged.push(polygon[j]);
    merged.extend_from_slice(&polygon[j + 1..]);
    merged
}

fn strictly_inside(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    let eps = 1e-12;
    cross2(a, b, p) > eps && cross2(b, c, p) > eps && cross2(c, a, p) > eps
}

/// Ear-clip a counter-clockwise polygon of indices into `pts`.
fn ear_clip(pts: &[Point2], mut remaining: Vec<usize>) -> Vec<[usize; 3]> {
    let mut out = Vec::with_capacity(remaining.len().saturating_sub(2));
    while remaining.len() > 3 {
        let n = remaining.len();
        let ear = (0..n).find(|&i| {
            let (ia, ib, ic) = (remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]);
            let (a, b, c) = (pts[ia], pts[ib], pts[ic]);
            if cross2(a, b, c) <= 1e-14 {
                return false;
            }
            remaining.iter().all(|&k| {
                let p = pts[k];
                // bridge duplicates share a corner position
                let corner = [a, b, c].iter().any(|q| (*q - p).norm_squared() < 1e-24);
                corner || !strictly_inside(p, a, b, c)
            })
        });
        // no ear on a degenerate remainder: clip the first corner anyway
        let i = ear.unwrap_or(0);
        let prev = remaining[(i + n - 1) % n];
        let next = remaining[(i + 1) % n];
        if ear.is_some() || cross2(pts[prev], pts[remaining[i]], pts[next]).abs() > 1e-14 {
            out.push([prev, remaining[i], next]);
        }
        remaining.remove(i);
    }
    if remaining.len() == 3 && cross2(pts[remaining[0]], pts[remaining[1]], pts[remaining[2]]) > 1e-14 {
        out.push([remaining[0], remaining[1], remaining[2]]);
    }
    out
}

/// Sample a surface on a regular UV grid over its domain.
fn tessellate_surface_grid(
    surface: &Surface,
    reversed: bool,
    params: &TessellationParams,
) -> TriangleMesh {
    let ((u0, u1), (v0, v1)) = surface.domain();
    let n_u = [v0, 0.5 * (v0 + v1), v1]
        .iter()
        .map(|&v| {
            let (len, turn) = probe(|u| surface.evaluate(Point2::new(u, v)), u0, u1);
            params.segments(len, turn)
        })
        .max()
        .unwrap_or(1);
    let n_v = [u0, 0.5 * (u0 + u1), u1]
        .iter()
        .map(|&u| {
            let (len, turn) = probe(|v| surface.evaluate(Point2::new(u, v)), v0, v1);
            params.segments(len, turn)
        })
        .max()
        .unwrap_or(1);

    let mut mesh = TriangleMesh::new();
    for j in 0..=n_v {
        let v = v0 + (v1 - v0) * (j as f64 / n_v as f64);
        for i in 0..=n_u {
            let u = u0 + (u1 - u0) * (i as f64 / n_u as f64);
            let uv = Point2::new(u, v);
            mesh.push_vertex(&surface.evaluate(uv));
            if params.compute_normals {
                let n = surface.normal(uv).map_or_else(Vec3::zeros, |d| d.into_inner());
                mesh.push_normal(&if reversed { -n } else { n });
            }
        }
    }

    let stride = (n_u + 1) as u32;
    for j in 0..n_v as u32 {
        for i in 0..n_u as u32 {
            let bl = j * stride + i;
            let br = bl + 1;
            let tl = bl + stride;
            let tr = tl + 1;
            if reversed {
                mesh.indices.extend_from_slice(&[bl, tl, br, br, tl, tr]);
            } else {
                mesh.indices.extend_from_slice(&[bl, br, tl, br, tr, tl]);
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use keel_kernel_geom::Plane;
    use keel_kernel_math::Transform;
    use keel_kernel_nurbs::{NurbsCurve, NurbsSurface};
    use keel_kernel_primitives::{make_cube, make_polyhedron};
    use keel_kernel_topo::{EdgeCurve, Session};

    #[test]
    fn test_cube_mesh_measures() {
        let brep = make_cube(&Session::new(), 10.0, 10.0, 10.0).unwrap();
        let mesh = tessellate_solid(&brep, &TessellationParams::default());
        assert_eq!(mesh.num_triangles(), 12);
        assert_eq!(mesh.normals.len(), mesh.vertices.len());
        assert_relative_eq!(mesh.volume(), 1000.0, epsilon = 1e-3);
        assert_relative_eq!(mesh.surface_area(), 600.0, epsilon = 1e-3);
    }

    #[test]
    fn test_normals_are_optional() {
        let brep = make_cube(&Session::new(), 1.0, 1.0, 1.0).unwrap();
        let params = TessellationParams {
            compute_normals: false,
            ..Default::default()
        };
        let mesh = tessellate_solid(&brep, &params);
        assert!(mesh.normals.is_empty());
        assert_eq!(mesh.num_triangles(), 12);
    }

    #[test]
    fn test_mirrored_cube_volume_stays_positive() {
        let brep = make_cube(&Session::new(), 1.0, 2.0, 3.0)
            .unwrap()
            .transformed(&Transform::scale(1.0, -1.0, 1.0));
        let mesh = tessellate_solid(&brep, &TessellationParams::default());
        assert_relative_eq!(mesh.volume(), 6.0, epsilon = 1e-4);
    }

    #[test]
    fn test_concave_l_prism() {
        // L-shaped cross-section, area 3, extruded by 1
        let base = [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)];
        let mut points: Vec<Point3> = base.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect();
        points.extend(base.iter().map(|&(x, y)| Point3::new(x, y, 1.0)));
        let n = base.len();
        let mut faces = vec![(0..n).rev().collect::<Vec<_>>(), (n..2 * n).collect()];
        for i in 0..n {
            let j = (i + 1) % n;
            faces.push(vec![i, j, n + j, n + i]);
        }
        let brep = make_polyhedron(&Session::new(), &points, &faces).unwrap();
        let mesh = tessellate_solid(&brep, &TessellationParams::default());
        assert_relative_eq!(mesh.volume(), 3.0, epsilon = 1e-4);
        assert_relative_eq!(mesh.surface_area(), 2.0 * 3.0 + 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_face_with_hole() {
        let mut topo = Topology::new(&Session::new());
        let mut geom = GeometryStore::new();
        let outer: Vec<_> = [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]
            .iter()
            .map(|&(x, y)| topo.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let surface = geom.add_surface(Surface::Plane(Plane::xy()));
        let f = topo.add_face_from_vertices(&outer, Some(surface)).unwrap();
        // clockwise square hole of area 1
        let inner: Vec<_> = [(1.0, 1.0), (1.0, 2.0), (2.0, 2.0), (2.0, 1.0)]
            .iter()
            .map(|&(x, y)| topo.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let hes: Vec<_> = (0..4)
            .map(|i| {
                let e = topo.add_edge(inner[i], inner[(i + 1) % 4]).unwrap();
                topo.edges[e].half_edges.0
            })
            .collect();
        let hole = topo.add_loop(&hes).unwrap();
        topo.faces[f].inner_loops.push(hole);
        topo.attach_loop(hole, f);

        let mesh = tessellate_face(&topo, &geom, f, &TessellationParams::default());
        assert_eq!(mesh.num_vertices(), 8);
        assert_relative_eq!(mesh.surface_area(), 15.0, epsilon = 1e-5);
        // every triangle faces +z
        for t in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (mesh.vertex(t[0]), mesh.vertex(t[1]), mesh.vertex(t[2]));
            assert!((b - a).cross(&(c - a)).z > 0.0);
        }
    }

    #[test]
    fn test_curved_edge_is_sampled() {
        let mut topo = Topology::new(&Session::new());
        let mut geom = GeometryStore::new();
        // half disk: diameter edge plus a semicircular arc
        let circle = geom.add_curve(Curve::Nurbs(NurbsCurve::circle(Point3::origin(), 1.0)));
        let (c0, c1) = geom.curve(circle).unwrap().domain();
        let a = topo.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let b = topo.add_vertex(Point3::new(-1.0, 0.0, 0.0));
        let arc = topo.add_edge(a, b).unwrap();
        topo.set_edge_curve(
            arc,
            Some(EdgeCurve {
                curve: circle,
                t_start: c0,
                t_end: c0 + 0.5 * (c1 - c0),
            }),
        )
        .unwrap();
        let chord = topo.add_edge(b, a).unwrap();
        let hes = [topo.edges[arc].half_edges.0, topo.edges[chord].half_edges.0];
        let l = topo.add_loop(&hes).unwrap();
        let f = topo.add_face(None, l, &[]).unwrap();

        let coarse = tessellate_face(
            &topo,
            &geom,
            f,
            &TessellationParams {
                linear_deflection: 0.1,
                ..Default::default()
            },
        );
        let fine = tessellate_face(
            &topo,
            &geom,
            f,
            &TessellationParams {
                linear_deflection: 1e-4,
                ..Default::default()
            },
        );
        assert!(fine.num_triangles() > coarse.num_triangles());
        let half_disk = std::f64::consts::PI / 2.0;
        assert_relative_eq!(fine.surface_area(), half_disk, epsilon = 1e-2);
        assert!(coarse.surface_area() < half_disk);
    }

    fn arch() -> NurbsSurface {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        NurbsSurface::new(
            points,
            None,
            3,
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            2,
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_flat_nurbs_patch() {
        let patch = Surface::Nurbs(NurbsSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ));
        let mesh = tessellate_surface_grid(&patch, false, &TessellationParams::default());
        assert_eq!(mesh.num_triangles(), 2);
        assert_relative_eq!(mesh.surface_area(), 1.0, epsilon = 1e-6);
        assert!(mesh.normals.chunks_exact(3).all(|n| n[2] > 0.99));

        let flipped = tessellate_surface_grid(&patch, true, &TessellationParams::default());
        assert!(flipped.normals.chunks_exact(3).all(|n| n[2] < -0.99));
        let (a, b, c) = flipped.triangles().next().unwrap();
        assert!((b - a).cross(&(c - a)).z < 0.0);
    }

    #[test]
    fn test_curved_nurbs_refines_with_deflection() {
        let surface = Surface::Nurbs(arch());
        let coarse = tessellate_surface_grid(
            &surface,
            false,
            &TessellationParams {
                linear_deflection: 0.1,
                ..Default::default()
            },
        );
        let fine = tessellate_surface_grid(
            &surface,
            false,
            &TessellationParams {
                linear_deflection: 1e-4,
                ..Default::default()
            },
        );
        assert!(fine.num_triangles() > coarse.num_triangles());
        // straight in v: a single strip
        assert_eq!(fine.num_vertices() % 2, 0);
        assert!(fine.surface_area() > 2.0);
    }

    #[test]
    fn test_segments_bounds() {
        let params = TessellationParams::default();
        assert_eq!(params.segments(10.0, 0.0), 1);
        assert!(params.segments(std::f64::consts::TAU, std::f64::consts::TAU) >= 13);
        assert_eq!(params.segments(1e9, 1e9), MAX_SEGMENTS);
    }
}

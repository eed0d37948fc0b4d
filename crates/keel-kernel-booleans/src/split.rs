//! Face fragments, planar face/face intersection, and splitting of convex
//! planar faces by the other solid's planes.
//!
//! Only planar faces are intersected and split. Curved faces, faces with
//! holes and non-convex faces travel through the pipeline whole and are
//! classified by a single sample point.

use keel_kernel_geom::Surface;
use keel_kernel_math::{newell_normal, Point2, Point3, Vec3};
use keel_kernel_primitives::BRepSolid;
use keel_kernel_topo::{FaceId, Orientation};

/// Oriented plane `normal · x = offset` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneEq {
    /// Unit normal.
    pub normal: Vec3,
    /// Signed distance of the plane from the origin along `normal`.
    pub offset: f64,
}

impl PlaneEq {
    /// Plane through `point` with the given (not necessarily unit) normal.
    pub fn new(point: &Point3, normal: &Vec3) -> Option<Self> {
        let n = normal.try_normalize(1e-14)?;
        Some(Self {
            normal: n,
            offset: n.dot(&point.coords),
        })
    }

    /// Signed distance from the plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }

    /// True if both planes hold the same points (either orientation).
    pub fn coincides(&self, other: &PlaneEq, tol: f64) -> bool {
        let d = self.normal.dot(&other.normal);
        if d > 1.0 - 1e-9 {
            (self.offset - other.offset).abs() < tol
        } else if d < -1.0 + 1e-9 {
            (self.offset + other.offset).abs() < tol
        } else {
            false
        }
    }

    /// Orthonormal `(u, v)` axes with `u × v = normal`.
    pub fn basis(&self) -> (Vec3, Vec3) {
        let n = self.normal;
        let helper = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
        let u = helper.cross(&n).normalize();
        (u, n.cross(&u))
    }
}

/// Piece of a face carried through classification and sewing.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Face the fragment was cut from.
    pub source: FaceId,
    /// Outer boundary, wound counter-clockwise about `normal`.
    pub outer: Vec<Point3>,
    /// Hole boundaries.
    pub holes: Vec<Vec<Point3>>,
    /// Unit outward normal.
    pub normal: Vec3,
    /// Interior point used for classification.
    pub sample: Point3,
    /// Carrier of a curved face. `None` for planar fragments, which get a
    /// fresh plane when sewn.
    pub surface: Option<Surface>,
    /// Orientation of a curved face relative to `surface`.
    pub orientation: Orientation,
}

impl Fragment {
    /// The whole face as one fragment. `None` for faces with no usable
    /// boundary.
    pub fn from_face(brep: &BRepSolid, face_id: FaceId) -> Option<Self> {
        let topo = &brep.topology;
        let face = topo.faces.get(face_id)?;
        let outer = topo.loop_points(face.outer_loop);
        let holes: Vec<Vec<Point3>> = face
            .inner_loops
            .iter()
            .map(|&l| topo.loop_points(l))
            .filter(|h| h.len() >= 3)
            .collect();

        if let Some(surface @ Surface::Nurbs(_)) =
            face.surface.and_then(|s| brep.geometry.surface(s))
        {
            let ((u0, u1), (v0, v1)) = surface.domain();
            let mid = Point2::new(0.5 * (u0 + u1), 0.5 * (v0 + v1));
            let n = surface.normal(mid)?.into_inner();
            let normal = match face.orientation {
                Orientation::Forward => n,
                Orientation::Reversed => -n,
            };
            return Some(Self {
                source: face_id,
                outer,
                holes,
                normal,
                sample: surface.evaluate(mid),
                surface: Some(surface.clone()),
                orientation: face.orientation,
            });
        }

        if outer.len() < 3 {
            return None;
        }
        let normal = newell_normal(&outer).try_normalize(1e-14)?;
        let sample = interior_point(&outer, &holes, &normal);
        Some(Self {
            source: face_id,
            outer,
            holes,
            normal,
            sample,
            surface: None,
            orientation: Orientation::Forward,
        })
    }

    /// A planar convex piece of `source`.
    fn piece(source: FaceId, outer: Vec<Point3>, normal: Vec3) -> Self {
        let sample = centroid(&outer);
        Self {
            source,
            outer,
            holes: Vec::new(),
            normal,
            sample,
            surface: None,
            orientation: Orientation::Forward,
        }
    }

    /// True for fragments of planar faces.
    pub fn is_planar(&self) -> bool {
        self.surface.is_none()
    }

    /// Supporting plane of a planar fragment.
    pub fn plane(&self) -> Option<PlaneEq> {
        if self.is_planar() {
            PlaneEq::new(&self.outer[0], &self.normal)
        } else {
            None
        }
    }

    /// True if the fragment can be cut by planes.
    pub fn is_splittable(&self, tol: f64) -> bool {
        self.is_planar() && self.holes.is_empty() && is_convex(&self.outer, &self.normal, tol)
    }

    /// The same fragment facing the other way.
    pub fn flipped(mut self) -> Self {
        self.outer.reverse();
        for h in &mut self.holes {
            h.reverse();
        }
        self.normal = -self.normal;
        self.orientation = self.orientation.flipped();
        self
    }

    /// Area of a planar fragment (outer minus holes).
    pub fn area(&self) -> f64 {
        let outer = newell_normal(&self.outer).dot(&self.normal);
        let holes: f64 = self
            .holes
            .iter()
            .map(|h| newell_normal(h).dot(&self.normal))
            .sum();
        0.5 * (outer + holes)
    }
}

fn centroid(points: &[Point3]) -> Point3 {
    let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len().max(1) as f64)
}

/// Project `points` into the plane basis.
fn project(points: &[Point3], u: &Vec3, v: &Vec3) -> Vec<Point2> {
    points
        .iter()
        .map(|p| Point2::new(p.coords.dot(u), p.coords.dot(v)))
        .collect()
}

/// Even-odd crossing test over a set of rings.
pub(crate) fn point_in_rings(p: &Point2, rings: &[Vec<Point2>]) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        let mut j = n.wrapping_sub(1);
        for i in 0..n {
            let (a, b) = (ring[i], ring[j]);
            if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}

/// Distance from `p` to the nearest side of any ring.
pub(crate) fn distance_to_rings(p: &Point2, rings: &[Vec<Point2>]) -> f64 {
    let mut best = f64::INFINITY;
    for ring in rings {
        for i in 0..ring.len() {
            let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
            let ab = b - a;
            let len2 = ab.norm_squared();
            let t = if len2 > 0.0 {
                ((p - a).dot(&ab) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            best = best.min((p - (a + t * ab)).norm());
        }
    }
    best
}

/// A point strictly inside a planar polygon with holes.
fn interior_point(outer: &[Point3], holes: &[Vec<Point3>], normal: &Vec3) -> Point3 {
    let center = centroid(outer);
    let Some(plane) = PlaneEq::new(&outer[0], normal) else {
        return center;
    };
    let (u, v) = plane.basis();
    let mut rings = vec![project(outer, &u, &v)];
    rings.extend(holes.iter().map(|h| project(h, &u, &v)));
    let inside = |p: &Point3| point_in_rings(&Point2::new(p.coords.dot(&u), p.coords.dot(&v)), &rings);

    if holes.is_empty() && is_convex(outer, normal, 0.0) {
        return center;
    }
    // deepest centroid of a fan triangle that lands inside
    (1..outer.len() - 1)
        .map(|i| centroid(&[outer[0], outer[i], outer[i + 1]]))
        .chain(std::iter::once(center))
        .filter(|c| inside(c))
        .max_by(|a, b| {
            let depth = |c: &Point3| {
                distance_to_rings(&Point2::new(c.coords.dot(&u), c.coords.dot(&v)), &rings)
            };
            depth(a).total_cmp(&depth(b))
        })
        .unwrap_or(center)
}

/// True if every corner turns left about `normal` (collinear corners allowed).
pub fn is_convex(points: &[Point3], normal: &Vec3, tol: f64) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    (0..n).all(|i| {
        let (a, b, c) = (points[i], points[(i + 1) % n], points[(i + 2) % n]);
        (b - a).cross(&(c - b)).dot(normal) >= -tol * (b - a).norm().max(1.0)
    })
}

/// Cut a convex polygon by a plane. `None` when the plane does not pass
/// strictly through it.
pub fn split_convex(
    polygon: &[Point3],
    plane: &PlaneEq,
    tol: f64,
) -> Option<(Vec<Point3>, Vec<Point3>)> {
    let dist = snapped_distances(polygon, plane, tol);
    if !dist.iter().any(|&d| d > 0.0) || !dist.iter().any(|&d| d < 0.0) {
        return None;
    }

    let n = polygon.len();
    let mut above = Vec::with_capacity(n + 1);
    let mut below = Vec::with_capacity(n + 1);
    for i in 0..n {
        let j = (i + 1) % n;
        let (p, di, dj) = (polygon[i], dist[i], dist[j]);
        if di >= 0.0 {
            above.push(p);
        }
        if di <= 0.0 {
            below.push(p);
        }
        if (di > 0.0 && dj < 0.0) || (di < 0.0 && dj > 0.0) {
            let x = p + (polygon[j] - p) * (di / (di - dj));
            above.push(x);
            below.push(x);
        }
    }
    (above.len() >= 3 && below.len() >= 3).then_some((above, below))
}

/// Cut a fragment by each plane in turn.
///
/// Pieces thinner than `tol` are dropped.
pub fn split_fragment(fragment: &Fragment, planes: &[PlaneEq], tol: f64) -> Vec<Fragment> {
    let mut pieces = vec![fragment.outer.clone()];
    for plane in planes {
        pieces = pieces
            .into_iter()
            .flat_map(|piece| match split_convex(&piece, plane, tol) {
                Some((a, b)) => vec![a, b],
                None => vec![piece],
            })
            .collect();
    }
    if pieces.len() == 1 {
        return vec![fragment.clone()];
    }
    pieces
        .into_iter()
        .map(|outer| Fragment::piece(fragment.source, outer, fragment.normal))
        .filter(|f| f.area() > tol * tol)
        .collect()
}

/// How two planar faces meet.
#[derive(Debug, Clone, PartialEq)]
pub enum Contact {
    /// The faces do not meet.
    Disjoint,
    /// The faces lie in one plane.
    Coplanar,
    /// The faces meet in a point or a segment shorter than the tolerance.
    Touching,
    /// The faces cross along these segments.
    Crossing(Vec<(Point3, Point3)>),
}

fn snapped_distances(ring: &[Point3], plane: &PlaneEq, tol: f64) -> Vec<f64> {
    ring.iter()
        .map(|p| {
            let d = plane.signed_distance(p);
            if d.abs() < tol {
                0.0
            } else {
                d
            }
        })
        .collect()
}

/// Parameter intervals along the line `origin + t * dir` that lie inside
/// the fragment. `plane` is the other face's plane, which contains the line.
///
/// Convex fragments give the closed hull of their contact points, so edges
/// lying in the plane count. Other fragments pair up strict sign changes.
fn line_intervals(
    fragment: &Fragment,
    plane: &PlaneEq,
    origin: &Point3,
    dir: &Vec3,
    tol: f64,
) -> Vec<(f64, f64)> {
    let param = |x: Point3| dir.dot(&(x - origin));
    if fragment.is_splittable(tol) {
        let ring = &fragment.outer;
        let dist = snapped_distances(ring, plane, tol);
        let n = ring.len();
        let mut ts = Vec::new();
        for i in 0..n {
            let j = (i + 1) % n;
            if dist[i] == 0.0 {
                ts.push(param(ring[i]));
            } else if dist[i] * dist[j] < 0.0 {
                ts.push(param(ring[i] + (ring[j] - ring[i]) * (dist[i] / (dist[i] - dist[j]))));
            }
        }
        let lo = ts.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = ts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        return if ts.is_empty() { Vec::new() } else { vec![(lo, hi)] };
    }

    let mut ts = Vec::new();
    for ring in std::iter::once(&fragment.outer).chain(fragment.holes.iter()) {
        let dist = snapped_distances(ring, plane, tol);
        let n = ring.len();
        for i in 0..n {
            let j = (i + 1) % n;
            // points on the plane count as above
            if (dist[i] >= 0.0) != (dist[j] >= 0.0) {
                ts.push(param(ring[i] + (ring[j] - ring[i]) * (dist[i] / (dist[i] - dist[j]))));
            }
        }
    }
    ts.sort_by(f64::total_cmp);
    ts.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

fn overlap(a: &[(f64, f64)], b: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = Vec::new();
    for &(a0, a1) in a {
        for &(b0, b1) in b {
            let (lo, hi) = (a0.max(b0), a1.min(b1));
            if hi >= lo {
                out.push((lo, hi));
            }
        }
    }
    out
}

/// Intersect two planar fragments.
pub fn intersect_planar(a: &Fragment, b: &Fragment, tol: f64) -> Contact {
    let (Some(pa), Some(pb)) = (a.plane(), b.plane()) else {
        return Contact::Disjoint;
    };
    let c = pa.normal.cross(&pb.normal);
    let c2 = c.norm_squared();
    if c2 < 1e-18 {
        return if pa.coincides(&pb, tol) {
            Contact::Coplanar
        } else {
            Contact::Disjoint
        };
    }
    let origin = Point3::from(
        (pa.offset * pb.normal.cross(&c) + pb.offset * c.cross(&pa.normal)) / c2,
    );
    let dir = c / c2.sqrt();

    let on_a = line_intervals(a, &pb, &origin, &dir, tol);
    let on_b = line_intervals(b, &pa, &origin, &dir, tol);
    let shared = overlap(&on_a, &on_b);
    if shared.is_empty() {
        return Contact::Disjoint;
    }
    let segments: Vec<(Point3, Point3)> = shared
        .into_iter()
        .filter(|(t0, t1)| t1 - t0 > tol)
        .map(|(t0, t1)| (origin + dir * t0, origin + dir * t1))
        .collect();
    if segments.is_empty() {
        Contact::Touching
    } else {
        Contact::Crossing(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use keel_kernel_primitives::make_cube;
    use keel_kernel_topo::Session;

    fn square(z: f64) -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, z),
            Point3::new(2.0, 0.0, z),
            Point3::new(2.0, 2.0, z),
            Point3::new(0.0, 2.0, z),
        ]
    }

    fn fragment(outer: Vec<Point3>) -> Fragment {
        let normal = newell_normal(&outer).normalize();
        Fragment::piece(FaceId::default(), outer, normal)
    }

    #[test]
    fn test_split_convex_square_in_half() {
        let plane = PlaneEq::new(&Point3::new(1.0, 0.0, 0.0), &Vec3::x()).unwrap();
        let (above, below) = split_convex(&square(0.0), &plane, 1e-9).unwrap();
        assert_eq!(above.len(), 4);
        assert_eq!(below.len(), 4);
        assert_relative_eq!(fragment(above).area(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(fragment(below).area(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_plane_through_edge_does_not_split() {
        let plane = PlaneEq::new(&Point3::origin(), &Vec3::x()).unwrap();
        assert!(split_convex(&square(0.0), &plane, 1e-9).is_none());
    }

    #[test]
    fn test_split_fragment_by_two_planes() {
        let planes = [
            PlaneEq::new(&Point3::new(1.0, 0.0, 0.0), &Vec3::x()).unwrap(),
            PlaneEq::new(&Point3::new(0.0, 1.0, 0.0), &Vec3::y()).unwrap(),
            // parallel to the square, no effect
            PlaneEq::new(&Point3::new(0.0, 0.0, 5.0), &Vec3::z()).unwrap(),
        ];
        let pieces = split_fragment(&fragment(square(0.0)), &planes, 1e-9);
        assert_eq!(pieces.len(), 4);
        for p in &pieces {
            assert_relative_eq!(p.area(), 1.0, epsilon = 1e-12);
            assert!(p.sample.x > 0.0 && p.sample.x < 2.0);
        }
    }

    #[test]
    fn test_crossing_faces() {
        let a = fragment(square(0.0));
        // vertical square through x = 1 reaching below and above z = 0
        let b = fragment(vec![
            Point3::new(1.0, -1.0, -1.0),
            Point3::new(1.0, 3.0, -1.0),
            Point3::new(1.0, 3.0, 1.0),
            Point3::new(1.0, -1.0, 1.0),
        ]);
        match intersect_planar(&a, &b, 1e-9) {
            Contact::Crossing(segs) => {
                assert_eq!(segs.len(), 1);
                let (p, q) = segs[0];
                assert_relative_eq!((q - p).norm(), 2.0, epsilon = 1e-9);
                assert_relative_eq!(p.x, 1.0, epsilon = 1e-9);
            }
            other => panic!("expected crossing, got {other:?}"),
        }
    }

    #[test]
    fn test_coplanar_and_parallel_faces() {
        let a = fragment(square(0.0));
        let mut shifted = square(0.0);
        for p in &mut shifted {
            p.x += 1.0;
        }
        assert_eq!(intersect_planar(&a, &fragment(shifted), 1e-9), Contact::Coplanar);
        assert_eq!(intersect_planar(&a, &fragment(square(3.0)), 1e-9), Contact::Disjoint);
    }

    #[test]
    fn test_faces_meeting_at_a_corner_touch() {
        let a = fragment(square(0.0));
        let b = fragment(vec![
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(3.0, 3.0, 0.0),
            Point3::new(3.0, 3.0, 1.0),
        ]);
        assert_eq!(intersect_planar(&a, &b, 1e-9), Contact::Touching);
    }

    #[test]
    fn test_cube_faces_are_splittable() {
        let cube = make_cube(&Session::new(), 1.0, 1.0, 1.0).unwrap();
        for f in cube.faces() {
            let frag = Fragment::from_face(&cube, f).unwrap();
            assert!(frag.is_splittable(1e-9));
            assert_relative_eq!(frag.area(), 1.0, epsilon = 1e-12);
            assert!(frag.plane().unwrap().signed_distance(&frag.sample).abs() < 1e-12);
        }
    }

    #[test]
    fn test_interior_point_of_concave_face() {
        // U shape: the centroid falls in the notch
        let outer = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.0, 3.0, 0.0),
            Point3::new(2.0, 3.0, 0.0),
            Point3::new(2.0, 0.5, 0.0),
            Point3::new(1.0, 0.5, 0.0),
            Point3::new(1.0, 3.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
        ];
        let normal = Vec3::z();
        assert!(!is_convex(&outer, &normal, 1e-9));
        let p = interior_point(&outer, &[], &normal);
        let ring = vec![outer.iter().map(|q| Point2::new(q.x, q.y)).collect::<Vec<_>>()];
        assert!(point_in_rings(&Point2::new(p.x, p.y), &ring));
    }

    #[test]
    fn test_flipped_fragment_faces_away() {
        let f = fragment(square(0.0));
        let g = f.clone().flipped();
        assert_eq!(g.normal, -f.normal);
        assert_relative_eq!(g.area(), f.area(), epsilon = 1e-12);
        assert_eq!(g.orientation, Orientation::Reversed);
    }
}

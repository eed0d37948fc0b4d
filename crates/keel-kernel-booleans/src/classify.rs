//! Fragment classification for B-rep boolean operations.
//!
//! After splitting, each fragment is classified as Outside, Inside,
//! OnSame or OnOpposite relative to the other solid. A boundary test runs
//! first; points off the boundary are resolved by ray casting.

use keel_kernel_math::{Point2, Point3, Vec3};
use keel_kernel_primitives::BRepSolid;
use keel_kernel_tessellate::{tessellate_face, TessellationParams};

use crate::split::{distance_to_rings, point_in_rings, Fragment, PlaneEq};
use crate::BooleanOp;

/// Classification of a fragment relative to another solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceClassification {
    /// Fragment is outside the other solid.
    Outside,
    /// Fragment is inside the other solid.
    Inside,
    /// Fragment is on the boundary, normals agree.
    OnSame,
    /// Fragment is on the boundary, normals oppose.
    OnOpposite,
}

/// Which operand a fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The first operand.
    A,
    /// The second operand (the tool, for subtraction).
    B,
}

/// What to do with a classified fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Drop it.
    Discard,
    /// Keep it as is.
    Keep,
    /// Keep it facing the other way.
    KeepFlipped,
}

/// Selection rule for one fragment.
///
/// Coincident boundary pieces are only ever kept from A: Union and
/// Intersect keep A's OnSame pieces, Subtract keeps A's OnOpposite pieces.
pub fn select(op: BooleanOp, operand: Operand, class: FaceClassification) -> Selection {
    use FaceClassification::*;
    let keep = match (op, operand) {
        (BooleanOp::Union, Operand::A) => matches!(class, Outside | OnSame),
        (BooleanOp::Union, Operand::B) => class == Outside,
        (BooleanOp::Intersect, Operand::A) => matches!(class, Inside | OnSame),
        (BooleanOp::Intersect, Operand::B) => class == Inside,
        (BooleanOp::Subtract, Operand::A) => matches!(class, Outside | OnOpposite),
        (BooleanOp::Subtract, Operand::B) => {
            return if class == Inside {
                Selection::KeepFlipped
            } else {
                Selection::Discard
            };
        }
    };
    if keep {
        Selection::Keep
    } else {
        Selection::Discard
    }
}

/// Tilted ray directions; a majority vote covers rays grazing an edge.
const RAYS: [[f64; 3]; 3] = [
    [1.0, 0.312_7, 0.147_3],
    [0.237_1, 1.0, 0.412_9],
    [0.371_9, 0.183_3, 1.0],
];

#[derive(Debug)]
enum Boundary {
    Polygon {
        plane: PlaneEq,
        u: Vec3,
        v: Vec3,
        rings: Vec<Vec<Point2>>,
    },
    Triangle {
        corners: [Point3; 3],
        normal: Vec3,
    },
}

impl Boundary {
    /// Outward normal if `p` lies on this piece of boundary.
    fn normal_at(&self, p: &Point3, tol: f64) -> Option<Vec3> {
        match self {
            Boundary::Polygon { plane, u, v, rings } => {
                if plane.signed_distance(p).abs() > tol {
                    return None;
                }
                let q = Point2::new(p.coords.dot(u), p.coords.dot(v));
                (point_in_rings(&q, rings) || distance_to_rings(&q, rings) <= tol)
                    .then_some(plane.normal)
            }
            Boundary::Triangle { corners, normal } => {
                if normal.dot(&(p - corners[0])).abs() > tol {
                    return None;
                }
                let [a, b, c] = corners;
                let inside = [(a, b), (b, c), (c, a)]
                    .iter()
                    .all(|(s, e)| (*e - *s).cross(&(p - *s)).dot(normal) >= -tol * (*e - *s).norm());
                inside.then_some(*normal)
            }
        }
    }

    /// Ray parameter of a forward hit, if any.
    fn hit(&self, origin: &Point3, dir: &Vec3, tol: f64) -> Option<f64> {
        match self {
            Boundary::Polygon { plane, u, v, rings } => {
                let denom = plane.normal.dot(dir);
                if denom.abs() < 1e-12 {
                    return None;
                }
                let t = -plane.signed_distance(origin) / denom;
                if t <= tol {
                    return None;
                }
                let x = origin + dir * t;
                point_in_rings(&Point2::new(x.coords.dot(u), x.coords.dot(v)), rings).then_some(t)
            }
            Boundary::Triangle { corners, .. } => {
                // Möller-Trumbore
                let [v0, v1, v2] = corners;
                let e1 = v1 - v0;
                let e2 = v2 - v0;
                let h = dir.cross(&e2);
                let a = e1.dot(&h);
                if a.abs() < 1e-12 {
                    return None;
                }
                let f = 1.0 / a;
                let s = origin - v0;
                let bu = f * s.dot(&h);
                if !(0.0..=1.0).contains(&bu) {
                    return None;
                }
                let q = s.cross(&e1);
                let bv = f * dir.dot(&q);
                if bv < 0.0 || bu + bv > 1.0 {
                    return None;
                }
                let t = f * e2.dot(&q);
                (t > tol).then_some(t)
            }
        }
    }
}

/// Point/solid classifier over the boundary of one solid.
///
/// Planar faces are tested exactly through their loops; curved faces
/// through a tessellation.
#[derive(Debug)]
pub struct SolidClassifier {
    boundary: Vec<Boundary>,
    tolerance: f64,
}

impl SolidClassifier {
    /// Build a classifier for `brep`.
    pub fn new(brep: &BRepSolid, tolerance: f64) -> Self {
        let mut boundary = Vec::new();
        for face_id in brep.faces() {
            let Some(fragment) = Fragment::from_face(brep, face_id) else {
                continue;
            };
            if let Some(plane) = fragment.plane() {
                let (u, v) = plane.basis();
                let rings = std::iter::once(&fragment.outer)
                    .chain(fragment.holes.iter())
                    .map(|ring| {
                        ring.iter()
                            .map(|p| Point2::new(p.coords.dot(&u), p.coords.dot(&v)))
                            .collect()
                    })
                    .collect();
                boundary.push(Boundary::Polygon { plane, u, v, rings });
                continue;
            }
            let mesh = tessellate_face(
                &brep.topology,
                &brep.geometry,
                face_id,
                &TessellationParams {
                    compute_normals: false,
                    ..Default::default()
                },
            );
            let at = |i: u32| {
                let i = i as usize * 3;
                Point3::new(
                    mesh.vertices[i] as f64,
                    mesh.vertices[i + 1] as f64,
                    mesh.vertices[i + 2] as f64,
                )
            };
            for t in mesh.indices.chunks_exact(3) {
                let corners = [at(t[0]), at(t[1]), at(t[2])];
                let Some(normal) = (corners[1] - corners[0])
                    .cross(&(corners[2] - corners[0]))
                    .try_normalize(1e-14)
                else {
                    continue;
                };
                boundary.push(Boundary::Triangle { corners, normal });
            }
        }
        Self {
            boundary,
            tolerance,
        }
    }

    /// True if `p` is inside the solid (boundary points excluded).
    pub fn contains(&self, p: &Point3) -> bool {
        let odd = RAYS
            .iter()
            .filter(|d| {
                let dir = Vec3::new(d[0], d[1], d[2]).normalize();
                let hits = self
                    .boundary
                    .iter()
                    .filter(|b| b.hit(p, &dir, self.tolerance).is_some())
                    .count();
                hits % 2 == 1
            })
            .count();
        odd * 2 > RAYS.len()
    }

    /// Classify a fragment sample with outward `normal`.
    pub fn classify(&self, sample: &Point3, normal: &Vec3) -> FaceClassification {
        let on = self
            .boundary
            .iter()
            .find_map(|b| b.normal_at(sample, self.tolerance));
        match on {
            Some(n) if n.dot(normal) >= 0.0 => FaceClassification::OnSame,
            Some(_) => FaceClassification::OnOpposite,
            None if self.contains(sample) => FaceClassification::Inside,
            None => FaceClassification::Outside,
        }
    }

    /// Classify a fragment.
    pub fn classify_fragment(&self, fragment: &Fragment) -> FaceClassification {
        self.classify(&fragment.sample, &fragment.normal)
    }
}

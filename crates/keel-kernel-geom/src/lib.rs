#![warn(missing_docs)]

//! Geometric carriers for the keel kernel.
//!
//! Curves and surfaces are closed enums: every carrier kind the kernel can
//! evaluate is listed here, so dispatch is a `match` rather than a trait
//! object. Carriers live in a [`GeometryStore`] arena and topology refers to
//! them by [`CurveId`] / [`SurfaceId`], which lets several edges or faces share
//! one carrier.

use keel_kernel_math::{Dir3, Point2, Point3, Transform, Vec3};
use keel_kernel_nurbs::{NurbsCurve, NurbsSurface};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a curve in a [`GeometryStore`].
    pub struct CurveId;
    /// Handle to a surface in a [`GeometryStore`].
    pub struct SurfaceId;
}

// =============================================================================
// Plane
// =============================================================================

/// An infinite plane defined by an origin point and a coordinate frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Create a plane from origin and two orthogonal direction vectors.
    /// The vectors do not need to be normalized.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        Self {
            origin,
            x_dir: Dir3::new_normalize(x_dir),
            y_dir: Dir3::new_normalize(y_dir),
            normal_dir: Dir3::new_normalize(x_dir.cross(&y_dir)),
        }
    }

    /// Create a plane from origin and normal. X/Y directions are chosen arbitrarily.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let arbitrary = if n.as_ref().x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let x = Dir3::new_normalize(arbitrary.cross(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// Plane through three points with normal `(b - a) × (c - a)`.
    ///
    /// Returns `None` when the points are collinear.
    pub fn from_points(a: &Point3, b: &Point3, c: &Point3) -> Option<Self> {
        let ab = b - a;
        let normal = ab.cross(&(c - a));
        if normal.norm() < 1e-14 || ab.norm() < 1e-14 {
            return None;
        }
        let x = ab;
        let y = normal.cross(&x);
        Some(Self::new(*a, x, y))
    }

    /// XY plane at the origin.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::y())
    }

    /// Project a 3D point onto this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal_dir.as_ref())
    }

    /// Evaluate at `(u, v)`.
    pub fn point(&self, u: f64, v: f64) -> Point3 {
        self.origin + u * self.x_dir.as_ref() + v * self.y_dir.as_ref()
    }

    /// The same point set with the opposite normal (u and v swapped).
    pub fn flipped(&self) -> Self {
        Self {
            origin: self.origin,
            x_dir: self.y_dir,
            y_dir: self.x_dir,
            normal_dir: Dir3::new_unchecked(-self.normal_dir.into_inner()),
        }
    }

    /// Apply an affine transform to the frame.
    pub fn transformed(&self, t: &Transform) -> Self {
        let x = t.apply_vec(&self.x_dir);
        let y = t.apply_vec(&self.y_dir);
        let mut plane = Self::new(t.apply_point(&self.origin), x, y);
        if t.is_mirroring() {
            // keep the normal pointing to the image of the original side
            plane.normal_dir = Dir3::new_unchecked(-plane.normal_dir.into_inner());
            std::mem::swap(&mut plane.x_dir, &mut plane.y_dir);
        }
        plane
    }
}

// =============================================================================
// Line3d
// =============================================================================

/// A 3D line parameterized so `t=0` is `origin` and `t=1` is `origin + direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct Line3d {
    /// Starting point.
    pub origin: Point3,
    /// Direction (not necessarily unit length; magnitude sets the speed).
    pub direction: Vec3,
}

impl Line3d {
    /// Line from `start` (t=0) to `end` (t=1).
    pub fn from_points(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }

    /// Evaluate at `t`.
    pub fn point(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    /// Parameter of the orthogonal projection of `p` onto the line.
    pub fn closest_parameter(&self, p: &Point3) -> f64 {
        let len2 = self.direction.norm_squared();
        if len2 < 1e-30 {
            0.0
        } else {
            (p - self.origin).dot(&self.direction) / len2
        }
    }
}

// =============================================================================
// Curve
// =============================================================================

/// A 3D curve carrier.
#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    /// Straight line, domain `[0, 1]`.
    Line(Line3d),
    /// Rational B-spline curve.
    Nurbs(NurbsCurve),
}

impl Curve {
    /// Line carrier from two points.
    pub fn line(start: Point3, end: Point3) -> Self {
        Curve::Line(Line3d::from_points(start, end))
    }

    /// Evaluate at `t`.
    pub fn evaluate(&self, t: f64) -> Point3 {
        match self {
            Curve::Line(l) => l.point(t),
            Curve::Nurbs(c) => c.point(t),
        }
    }

    /// First derivative at `t`.
    pub fn derivative(&self, t: f64) -> Vec3 {
        match self {
            Curve::Line(l) => l.direction,
            Curve::Nurbs(c) => c.derivative(t),
        }
    }

    /// Parameter domain.
    pub fn domain(&self) -> (f64, f64) {
        match self {
            Curve::Line(_) => (0.0, 1.0),
            Curve::Nurbs(c) => c.domain(),
        }
    }

    /// Transformed copy.
    pub fn transform(&self, t: &Transform) -> Curve {
        match self {
            Curve::Line(l) => Curve::line(t.apply_point(&l.origin), t.apply_point(&l.point(1.0))),
            Curve::Nurbs(c) => Curve::Nurbs(c.transformed(t)),
        }
    }

    /// Copy traversed in the opposite direction over the same domain.
    pub fn reversed(&self) -> Curve {
        match self {
            Curve::Line(l) => Curve::line(l.point(1.0), l.origin),
            Curve::Nurbs(c) => Curve::Nurbs(c.reversed()),
        }
    }

    /// True for line carriers.
    pub fn is_line(&self) -> bool {
        matches!(self, Curve::Line(_))
    }
}

// =============================================================================
// Surface
// =============================================================================

/// A surface carrier.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    /// Infinite plane.
    Plane(Plane),
    /// Rational tensor-product surface.
    Nurbs(NurbsSurface),
}

impl Surface {
    /// Evaluate at `(u, v)`.
    pub fn evaluate(&self, uv: Point2) -> Point3 {
        match self {
            Surface::Plane(p) => p.point(uv.x, uv.y),
            Surface::Nurbs(s) => s.point(uv.x, uv.y),
        }
    }

    /// Partial derivatives `(S_u, S_v)`.
    pub fn partials(&self, uv: Point2) -> (Vec3, Vec3) {
        match self {
            Surface::Plane(p) => (p.x_dir.into_inner(), p.y_dir.into_inner()),
            Surface::Nurbs(s) => s.partials(uv.x, uv.y),
        }
    }

    /// Unit normal at `(u, v)`; `None` at a degenerate surface point.
    pub fn normal(&self, uv: Point2) -> Option<Dir3> {
        match self {
            Surface::Plane(p) => Some(p.normal_dir),
            Surface::Nurbs(s) => s.normal(uv.x, uv.y),
        }
    }

    /// Parameter domain as `((u_min, u_max), (v_min, v_max))`.
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        match self {
            Surface::Plane(_) => ((-1e10, 1e10), (-1e10, 1e10)),
            Surface::Nurbs(s) => s.domain(),
        }
    }

    /// Transformed copy.
    pub fn transform(&self, t: &Transform) -> Surface {
        match self {
            Surface::Plane(p) => Surface::Plane(p.transformed(t)),
            Surface::Nurbs(s) => Surface::Nurbs(s.transformed(t)),
        }
    }

    /// Same point set with the opposite normal.
    pub fn reversed(&self) -> Surface {
        match self {
            Surface::Plane(p) => Surface::Plane(p.flipped()),
            Surface::Nurbs(s) => Surface::Nurbs(s.reversed_u()),
        }
    }

    /// The plane, if this is a planar carrier.
    pub fn as_plane(&self) -> Option<&Plane> {
        match self {
            Surface::Plane(p) => Some(p),
            Surface::Nurbs(_) => None,
        }
    }
}

// =============================================================================
// Geometry store
// =============================================================================

/// Arena of curve and surface carriers shared by a B-rep.
#[derive(Debug, Clone, Default)]
pub struct GeometryStore {
    /// Curve carriers.
    pub curves: SlotMap<CurveId, Curve>,
    /// Surface carriers.
    pub surfaces: SlotMap<SurfaceId, Surface>,
}

impl GeometryStore {
    /// Create an empty geometry store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a curve and return its id.
    pub fn add_curve(&mut self, curve: Curve) -> CurveId {
        self.curves.insert(curve)
    }

    /// Add a surface and return its id.
    pub fn add_surface(&mut self, surface: Surface) -> SurfaceId {
        self.surfaces.insert(surface)
    }

    /// Look up a curve.
    pub fn curve(&self, id: CurveId) -> Option<&Curve> {
        self.curves.get(id)
    }

    /// Look up a surface.
    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    /// Clone a shared curve so it can be edited without affecting other users.
    pub fn duplicate_curve(&mut self, id: CurveId) -> Option<CurveId> {
        let copy = self.curves.get(id)?.clone();
        Some(self.curves.insert(copy))
    }

    /// Clone a shared surface so it can be edited without affecting other users.
    pub fn duplicate_surface(&mut self, id: SurfaceId) -> Option<SurfaceId> {
        let copy = self.surfaces.get(id)?.clone();
        Some(self.surfaces.insert(copy))
    }

    /// Remove a curve carrier.
    pub fn remove_curve(&mut self, id: CurveId) -> Option<Curve> {
        self.curves.remove(id)
    }

    /// Remove a surface carrier.
    pub fn remove_surface(&mut self, id: SurfaceId) -> Option<Surface> {
        self.surfaces.remove(id)
    }

    /// Transform every carrier in place. Ids stay valid.
    pub fn transform_all(&mut self, t: &Transform) {
        for curve in self.curves.values_mut() {
            *curve = curve.transform(t);
        }
        for surface in self.surfaces.values_mut() {
            *surface = surface.transform(t);
        }
    }
}

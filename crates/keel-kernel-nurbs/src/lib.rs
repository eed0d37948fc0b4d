#![warn(missing_docs)]

//! NURBS curve and surface carriers for the keel kernel.
//!
//! Rational B-spline curves and tensor-product surfaces evaluated with the
//! basis-function form of De Boor's algorithm. Construction is checked:
//! malformed degree / knot / weight tuples are rejected with a
//! [`NurbsError`] instead of producing a carrier that panics on evaluation.
//!
//! # Key types
//!
//! - [`NurbsCurve`]: rational B-spline curve in 3D
//! - [`NurbsSurface`]: rational tensor-product surface
//!
//! # Algorithms
//!
//! - **De Boor / Cox basis recursion** for point evaluation
//! - **Basis derivatives** (Piegl & Tiller A2.3) for analytic rational derivatives
//! - **Boehm's algorithm** for knot insertion

use keel_kernel_math::{Dir3, Point3, Transform, Vec3};
use thiserror::Error;

/// Relative slack allowed when checking a parameter against the domain.
const DOMAIN_EPS: f64 = 1e-12;

/// Errors raised when constructing or evaluating a NURBS carrier.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NurbsError {
    /// Degree must be at least 1.
    #[error("invalid degree {0}: must be >= 1")]
    InvalidDegree(usize),
    /// Not enough control points for the requested degree.
    #[error("need at least {needed} control points for this degree, got {actual}")]
    TooFewControlPoints {
        /// Minimum number of control points (`degree + 1`).
        needed: usize,
        /// Number supplied.
        actual: usize,
    },
    /// Knot vector length is not `n + degree + 1`.
    #[error("knot vector has {actual} entries, expected {expected}")]
    KnotCount {
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
    /// Knot vector decreases at the given index.
    #[error("knot vector decreases at index {0}")]
    DecreasingKnots(usize),
    /// Knot value is NaN or infinite.
    #[error("knot {0} is not finite")]
    NonFiniteKnot(usize),
    /// Weight list does not match the control point count.
    #[error("{actual} weights supplied for {expected} control points")]
    WeightCount {
        /// Number of control points.
        expected: usize,
        /// Number of weights.
        actual: usize,
    },
    /// Weight is zero, negative or non-finite.
    #[error("weight {0} must be positive and finite")]
    NonPositiveWeight(usize),
    /// Surface grid dimensions do not match the control point count.
    #[error("control grid {n_u}x{n_v} does not match {actual} control points")]
    GridSize {
        /// Points in u.
        n_u: usize,
        /// Points in v.
        n_v: usize,
        /// Points supplied.
        actual: usize,
    },
    /// First and last domain knots coincide.
    #[error("parameter domain has zero width")]
    EmptyDomain,
    /// Parameter lies outside `[min, max]`.
    #[error("parameter {t} outside domain [{min}, {max}]")]
    ParameterOutOfDomain {
        /// Requested parameter.
        t: f64,
        /// Domain start.
        min: f64,
        /// Domain end.
        max: f64,
    },
}

/// Result alias for NURBS operations.
pub type Result<T> = std::result::Result<T, NurbsError>;

// =============================================================================
// Knot vector utilities
// =============================================================================

/// Check one parametric direction: degree, point count, knots and weights.
fn validate_direction(n_points: usize, degree: usize, knots: &[f64]) -> Result<()> {
    if degree == 0 {
        return Err(NurbsError::InvalidDegree(degree));
    }
    if n_points < degree + 1 {
        return Err(NurbsError::TooFewControlPoints {
            needed: degree + 1,
            actual: n_points,
        });
    }
    let expected = n_points + degree + 1;
    if knots.len() != expected {
        return Err(NurbsError::KnotCount {
            expected,
            actual: knots.len(),
        });
    }
    for (i, k) in knots.iter().enumerate() {
        if !k.is_finite() {
            return Err(NurbsError::NonFiniteKnot(i));
        }
        if i > 0 && *k < knots[i - 1] {
            return Err(NurbsError::DecreasingKnots(i));
        }
    }
    if knots[n_points] - knots[degree] <= 0.0 {
        return Err(NurbsError::EmptyDomain);
    }
    Ok(())
}

/// Resolve optional weights to one positive weight per control point.
fn resolve_weights(weights: Option<Vec<f64>>, n_points: usize) -> Result<Vec<f64>> {
    let weights = weights.unwrap_or_else(|| vec![1.0; n_points]);
    if weights.len() != n_points {
        return Err(NurbsError::WeightCount {
            expected: n_points,
            actual: weights.len(),
        });
    }
    if let Some(i) = weights.iter().position(|w| !w.is_finite() || *w <= 0.0) {
        return Err(NurbsError::NonPositiveWeight(i));
    }
    Ok(weights)
}

fn check_domain(t: f64, (min, max): (f64, f64)) -> Result<f64> {
    let slack = DOMAIN_EPS * (max - min).abs().max(1.0);
    if !t.is_finite() || t < min - slack || t > max + slack {
        return Err(NurbsError::ParameterOutOfDomain { t, min, max });
    }
    Ok(t.clamp(min, max))
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to valid range.
/// For `t` at the end of the domain, returns the last non-empty span.
fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    // n = index of the last control point
    if t >= knots[n + 1] {
        let mut span = n;
        while span > degree && knots[span] >= knots[n + 1] {
            span -= 1;
        }
        return span;
    }
    if t <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom.abs() < 1e-30 {
        0.0
    } else {
        num / denom
    }
}

/// Non-zero basis functions `N[span-degree..=span]` at `t`.
fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = ratio(n[r], right[r + 1] + left[j - r]);
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }
    n
}

/// Basis functions and their derivatives up to `order` (which must be <= degree).
///
/// `ders[k][j]` is the k-th derivative of `N[span-degree+j]` at `t`.
fn basis_function_derivatives(
    knots: &[f64],
    span: usize,
    degree: usize,
    t: f64,
    order: usize,
) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            // lower triangle holds knot differences
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ratio(ndu[r][j - 1], ndu[j][r]);
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; order + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
    for r in 0..=p {
        let (mut s1, mut s2) = (0usize, 1usize);
        a[0][0] = 1.0;
        for k in 1..=order {
            let mut d = 0.0;
            let pk = p - k;
            if r >= k {
                let rk = r - k;
                a[s2][0] = ratio(a[s1][0], ndu[pk + 1][rk]);
                d = a[s2][0] * ndu[rk][pk];
            }
            let j1 = if r + 1 >= k { 1 } else { k - r };
            let j2 = if r <= pk + 1 { k - 1 } else { p - r };
            for j in j1..=j2 {
                let col = r + j - k;
                a[s2][j] = ratio(a[s1][j] - a[s1][j - 1], ndu[pk + 1][col]);
                d += a[s2][j] * ndu[col][pk];
            }
            if r <= pk {
                a[s2][k] = ratio(-a[s1][k - 1], ndu[pk + 1][r]);
                d += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for (k, row) in ders.iter_mut().enumerate().skip(1) {
        for v in row.iter_mut() {
            *v *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Knot vector clamped at 0 and 1 with uniform interior spacing.
fn clamped_uniform_knots(n_points: usize, degree: usize) -> Vec<f64> {
    let m = n_points + degree + 1;
    let mut knots = vec![0.0; m];
    let n_internal = m.saturating_sub(2 * (degree + 1));
    for i in 0..=degree.min(m.saturating_sub(1)) {
        knots[m - 1 - i] = 1.0;
    }
    for i in 1..=n_internal {
        knots[degree + i] = i as f64 / (n_internal + 1) as f64;
    }
    knots
}

/// Mirror a knot vector so the reversed parametrization spans the same domain.
fn reversed_knots(knots: &[f64]) -> Vec<f64> {
    let (first, last) = (knots[0], knots[knots.len() - 1]);
    knots.iter().rev().map(|k| first + last - k).collect()
}

// =============================================================================
// NURBS curve
// =============================================================================

/// A rational B-spline (NURBS) curve in 3D.
///
/// Evaluated as a non-rational B-spline in homogeneous coordinates divided
/// by the interpolated weight.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve {
    control_points: Vec<Point3>,
    weights: Vec<f64>,
    knots: Vec<f64>,
    degree: usize,
}

impl NurbsCurve {
    /// Create a NURBS curve. `weights: None` means every weight is 1.
    pub fn new(
        control_points: Vec<Point3>,
        weights: Option<Vec<f64>>,
        knots: Vec<f64>,
        degree: usize,
    ) -> Result<Self> {
        validate_direction(control_points.len(), degree, &knots)?;
        let weights = resolve_weights(weights, control_points.len())?;
        Ok(Self {
            control_points,
            weights,
            knots,
            degree,
        })
    }

    /// Non-rational curve on a clamped uniform knot vector over `[0, 1]`.
    pub fn clamped_uniform(control_points: Vec<Point3>, degree: usize) -> Result<Self> {
        if degree == 0 {
            return Err(NurbsError::InvalidDegree(degree));
        }
        let knots = clamped_uniform_knots(control_points.len(), degree);
        Self::new(control_points, None, knots, degree)
    }

    /// Degree-1 segment from `a` to `b` over `[0, 1]`.
    pub fn line(a: Point3, b: Point3) -> Self {
        Self {
            control_points: vec![a, b],
            weights: vec![1.0, 1.0],
            knots: vec![0.0, 0.0, 1.0, 1.0],
            degree: 1,
        }
    }

    /// Full circle of `radius` around `center` in the XY plane.
    ///
    /// Nine quadratic control points; quarter points at t = 0, 0.25, 0.5, 0.75.
    pub fn circle(center: Point3, radius: f64) -> Self {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let (c, r) = (center, radius);
        let control_points = vec![
            Point3::new(c.x + r, c.y, c.z),
            Point3::new(c.x + r, c.y + r, c.z),
            Point3::new(c.x, c.y + r, c.z),
            Point3::new(c.x - r, c.y + r, c.z),
            Point3::new(c.x - r, c.y, c.z),
            Point3::new(c.x - r, c.y - r, c.z),
            Point3::new(c.x, c.y - r, c.z),
            Point3::new(c.x + r, c.y - r, c.z),
            Point3::new(c.x + r, c.y, c.z),
        ];
        Self {
            control_points,
            weights: vec![1.0, w, 1.0, w, 1.0, w, 1.0, w, 1.0],
            knots: vec![0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0],
            degree: 2,
        }
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Control points (Cartesian, unweighted).
    pub fn control_points(&self) -> &[Point3] {
        &self.control_points
    }

    /// One weight per control point.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Knot vector.
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// True when every weight is 1.
    pub fn is_polynomial(&self) -> bool {
        self.weights.iter().all(|w| (*w - 1.0).abs() < 1e-15)
    }

    /// Parameter domain `(t_min, t_max)`.
    pub fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.control_points.len()],
        )
    }

    fn clamp_param(&self, t: f64) -> f64 {
        let (min, max) = self.domain();
        if t.is_nan() {
            min
        } else {
            t.clamp(min, max)
        }
    }

    /// Evaluate the curve at `t`, clamping `t` into the domain.
    pub fn point(&self, t: f64) -> Point3 {
        let t = self.clamp_param(t);
        let n = self.control_points.len() - 1;
        let span = find_span(&self.knots, n, self.degree, t);
        let basis = basis_functions(&self.knots, span, self.degree, t);

        let mut h = Vec3::zeros();
        let mut hw = 0.0;
        for (i, &b) in basis.iter().enumerate() {
            let idx = span - self.degree + i;
            let w = b * self.weights[idx];
            h += self.control_points[idx].coords * w;
            hw += w;
        }
        Point3::from(h / hw)
    }

    /// Evaluate at `t`, rejecting parameters outside the domain.
    pub fn try_point(&self, t: f64) -> Result<Point3> {
        let t = check_domain(t, self.domain())?;
        Ok(self.point(t))
    }

    /// Derivatives `C(t), C'(t), ..., C^(order)(t)`.
    ///
    /// Element 0 is the position as a vector. Orders above the degree are zero
    /// in homogeneous space but still pick up the rational correction terms.
    pub fn derivatives(&self, t: f64, order: usize) -> Vec<Vec3> {
        let t = self.clamp_param(t);
        let p = self.degree;
        let n = self.control_points.len() - 1;
        let span = find_span(&self.knots, n, p, t);
        let basis_order = order.min(p);
        let nders = basis_function_derivatives(&self.knots, span, p, t, basis_order);

        let mut a_ders = vec![Vec3::zeros(); order + 1];
        let mut w_ders = vec![0.0; order + 1];
        for (k, row) in nders.iter().enumerate() {
            for (j, &b) in row.iter().enumerate() {
                let idx = span - p + j;
                let w = b * self.weights[idx];
                a_ders[k] += self.control_points[idx].coords * w;
                w_ders[k] += w;
            }
        }

        let mut ck: Vec<Vec3> = Vec::with_capacity(order + 1);
        for k in 0..=order {
            let mut v = a_ders[k];
            for i in 1..=k {
                v -= ck[k - i] * (binomial(k, i) * w_ders[i]);
            }
            ck.push(v / w_ders[0]);
        }
        ck
    }

    /// First derivative `C'(t)`.
    pub fn derivative(&self, t: f64) -> Vec3 {
        self.derivatives(t, 1)[1]
    }

    /// Checked first derivative.
    pub fn try_derivative(&self, t: f64) -> Result<Vec3> {
        let t = check_domain(t, self.domain())?;
        Ok(self.derivative(t))
    }

    /// Same point set traversed in the opposite direction over the same domain.
    pub fn reversed(&self) -> Self {
        let mut control_points = self.control_points.clone();
        control_points.reverse();
        let mut weights = self.weights.clone();
        weights.reverse();
        Self {
            control_points,
            weights,
            knots: reversed_knots(&self.knots),
            degree: self.degree,
        }
    }

    /// Apply an affine transform to the control points.
    ///
    /// Rational curves are affinely invariant, so weights are untouched.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            control_points: self
                .control_points
                .iter()
                .map(|p| transform.apply_point(p))
                .collect(),
            ..self.clone()
        }
    }

    /// Insert a knot at `t` using Boehm's algorithm (in homogeneous space).
    ///
    /// Returns a new curve with one more control point and the same shape.
    pub fn insert_knot(&self, t: f64) -> Result<Self> {
        let t = check_domain(t, self.domain())?;
        let n = self.control_points.len() - 1;
        let p = self.degree;
        let span = find_span(&self.knots, n, p, t);

        let mut knots = Vec::with_capacity(self.knots.len() + 1);
        knots.extend_from_slice(&self.knots[..=span]);
        knots.push(t);
        knots.extend_from_slice(&self.knots[span + 1..]);

        let homogeneous = |i: usize| (self.control_points[i].coords * self.weights[i], self.weights[i]);

        let mut points = Vec::with_capacity(n + 2);
        let mut weights = Vec::with_capacity(n + 2);
        for i in 0..=(span - p) {
            points.push(self.control_points[i]);
            weights.push(self.weights[i]);
        }
        for i in (span - p + 1)..=span {
            let alpha = ratio(t - self.knots[i], self.knots[i + p] - self.knots[i]);
            let (h0, w0) = homogeneous(i - 1);
            let (h1, w1) = homogeneous(i);
            let h = h0 * (1.0 - alpha) + h1 * alpha;
            let w = w0 * (1.0 - alpha) + w1 * alpha;
            points.push(Point3::from(h / w));
            weights.push(w);
        }
        for i in span..=n {
            points.push(self.control_points[i]);
            weights.push(self.weights[i]);
        }

        Self::new(points, Some(weights), knots, p)
    }
}

// =============================================================================
// NURBS surface
// =============================================================================

/// A rational tensor-product NURBS surface.
///
/// Control points are stored row-major: index `v * n_u + u`.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsSurface {
    control_points: Vec<Point3>,
    weights: Vec<f64>,
    n_u: usize,
    n_v: usize,
    knots_u: Vec<f64>,
    knots_v: Vec<f64>,
    degree_u: usize,
    degree_v: usize,
}

impl NurbsSurface {
    /// Create a NURBS surface from a row-major `n_u x n_v` control grid.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        control_points: Vec<Point3>,
        weights: Option<Vec<f64>>,
        n_u: usize,
        n_v: usize,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        degree_u: usize,
        degree_v: usize,
    ) -> Result<Self> {
        if control_points.len() != n_u * n_v {
            return Err(NurbsError::GridSize {
                n_u,
                n_v,
                actual: control_points.len(),
            });
        }
        validate_direction(n_u, degree_u, &knots_u)?;
        validate_direction(n_v, degree_v, &knots_v)?;
        let weights = resolve_weights(weights, control_points.len())?;
        Ok(Self {
            control_points,
            weights,
            n_u,
            n_v,
            knots_u,
            knots_v,
            degree_u,
            degree_v,
        })
    }

    /// Degree-(1,1) patch through four corners over `[0,1]^2`.
    ///
    /// `p00` is at (u,v) = (0,0), `p10` at (1,0), `p01` at (0,1).
    pub fn bilinear(p00: Point3, p10: Point3, p01: Point3, p11: Point3) -> Self {
        Self {
            control_points: vec![p00, p10, p01, p11],
            weights: vec![1.0; 4],
            n_u: 2,
            n_v: 2,
            knots_u: vec![0.0, 0.0, 1.0, 1.0],
            knots_v: vec![0.0, 0.0, 1.0, 1.0],
            degree_u: 1,
            degree_v: 1,
        }
    }

    /// Degrees `(u, v)`.
    pub fn degrees(&self) -> (usize, usize) {
        (self.degree_u, self.degree_v)
    }

    /// Control grid size `(n_u, n_v)`.
    pub fn grid_size(&self) -> (usize, usize) {
        (self.n_u, self.n_v)
    }

    /// Control points, row-major.
    pub fn control_points(&self) -> &[Point3] {
        &self.control_points
    }

    /// Weights, row-major.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Parameter domain `((u_min, u_max), (v_min, v_max))`.
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.knots_u[self.degree_u], self.knots_u[self.n_u]),
            (self.knots_v[self.degree_v], self.knots_v[self.n_v]),
        )
    }

    fn clamp_params(&self, u: f64, v: f64) -> (f64, f64) {
        let ((u0, u1), (v0, v1)) = self.domain();
        let u = if u.is_nan() { u0 } else { u.clamp(u0, u1) };
        let v = if v.is_nan() { v0 } else { v.clamp(v0, v1) };
        (u, v)
    }

    /// Homogeneous sums `(A, w)` and their first partials in u and v.
    fn homogeneous_first_order(&self, u: f64, v: f64) -> [(Vec3, f64); 3] {
        let (u, v) = self.clamp_params(u, v);
        let span_u = find_span(&self.knots_u, self.n_u - 1, self.degree_u, u);
        let span_v = find_span(&self.knots_v, self.n_v - 1, self.degree_v, v);
        let du = basis_function_derivatives(&self.knots_u, span_u, self.degree_u, u, 1);
        let dv = basis_function_derivatives(&self.knots_v, span_v, self.degree_v, v, 1);

        let mut out = [(Vec3::zeros(), 0.0); 3];
        for j in 0..=self.degree_v {
            let v_idx = span_v - self.degree_v + j;
            for i in 0..=self.degree_u {
                let u_idx = span_u - self.degree_u + i;
                let idx = v_idx * self.n_u + u_idx;
                let w = self.weights[idx];
                let hp = self.control_points[idx].coords * w;
                let factors = [du[0][i] * dv[0][j], du[1][i] * dv[0][j], du[0][i] * dv[1][j]];
                for (slot, f) in out.iter_mut().zip(factors) {
                    slot.0 += hp * f;
                    slot.1 += w * f;
                }
            }
        }
        out
    }

    /// Evaluate at `(u, v)`, clamping into the domain.
    pub fn point(&self, u: f64, v: f64) -> Point3 {
        let (u, v) = self.clamp_params(u, v);
        let span_u = find_span(&self.knots_u, self.n_u - 1, self.degree_u, u);
        let span_v = find_span(&self.knots_v, self.n_v - 1, self.degree_v, v);
        let basis_u = basis_functions(&self.knots_u, span_u, self.degree_u, u);
        let basis_v = basis_functions(&self.knots_v, span_v, self.degree_v, v);

        let mut h = Vec3::zeros();
        let mut hw = 0.0;
        for (j, &bv) in basis_v.iter().enumerate() {
            let v_idx = span_v - self.degree_v + j;
            for (i, &bu) in basis_u.iter().enumerate() {
                let idx = v_idx * self.n_u + span_u - self.degree_u + i;
                let w = bu * bv * self.weights[idx];
                h += self.control_points[idx].coords * w;
                hw += w;
            }
        }
        Point3::from(h / hw)
    }

    /// Evaluate at `(u, v)`, rejecting parameters outside the domain.
    pub fn try_point(&self, u: f64, v: f64) -> Result<Point3> {
        let (du, dv) = self.domain();
        let u = check_domain(u, du)?;
        let v = check_domain(v, dv)?;
        Ok(self.point(u, v))
    }

    /// First partial derivatives `(S_u, S_v)`.
    pub fn partials(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let [(a, w), (a_u, w_u), (a_v, w_v)] = self.homogeneous_first_order(u, v);
        let s = a / w;
        ((a_u - s * w_u) / w, (a_v - s * w_v) / w)
    }

    /// Unit normal `S_u x S_v`, or `None` at a degenerate point.
    pub fn normal(&self, u: f64, v: f64) -> Option<Dir3> {
        let (su, sv) = self.partials(u, v);
        Dir3::try_new(su.cross(&sv), 1e-15)
    }

    /// Same surface with the u direction reversed, flipping the normal.
    pub fn reversed_u(&self) -> Self {
        let mut control_points = Vec::with_capacity(self.control_points.len());
        let mut weights = Vec::with_capacity(self.weights.len());
        for v in 0..self.n_v {
            for u in (0..self.n_u).rev() {
                let idx = v * self.n_u + u;
                control_points.push(self.control_points[idx]);
                weights.push(self.weights[idx]);
            }
        }
        Self {
            control_points,
            weights,
            knots_u: reversed_knots(&self.knots_u),
            ..self.clone()
        }
    }

    /// Apply an affine transform to the control grid.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            control_points: self
                .control_points
                .iter()
                .map(|p| transform.apply_point(p))
                .collect(),
            ..self.clone()
        }
    }
}

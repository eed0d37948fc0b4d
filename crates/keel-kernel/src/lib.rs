#![warn(missing_docs)]

//! High-level B-rep solid-modeling kernel facade for keel.
//!
//! Provides the [`Kernel`] session object, which owns the entity id
//! [`Session`], the [`KernelConfig`], and the boolean engine, and the
//! [`Solid`] type it hands out.
//!
//! # Example
//!
//! ```
//! use keel_kernel::{Kernel, KernelConfig};
//!
//! let kernel = Kernel::new(KernelConfig::default());
//! let a = kernel.cube(10.0, 10.0, 10.0).unwrap();
//! let b = kernel.cube(10.0, 10.0, 10.0).unwrap().translate(5.0, 0.0, 0.0);
//! let joined = kernel.union(&a, &b).unwrap();
//! assert!((joined.volume() - 1500.0).abs() < 1e-6);
//! let mesh = kernel.tessellate(&joined);
//! assert!(mesh.num_triangles() >= 12);
//! ```

pub use keel_kernel_booleans;
pub use keel_kernel_euler;
pub use keel_kernel_geom;
pub use keel_kernel_math;
pub use keel_kernel_nurbs;
pub use keel_kernel_primitives;
pub use keel_kernel_tessellate;
pub use keel_kernel_topo;
pub use keel_kernel_validate;

use std::sync::Arc;

use keel_kernel_booleans::{
    BenchmarkReport, BooleanOp, BooleanOptions, ExternalKernel, ExternalKernelCache,
    HybridEngine, KernelLoader,
};
use keel_kernel_math::{Aabb3, Point3, Tolerance, Transform};
use keel_kernel_primitives::{make_cube, make_polyhedron, make_tetrahedron, BRepSolid, PrimitiveError};
use keel_kernel_tessellate::{tessellate_solid, TessellationParams, TriangleMesh};
use keel_kernel_topo::Session;
use keel_kernel_validate::{solid_genus, validate_solid, GenusError, ValidationReport};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("invalid kernel config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid kernel config value: {0}")]
    Invalid(String),
}

/// Errors from facade operations.
#[derive(Error, Debug)]
pub enum KernelError {
    /// A primitive could not be built.
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
    /// A boolean produced no solid.
    #[error("boolean {op:?} failed: {reason}")]
    Boolean {
        /// Operation that failed.
        op: BooleanOp,
        /// Joined error messages.
        reason: String,
    },
}

/// Every tunable of a [`Kernel`]. Missing keys take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Modeling tolerances.
    pub tolerance: Tolerance,
    /// Mesh export quality.
    pub tessellation: TessellationParams,
    /// Boolean engine options.
    pub boolean: BooleanOptions,
}

impl KernelConfig {
    /// Parse a config from TOML text.
    ///
    /// ```
    /// let config = keel_kernel::KernelConfig::from_toml_str(
    ///     "[boolean]\nuse_external = false\n",
    /// )
    /// .unwrap();
    /// assert!(!config.boolean.use_external);
    /// assert_eq!(config.tessellation.linear_deflection, 0.01);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let positive = [
            ("tolerance.linear", self.tolerance.linear),
            ("tessellation.linear_deflection", self.tessellation.linear_deflection),
            ("tessellation.angular_deflection", self.tessellation.angular_deflection),
            ("boolean.tolerance", self.boolean.tolerance),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{key} must be positive, got {value}")));
            }
        }
        Ok(())
    }
}

/// A 3D solid handed out by a [`Kernel`].
///
/// Solids are values: transforms and booleans return new solids and never
/// touch their inputs.
#[derive(Debug, Clone)]
pub struct Solid {
    brep: BRepSolid,
}

impl From<BRepSolid> for Solid {
    fn from(brep: BRepSolid) -> Self {
        Self { brep }
    }
}

impl Solid {
    /// The underlying B-rep.
    pub fn brep(&self) -> &BRepSolid {
        &self.brep
    }

    /// Take the underlying B-rep.
    pub fn into_brep(self) -> BRepSolid {
        self.brep
    }

    /// Translate the solid by `(x, y, z)`.
    pub fn translate(&self, x: f64, y: f64, z: f64) -> Solid {
        self.transform(&Transform::translation(x, y, z))
    }

    /// Rotate the solid about the Z axis by `deg` degrees.
    pub fn rotate_z(&self, deg: f64) -> Solid {
        self.transform(&Transform::rotation_z(deg.to_radians()))
    }

    /// Scale the solid by `(x, y, z)`. Negative factors mirror it.
    pub fn scale(&self, x: f64, y: f64, z: f64) -> Solid {
        self.transform(&Transform::scale(x, y, z))
    }

    /// Apply an arbitrary affine transform.
    pub fn transform(&self, t: &Transform) -> Solid {
        Solid {
            brep: self.brep.transformed(t),
        }
    }

    /// True if the solid has no faces.
    pub fn is_empty(&self) -> bool {
        self.brep.is_empty()
    }

    /// Number of disjoint pieces; a union of separated solids has several.
    pub fn num_lumps(&self) -> usize {
        self.brep.lumps().len()
    }

    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.brep.faces().len()
    }

    /// Enclosed volume, exact for planar faces.
    pub fn volume(&self) -> f64 {
        self.brep.polyhedral_volume()
    }

    /// Axis-aligned box of the vertices.
    pub fn bounding_box(&self) -> Aabb3 {
        self.brep.bounding_box()
    }

    /// Volume-weighted centroid of a tessellation, or `None` for a solid
    /// without volume.
    pub fn center_of_mass(&self, params: &TessellationParams) -> Option<Point3> {
        let mesh = tessellate_solid(&self.brep, params);
        let at = |i: u32| {
            let i = i as usize * 3;
            Point3::new(
                mesh.vertices[i] as f64,
                mesh.vertices[i + 1] as f64,
                mesh.vertices[i + 2] as f64,
            )
        };
        let mut total = 0.0;
        let mut sum = Point3::origin().coords;
        for t in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (at(t[0]), at(t[1]), at(t[2]));
            let vol = a.coords.dot(&b.coords.cross(&c.coords));
            total += vol;
            sum += (a.coords + b.coords + c.coords) * vol;
        }
        if total.abs() < 1e-15 {
            return None;
        }
        Some(Point3::from(sum / (4.0 * total)))
    }
}

/// A modeling session: id counter, configuration, and boolean engine.
#[derive(Debug)]
pub struct Kernel {
    session: Session,
    config: KernelConfig,
    engine: HybridEngine,
}

impl Kernel {
    /// A kernel with the native boolean engine only.
    pub fn new(config: KernelConfig) -> Self {
        debug!(?config, "kernel created");
        Self {
            session: Session::new(),
            config,
            engine: HybridEngine::new(config.boolean),
        }
    }

    /// A kernel using an already loaded external kernel.
    pub fn with_external(config: KernelConfig, external: Arc<dyn ExternalKernel>) -> Self {
        debug!(?config, external = external.name(), "kernel created");
        Self {
            session: Session::new(),
            config,
            engine: HybridEngine::with_external(external, config.boolean),
        }
    }

    /// A kernel using the process-wide external kernel, loading it with
    /// `loader` if no earlier call has.
    pub async fn connect(config: KernelConfig, loader: &dyn KernelLoader) -> Self {
        let engine =
            HybridEngine::connect(ExternalKernelCache::process(), loader, config.boolean).await;
        debug!(?config, external = engine.has_external(), "kernel created");
        Self {
            session: Session::new(),
            config,
            engine,
        }
    }

    /// The id session shared by every solid built here.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The configuration in use.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// True when booleans may go to an external kernel.
    pub fn has_external_kernel(&self) -> bool {
        self.engine.has_external()
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// A box with corner at the origin and dimensions `(sx, sy, sz)`.
    pub fn cube(&self, sx: f64, sy: f64, sz: f64) -> Result<Solid, KernelError> {
        Ok(make_cube(&self.session, sx, sy, sz)?.into())
    }

    /// A right-corner tetrahedron with legs of length `size`.
    pub fn tetrahedron(&self, size: f64) -> Result<Solid, KernelError> {
        Ok(make_tetrahedron(&self.session, size)?.into())
    }

    /// A polyhedron from points and face index cycles.
    pub fn polyhedron(&self, points: &[Point3], faces: &[Vec<usize>]) -> Result<Solid, KernelError> {
        Ok(make_polyhedron(&self.session, points, faces)?.into())
    }

    // =========================================================================
    // CSG boolean operations
    // =========================================================================

    /// Boolean union (a ∪ b).
    pub fn union(&self, a: &Solid, b: &Solid) -> Result<Solid, KernelError> {
        self.boolean(a, b, BooleanOp::Union)
    }

    /// Boolean difference (a − b).
    pub fn subtract(&self, a: &Solid, b: &Solid) -> Result<Solid, KernelError> {
        self.boolean(a, b, BooleanOp::Subtract)
    }

    /// Boolean intersection (a ∩ b).
    pub fn intersect(&self, a: &Solid, b: &Solid) -> Result<Solid, KernelError> {
        self.boolean(a, b, BooleanOp::Intersect)
    }

    /// Run `op` through the hybrid engine.
    pub fn boolean(&self, a: &Solid, b: &Solid, op: BooleanOp) -> Result<Solid, KernelError> {
        let outcome = self.engine.boolean_operation_hybrid(&a.brep, &b.brep, op);
        match outcome.solid {
            Some(brep) => Ok(brep.into()),
            None => Err(KernelError::Boolean {
                op,
                reason: outcome.errors.join("; "),
            }),
        }
    }

    /// Time the native and external paths on the same operands.
    pub fn benchmark(&self, a: &Solid, b: &Solid, op: BooleanOp) -> BenchmarkReport {
        self.engine.benchmark(&a.brep, &b.brep, op)
    }

    // =========================================================================
    // Export & analysis
    // =========================================================================

    /// Triangulate with the configured tessellation parameters.
    pub fn tessellate(&self, solid: &Solid) -> TriangleMesh {
        tessellate_solid(&solid.brep, &self.config.tessellation)
    }

    /// Structural check of every lump of the solid.
    pub fn validate(&self, solid: &Solid) -> ValidationReport {
        let topo = &solid.brep.topology;
        let errors = solid
            .brep
            .lumps()
            .into_iter()
            .flat_map(|lump| validate_solid(topo, lump).errors)
            .collect();
        ValidationReport::from_findings(errors)
    }

    /// Total genus: each lump's genus over all of its shells, outer and
    /// void, from `V - E + F - R = 2 (S - G)`, summed across lumps.
    pub fn genus(&self, solid: &Solid) -> Result<u32, GenusError> {
        let topo = &solid.brep.topology;
        solid
            .brep
            .lumps()
            .into_iter()
            .map(|lump| solid_genus(topo, lump))
            .sum()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube() {
        let kernel = Kernel::default();
        let cube = kernel.cube(10.0, 10.0, 10.0).unwrap();
        assert!(!cube.is_empty());
        assert_eq!(cube.num_faces(), 6);
        assert_eq!(kernel.tessellate(&cube).num_triangles(), 12);
    }

    #[test]
    fn test_bad_dimension_is_error() {
        let kernel = Kernel::default();
        assert!(matches!(
            kernel.cube(0.0, 1.0, 1.0),
            Err(KernelError::Primitive(PrimitiveError::NonPositiveDimension(_)))
        ));
    }

    #[test]
    fn test_translate() {
        let cube = Kernel::default().cube(10.0, 10.0, 10.0).unwrap();
        let moved = cube.translate(100.0, 0.0, 0.0);
        let bbox = moved.bounding_box();
        assert_relative_eq!(bbox.min.x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.x, 110.0, epsilon = 1e-9);
        assert_relative_eq!(cube.bounding_box().min.x, 0.0);
    }

    #[test]
    fn test_scale_and_mirror_keep_volume_positive() {
        let cube = Kernel::default().cube(10.0, 10.0, 10.0).unwrap();
        assert_relative_eq!(cube.scale(2.0, 1.0, 1.0).volume(), 2000.0, epsilon = 1e-9);
        assert_relative_eq!(cube.scale(-1.0, 1.0, 1.0).volume(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotate_cube_volume() {
        let cube = Kernel::default().cube(10.0, 10.0, 10.0).unwrap();
        assert_relative_eq!(cube.rotate_z(37.0).volume(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cube_center_of_mass() {
        let kernel = Kernel::default();
        let cube = kernel.cube(10.0, 10.0, 10.0).unwrap();
        let com = cube.center_of_mass(&kernel.config().tessellation).unwrap();
        assert_relative_eq!(com, Point3::new(5.0, 5.0, 5.0), epsilon = 1e-4);
    }

    #[test]
    fn test_overlapping_booleans() {
        let kernel = Kernel::default();
        let a = kernel.cube(10.0, 10.0, 10.0).unwrap();
        let b = a.translate(5.0, 0.0, 0.0);
        assert_relative_eq!(kernel.union(&a, &b).unwrap().volume(), 1500.0, epsilon = 1e-6);
        assert_relative_eq!(kernel.subtract(&a, &b).unwrap().volume(), 500.0, epsilon = 1e-6);
        assert_relative_eq!(kernel.intersect(&a, &b).unwrap().volume(), 500.0, epsilon = 1e-6);
    }

    #[test]
    fn test_disjoint_union_is_two_lumps() {
        let kernel = Kernel::default();
        let a = kernel.cube(1.0, 1.0, 1.0).unwrap();
        let joined = kernel.union(&a, &a.translate(5.0, 0.0, 0.0)).unwrap();
        assert_eq!(joined.num_lumps(), 2);
        assert_eq!(joined.num_faces(), 12);
        assert_eq!(kernel.genus(&joined), Ok(0));
        assert!(kernel.validate(&joined).is_valid);
    }

    #[test]
    fn test_pocket_subtract_genus_counts_void() {
        let kernel = Kernel::default();
        let block = kernel.cube(10.0, 10.0, 10.0).unwrap();
        let pocket = kernel.cube(2.0, 2.0, 2.0).unwrap().translate(4.0, 4.0, 4.0);
        let hollow = kernel.subtract(&block, &pocket).unwrap();
        assert_relative_eq!(hollow.volume(), 992.0, epsilon = 1e-6);
        assert_eq!(hollow.num_lumps(), 1);
        assert_eq!(hollow.brep().topology.shells.len(), 2);
        assert_eq!(kernel.genus(&hollow), Ok(0));
        assert!(kernel.validate(&hollow).is_valid);
    }

    #[test]
    fn test_config_defaults() {
        let config = KernelConfig::from_toml_str("").unwrap();
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.tolerance, Tolerance::DEFAULT);
        assert!(config.boolean.use_external);
    }

    #[test]
    fn test_config_partial_override() {
        let config = KernelConfig::from_toml_str(
            r#"
            [tessellation]
            linear_deflection = 0.5
            compute_normals = false

            [boolean]
            tolerance = 1e-4
            benchmark = true
            "#,
        )
        .unwrap();
        assert_eq!(config.tessellation.linear_deflection, 0.5);
        assert!(!config.tessellation.compute_normals);
        assert_eq!(config.tessellation.angular_deflection, 0.5);
        assert_eq!(config.boolean.tolerance, 1e-4);
        assert!(config.boolean.benchmark);
        assert!(config.boolean.use_external);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            KernelConfig::from_toml_str("[boolean]\ntolerance = -1.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            KernelConfig::from_toml_str("[boolean]\ntolerance = \"tight\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}

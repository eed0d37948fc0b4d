#![warn(missing_docs)]

//! CSG boolean operations on B-rep solids for the keel kernel.
//!
//! Implements union, difference, and intersection of B-rep solids.
//!
//! The native pipeline has 4 stages:
//! 1. **AABB filter**: broadphase to find candidate face pairs
//! 2. **Splitting**: planar face/face intersection and convex splitting
//! 3. **Classification**: label fragments Outside / Inside / OnSame / OnOpposite
//! 4. **Reconstruction**: sew selected fragments into the result solid
//!
//! [`hybrid::HybridEngine`] puts an optional external kernel in front of
//! that pipeline and falls back to it whenever the external path fails.

mod api;
pub mod bbox;
pub mod classify;
pub mod external;
pub mod hybrid;
mod pipeline;
pub mod sew;
pub mod split;

pub use api::{boolean_operation, BooleanOp, BooleanOptions, BooleanOutcome};
pub use classify::FaceClassification;
pub use external::{
    ExternalKernel, ExternalKernelCache, ExternalKernelError, ExternalShape, KernelLoader,
    NoExternalKernel,
};
pub use hybrid::{BackendError, BenchmarkReport, HybridEngine, PathResult, Winner};

//! Hybrid boolean strategy: an external kernel first, the native engine
//! always as the fallback.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use keel_kernel_primitives::BRepSolid;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::external::{ExternalKernel, ExternalKernelCache, ExternalKernelError, KernelLoader};
use crate::{boolean_operation, BooleanOp, BooleanOptions, BooleanOutcome};

/// Why a backend produced no result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The backend is not loaded.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The external kernel failed.
    #[error(transparent)]
    External(#[from] ExternalKernelError),
    /// The boolean ran but produced no solid.
    #[error("boolean failed: {0}")]
    Failed(String),
}

/// One way of running a boolean operation.
pub trait BooleanBackend: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Run `op` on `a` and `b`.
    fn run(
        &self,
        a: &BRepSolid,
        b: &BRepSolid,
        op: BooleanOp,
        options: &BooleanOptions,
    ) -> Result<BooleanOutcome, BackendError>;
}

/// The in-crate split / classify / sew engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl BooleanBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn run(
        &self,
        a: &BRepSolid,
        b: &BRepSolid,
        op: BooleanOp,
        options: &BooleanOptions,
    ) -> Result<BooleanOutcome, BackendError> {
        let outcome = boolean_operation(a, b, op, options);
        if outcome.success {
            Ok(outcome)
        } else {
            Err(BackendError::Failed(outcome.errors.join("; ")))
        }
    }
}

/// Booleans delegated to an external kernel.
#[derive(Clone)]
pub struct ExternalBackend {
    kernel: Arc<dyn ExternalKernel>,
}

impl ExternalBackend {
    /// Wrap a loaded kernel.
    pub fn new(kernel: Arc<dyn ExternalKernel>) -> Self {
        Self { kernel }
    }
}

impl std::fmt::Debug for ExternalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalBackend")
            .field("kernel", &self.kernel.name())
            .finish()
    }
}

impl BooleanBackend for ExternalBackend {
    fn name(&self) -> &str {
        self.kernel.name()
    }

    fn run(
        &self,
        a: &BRepSolid,
        b: &BRepSolid,
        op: BooleanOp,
        _options: &BooleanOptions,
    ) -> Result<BooleanOutcome, BackendError> {
        let started = Instant::now();
        let convert = || -> Result<BRepSolid, ExternalKernelError> {
            let sa = self.kernel.solid_to_shape(a)?;
            let sb = self.kernel.solid_to_shape(b)?;
            let shape = self.kernel.boolean(&sa, &sb, op)?;
            self.kernel.shape_to_solid(&shape, a.session())
        };
        // the kernel is foreign code; a panic in it is one more failure
        match panic::catch_unwind(AssertUnwindSafe(convert)) {
            Ok(solid) => Ok(BooleanOutcome::solved(solid?, Vec::new(), 0).timed(started)),
            Err(payload) => Err(BackendError::Failed(format!(
                "{} panicked: {}",
                self.kernel.name(),
                panic_message(payload.as_ref())
            ))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Which path was faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// The native engine.
    Native,
    /// The external kernel.
    External,
    /// Within 10% of each other.
    Tie,
}

impl Winner {
    /// Compare two timings; a path must be more than 10% faster to win.
    pub fn decide(native: Duration, external: Duration) -> Self {
        let (n, e) = (native.as_secs_f64(), external.as_secs_f64());
        if e < n * 0.9 {
            Winner::External
        } else if n < e * 0.9 {
            Winner::Native
        } else {
            Winner::Tie
        }
    }
}

/// How one path fared in a benchmark.
#[derive(Debug, Clone, PartialEq)]
pub enum PathResult {
    /// Produced a solid in this time.
    Completed(Duration),
    /// Ran and failed.
    Failed(String),
    /// Not loaded.
    Unavailable,
}

impl PathResult {
    fn from_run(result: Result<BooleanOutcome, BackendError>, started: Instant) -> Self {
        match result {
            Ok(_) => PathResult::Completed(started.elapsed()),
            Err(e) => PathResult::Failed(e.to_string()),
        }
    }
}

/// Side-by-side timing of both paths.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    /// Native path.
    pub native: PathResult,
    /// External path.
    pub external: PathResult,
    /// The faster path, the only one that completed, or `None` if both
    /// failed.
    pub winner: Option<Winner>,
}

/// Boolean engine that prefers an external kernel when one is loaded.
#[derive(Debug)]
pub struct HybridEngine {
    native: NativeBackend,
    external: Option<ExternalBackend>,
    options: BooleanOptions,
}

impl HybridEngine {
    /// Native engine only.
    pub fn new(options: BooleanOptions) -> Self {
        Self {
            native: NativeBackend,
            external: None,
            options,
        }
    }

    /// Engine with an already loaded external kernel.
    pub fn with_external(kernel: Arc<dyn ExternalKernel>, options: BooleanOptions) -> Self {
        Self {
            native: NativeBackend,
            external: Some(ExternalBackend::new(kernel)),
            options,
        }
    }

    /// Engine using whatever `cache` yields for `loader`.
    pub async fn connect(
        cache: &ExternalKernelCache,
        loader: &dyn KernelLoader,
        options: BooleanOptions,
    ) -> Self {
        match cache.get_or_load(loader).await {
            Some(kernel) => Self::with_external(kernel, options),
            None => Self::new(options),
        }
    }

    /// True when an external kernel is attached.
    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    /// Options in use.
    pub fn options(&self) -> &BooleanOptions {
        &self.options
    }

    /// Run `op`, trying the external kernel first when enabled.
    ///
    /// Any external failure, a panic inside the kernel included, falls back
    /// to the native engine, so a missing library never fails the operation.
    #[instrument(skip_all, fields(op = ?op))]
    pub fn boolean_operation_hybrid(
        &self,
        a: &BRepSolid,
        b: &BRepSolid,
        op: BooleanOp,
    ) -> BooleanOutcome {
        if self.options.benchmark {
            self.benchmark(a, b, op);
        }
        if self.options.use_external {
            if let Some(external) = &self.external {
                match external.run(a, b, op, &self.options) {
                    Ok(outcome) => return outcome,
                    Err(e) => warn!(
                        backend = external.name(),
                        error = %e,
                        "external boolean failed, falling back to native"
                    ),
                }
            }
        }
        boolean_operation(a, b, op, &self.options)
    }

    /// Time both paths on the same operands.
    pub fn benchmark(&self, a: &BRepSolid, b: &BRepSolid, op: BooleanOp) -> BenchmarkReport {
        let started = Instant::now();
        let native = PathResult::from_run(self.native.run(a, b, op, &self.options), started);
        let external = match &self.external {
            Some(backend) => {
                let started = Instant::now();
                PathResult::from_run(backend.run(a, b, op, &self.options), started)
            }
            None => PathResult::Unavailable,
        };
        let winner = match (&native, &external) {
            (PathResult::Completed(n), PathResult::Completed(e)) => Some(Winner::decide(*n, *e)),
            (PathResult::Completed(_), _) => Some(Winner::Native),
            (_, PathResult::Completed(_)) => Some(Winner::External),
            _ => None,
        };
        info!(?op, ?native, ?external, ?winner, "boolean benchmark");
        BenchmarkReport {
            native,
            external,
            winner,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::external::mock::NativeShapes;
    use crate::external::NoExternalKernel;
    use approx::assert_relative_eq;
    use keel_kernel_primitives::make_cube;
    use keel_kernel_topo::Session;

    fn cubes() -> (BRepSolid, BRepSolid) {
        let session = Session::new();
        let a = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let b = a.translated(5.0, 0.0, 0.0);
        (a, b)
    }

    fn volume(outcome: &BooleanOutcome) -> f64 {
        outcome.solid.as_ref().unwrap().polyhedral_volume()
    }

    #[test]
    fn test_native_only_matches_direct_call() {
        let (a, b) = cubes();
        let engine = HybridEngine::new(BooleanOptions::default());
        assert!(!engine.has_external());
        for op in [BooleanOp::Union, BooleanOp::Subtract, BooleanOp::Intersect] {
            let hybrid = engine.boolean_operation_hybrid(&a, &b, op);
            let direct = boolean_operation(&a, &b, op, &BooleanOptions::default());
            assert_eq!(hybrid.success, direct.success);
            assert_relative_eq!(volume(&hybrid), volume(&direct), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_external_used_when_loaded() {
        let (a, b) = cubes();
        let kernel = Arc::new(NativeShapes::default());
        let engine = HybridEngine::with_external(kernel.clone(), BooleanOptions::default());
        let out = engine.boolean_operation_hybrid(&a, &b, BooleanOp::Union);
        assert!(out.success);
        assert_eq!(kernel.calls.load(Ordering::SeqCst), 1);
        assert_relative_eq!(volume(&out), 1500.0, epsilon = 1e-6);
    }

    #[test]
    fn test_external_disabled_by_option() {
        let (a, b) = cubes();
        let kernel = Arc::new(NativeShapes::default());
        let options = BooleanOptions {
            use_external: false,
            ..Default::default()
        };
        let engine = HybridEngine::with_external(kernel.clone(), options);
        let out = engine.boolean_operation_hybrid(&a, &b, BooleanOp::Intersect);
        assert!(out.success);
        assert_eq!(kernel.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_external_failure_falls_back() {
        let (a, b) = cubes();
        let kernel = Arc::new(NativeShapes::failing());
        let engine = HybridEngine::with_external(kernel.clone(), BooleanOptions::default());
        let out = engine.boolean_operation_hybrid(&a, &b, BooleanOp::Subtract);
        assert!(out.success);
        assert_eq!(kernel.calls.load(Ordering::SeqCst), 1);
        assert_relative_eq!(volume(&out), 500.0, epsilon = 1e-6);
    }

    #[test]
    fn test_external_panic_falls_back() {
        let (a, b) = cubes();
        let kernel = Arc::new(NativeShapes::panicking());
        let engine = HybridEngine::with_external(kernel.clone(), BooleanOptions::default());
        let out = engine.boolean_operation_hybrid(&a, &b, BooleanOp::Subtract);
        assert!(out.success);
        assert_eq!(kernel.calls.load(Ordering::SeqCst), 1);
        assert_relative_eq!(volume(&out), 500.0, epsilon = 1e-6);

        let report = engine.benchmark(&a, &b, BooleanOp::Union);
        match report.external {
            PathResult::Failed(message) => assert!(message.contains("panicked: kernel crashed")),
            other => panic!("expected a failed external path, got {other:?}"),
        }
        assert_eq!(report.winner, Some(Winner::Native));
    }

    #[tokio::test]
    async fn test_connect_without_library() {
        let cache = ExternalKernelCache::new();
        let engine =
            HybridEngine::connect(&cache, &NoExternalKernel, BooleanOptions::default()).await;
        assert!(!engine.has_external());
        let (a, b) = cubes();
        assert!(engine.boolean_operation_hybrid(&a, &b, BooleanOp::Union).success);
    }

    #[test]
    fn test_benchmark_without_external() {
        let (a, b) = cubes();
        let report = HybridEngine::new(BooleanOptions::default()).benchmark(&a, &b, BooleanOp::Union);
        assert!(matches!(report.native, PathResult::Completed(_)));
        assert_eq!(report.external, PathResult::Unavailable);
        assert_eq!(report.winner, Some(Winner::Native));
    }

    #[test]
    fn test_benchmark_with_failing_external() {
        let (a, b) = cubes();
        let engine =
            HybridEngine::with_external(Arc::new(NativeShapes::failing()), BooleanOptions::default());
        let report = engine.benchmark(&a, &b, BooleanOp::Intersect);
        assert!(matches!(report.external, PathResult::Failed(_)));
        assert_eq!(report.winner, Some(Winner::Native));
    }

    #[test]
    fn test_winner_hysteresis() {
        let ms = Duration::from_millis;
        assert_eq!(Winner::decide(ms(100), ms(50)), Winner::External);
        assert_eq!(Winner::decide(ms(50), ms(100)), Winner::Native);
        assert_eq!(Winner::decide(ms(100), ms(95)), Winner::Tie);
        assert_eq!(Winner::decide(ms(95), ms(100)), Winner::Tie);
    }
}

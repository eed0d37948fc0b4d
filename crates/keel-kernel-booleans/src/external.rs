//! Adapter for an optional external geometry library.
//!
//! The library is loaded lazily, at most once per cache. Concurrent callers
//! await the same load, and a failed load is remembered so later calls go
//! straight to the native engine.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use keel_kernel_primitives::BRepSolid;
use keel_kernel_tessellate::{TessellationParams, TriangleMesh};
use keel_kernel_topo::Session;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::BooleanOp;

/// Errors raised by an external kernel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExternalKernelError {
    /// The library could not be loaded.
    #[error("external kernel unavailable: {0}")]
    Unavailable(String),
    /// A solid could not be converted to or from the library's shapes.
    #[error("shape conversion failed: {0}")]
    Conversion(String),
    /// The library reported an error for an operation.
    #[error("external {op:?} failed: {message}")]
    Operation {
        /// Operation that failed.
        op: BooleanOp,
        /// Library message.
        message: String,
    },
    /// Meshing a shape failed.
    #[error("external meshing failed: {0}")]
    Meshing(String),
}

/// Opaque handle to a shape owned by an external kernel.
pub struct ExternalShape(Box<dyn Any + Send + Sync>);

impl ExternalShape {
    /// Wrap a library-specific shape value.
    pub fn new<T: Any + Send + Sync>(shape: T) -> Self {
        Self(Box::new(shape))
    }

    /// Borrow the wrapped value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for ExternalShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExternalShape(..)")
    }
}

/// Operations an external geometry library must provide.
pub trait ExternalKernel: Send + Sync {
    /// Library name, for logs.
    fn name(&self) -> &str;

    /// Convert a B-rep solid into a library shape.
    fn solid_to_shape(&self, solid: &BRepSolid) -> Result<ExternalShape, ExternalKernelError>;

    /// Convert a library shape back, drawing ids from `session`.
    fn shape_to_solid(
        &self,
        shape: &ExternalShape,
        session: &Session,
    ) -> Result<BRepSolid, ExternalKernelError>;

    /// Union.
    fn fuse(&self, a: &ExternalShape, b: &ExternalShape)
        -> Result<ExternalShape, ExternalKernelError>;

    /// Difference `a - b`.
    fn cut(&self, a: &ExternalShape, b: &ExternalShape)
        -> Result<ExternalShape, ExternalKernelError>;

    /// Intersection.
    fn common(
        &self,
        a: &ExternalShape,
        b: &ExternalShape,
    ) -> Result<ExternalShape, ExternalKernelError>;

    /// Triangulate a shape.
    fn mesh(
        &self,
        shape: &ExternalShape,
        params: &TessellationParams,
    ) -> Result<TriangleMesh, ExternalKernelError>;

    /// Dispatch a boolean operation.
    fn boolean(
        &self,
        a: &ExternalShape,
        b: &ExternalShape,
        op: BooleanOp,
    ) -> Result<ExternalShape, ExternalKernelError> {
        match op {
            BooleanOp::Union => self.fuse(a, b),
            BooleanOp::Subtract => self.cut(a, b),
            BooleanOp::Intersect => self.common(a, b),
        }
    }
}

/// Boxed future returned by [`KernelLoader::load`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can bring an external kernel up.
pub trait KernelLoader: Send + Sync {
    /// Load the kernel.
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn ExternalKernel>, ExternalKernelError>>;
}

/// Loader for builds without any external library.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalKernel;

impl KernelLoader for NoExternalKernel {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn ExternalKernel>, ExternalKernelError>> {
        Box::pin(async {
            Err(ExternalKernelError::Unavailable(
                "no external geometry library linked".into(),
            ))
        })
    }
}

/// Memoized external kernel load.
#[derive(Default)]
pub struct ExternalKernelCache {
    cell: OnceCell<Option<Arc<dyn ExternalKernel>>>,
}

impl fmt::Debug for ExternalKernelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalKernelCache")
            .field("initialized", &self.is_initialized())
            .field("available", &self.get().is_some())
            .finish()
    }
}

impl ExternalKernelCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn process() -> &'static ExternalKernelCache {
        static PROCESS: OnceLock<ExternalKernelCache> = OnceLock::new();
        PROCESS.get_or_init(ExternalKernelCache::new)
    }

    /// The kernel, loading it with `loader` on first use.
    ///
    /// Returns `None` when the load failed, now or on an earlier call.
    pub async fn get_or_load(&self, loader: &dyn KernelLoader) -> Option<Arc<dyn ExternalKernel>> {
        self.cell
            .get_or_init(|| async {
                match loader.load().await {
                    Ok(kernel) => {
                        info!(kernel = kernel.name(), "external kernel loaded");
                        Some(kernel)
                    }
                    Err(e) => {
                        warn!(error = %e, "external kernel unavailable, using native booleans");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// The kernel if a load already succeeded.
    pub fn get(&self) -> Option<Arc<dyn ExternalKernel>> {
        self.cell.get().and_then(Clone::clone)
    }

    /// True once a load has finished, successful or not.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::mock::NativeShapes;
    use super::*;

    struct CountingLoader {
        loads: AtomicUsize,
        succeed: bool,
    }

    impl CountingLoader {
        fn new(succeed: bool) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                succeed,
            }
        }
    }

    impl KernelLoader for CountingLoader {
        fn load(&self) -> BoxFuture<'_, Result<Arc<dyn ExternalKernel>, ExternalKernelError>> {
            Box::pin(async move {
                self.loads.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                if self.succeed {
                    Ok(Arc::new(NativeShapes::default()) as Arc<dyn ExternalKernel>)
                } else {
                    Err(ExternalKernelError::Unavailable("missing".into()))
                }
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let cache = ExternalKernelCache::new();
        let loader = CountingLoader::new(true);
        let (a, b, c) = tokio::join!(
            cache.get_or_load(&loader),
            cache.get_or_load(&loader),
            cache.get_or_load(&loader),
        );
        assert!(a.is_some() && b.is_some() && c.is_some());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get().map(|k| k.name().to_string()).as_deref(), Some("native-shapes"));
    }

    #[tokio::test]
    async fn test_failed_load_is_cached() {
        let cache = ExternalKernelCache::new();
        let loader = CountingLoader::new(false);
        assert!(!cache.is_initialized());
        assert!(cache.get_or_load(&loader).await.is_none());
        assert!(cache.get_or_load(&loader).await.is_none());
        assert!(cache.is_initialized());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_external_kernel_loader() {
        let cache = ExternalKernelCache::new();
        assert!(cache.get_or_load(&NoExternalKernel).await.is_none());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_process_cache_is_shared() {
        assert!(std::ptr::eq(
            ExternalKernelCache::process(),
            ExternalKernelCache::process()
        ));
    }

    #[test]
    fn test_shape_downcast() {
        let shape = ExternalShape::new(42_u32);
        assert_eq!(shape.downcast_ref::<u32>(), Some(&42));
        assert!(shape.downcast_ref::<f64>().is_none());
    }
}

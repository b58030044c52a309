//! Backend-context object shared by tensors and the dispatcher.

use std::sync::Arc;

use texblas_backend::{CpuBackend, TextureBackend, WgpuBackend};

use crate::error::Result;

/// Handle to a compute backend. Clones cheaply and is passed to every
/// tensor created against it.
///
/// The backend is a process-wide resource: all operations against one
/// context are serialized by the caller issuing them one at a time.
#[derive(Clone)]
pub struct Context {
    backend: Arc<dyn TextureBackend>,
}

impl Context {
    /// Create a context on the best available GPU adapter.
    pub fn new() -> Result<Self> {
        Ok(Self::with_backend(Arc::new(WgpuBackend::new()?)))
    }

    /// Create a context on the CPU reference backend. Always succeeds; used
    /// by tests and as a fallback when no adapter exists.
    pub fn cpu() -> Self {
        Self::with_backend(Arc::new(CpuBackend::new()))
    }

    /// Wrap an externally constructed backend.
    pub fn with_backend(backend: Arc<dyn TextureBackend>) -> Self {
        Self { backend }
    }

    /// Backend name (adapter info for GPU backends).
    pub fn name(&self) -> String {
        self.backend.name()
    }

    /// Number of textures currently alive on the backend.
    pub fn live_textures(&self) -> usize {
        self.backend.live_textures()
    }

    /// Padding rows required for a matrix with `rows` rows. Pure function of
    /// the row count; see [`crate::codec::pad_for`].
    pub fn pad_for(&self, rows: usize) -> usize {
        crate::codec::pad_for(rows, self.backend.row_alignment())
    }

    pub(crate) fn backend(&self) -> &dyn TextureBackend {
        &*self.backend
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("backend", &self.backend.name())
            .field("live_textures", &self.backend.live_textures())
            .finish()
    }
}

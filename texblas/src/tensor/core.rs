//! Core tensor implementation: resource ownership and host transfer.

use texblas_backend::TextureHandle;

use crate::codec;
use crate::context::Context;
use crate::dispatch;
use crate::error::{Result, TensorError};

/// A two-dimensional f32 matrix resident in GPU texture memory.
///
/// A tensor exclusively owns its backing texture. Operations that produce a
/// new tensor ([`Tensor::transpose`], [`Tensor::scale`], [`Tensor::matmul`])
/// consume their inputs; the moved-from tensor's texture is released once
/// the compute pass has been issued. [`Tensor::delete`] releases the texture
/// explicitly and detects double frees; anything still alive is released
/// when the tensor drops.
///
/// # Example
/// ```rust
/// use texblas::{Context, Tensor};
///
/// let ctx = Context::cpu();
/// let a = Tensor::new(&ctx, (3, 3), &[1., 2., 3., 5., 6., 7., 9., 10., 11.]).unwrap();
/// let mut t = a.transpose().unwrap();
/// assert_eq!(t.transfer(true).unwrap()[..3], [1., 5., 9.]);
/// ```
pub struct Tensor {
    pub(crate) shape: (usize, usize),
    pad: usize,
    pub(crate) texture: Option<TextureHandle>,
    pub(crate) ctx: Context,
}

impl Tensor {
    /// Encode a host matrix into a new GPU-resident tensor.
    ///
    /// `data` is flat row-major and must hold exactly `rows * cols` values;
    /// both dimensions must be positive.
    pub fn new(ctx: &Context, shape: (usize, usize), data: &[f32]) -> Result<Self> {
        let (rows, cols) = shape;
        if rows == 0 || cols == 0 {
            return Err(TensorError::Shape(format!(
                "tensor dimensions must be positive, got {rows}x{cols}"
            )));
        }
        let texture = codec::encode(ctx, rows, cols, data)?;
        Ok(Self::from_parts(ctx.clone(), shape, texture))
    }

    /// Wrap a texture the dispatcher produced.
    pub(crate) fn from_parts(ctx: Context, shape: (usize, usize), texture: TextureHandle) -> Self {
        let pad = ctx.pad_for(shape.0);
        Self {
            shape,
            pad,
            texture: Some(texture),
            ctx,
        }
    }

    /// Logical shape `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Logical row count.
    pub fn rows(&self) -> usize {
        self.shape.0
    }

    /// Logical column count.
    pub fn cols(&self) -> usize {
        self.shape.1
    }

    /// Padding rows appended to the physical texture. Not part of the
    /// logical shape.
    pub fn pad(&self) -> usize {
        self.pad
    }

    /// True once the backing texture has been released.
    pub fn is_released(&self) -> bool {
        self.texture.is_none()
    }

    /// The backing texture handle, for callers that drive the backend
    /// directly (tests, diagnostics).
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub(crate) fn handle(&self) -> Result<TextureHandle> {
        self.texture
            .ok_or_else(|| TensorError::Resource("use after free".into()))
    }

    /// Synchronously read the tensor back to a host array of length
    /// `rows * cols`.
    ///
    /// Blocks until all GPU work affecting the texture has completed. With
    /// `release` the texture is freed as part of the call (single-use read);
    /// otherwise the tensor stays valid for further operations. The returned
    /// array is an independent copy.
    pub fn transfer(&mut self, release: bool) -> Result<Vec<f32>> {
        let handle = self.handle()?;
        let data = codec::decode(&self.ctx, handle, self.shape.0, self.shape.1)?;
        if release {
            self.texture = None;
            self.ctx.backend().release_texture(handle)?;
        }
        Ok(data)
    }

    /// Explicitly release the backing texture.
    ///
    /// Calling this on an already-released tensor is reported rather than
    /// ignored, to surface use-after-free bugs early.
    pub fn delete(&mut self) -> Result<()> {
        match self.texture.take() {
            Some(handle) => {
                self.ctx.backend().release_texture(handle)?;
                Ok(())
            }
            None => Err(TensorError::Resource("double free".into())),
        }
    }

    /// GPU-side copy with its own texture, leaving `self` untouched. Use
    /// this to keep an operand across a consuming operation.
    pub fn duplicate(&self) -> Result<Tensor> {
        let handle = self.handle()?;
        let copy = dispatch::copy(&self.ctx, handle, self.shape.0, self.shape.1)?;
        Ok(Tensor::from_parts(self.ctx.clone(), self.shape, copy))
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        if let Some(handle) = self.texture.take() {
            if let Err(e) = self.ctx.backend().release_texture(handle) {
                log::warn!("failed to release texture {}: {e}", handle.id());
            }
        }
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("pad", &self.pad)
            .field("released", &self.is_released())
            .finish()
    }
}

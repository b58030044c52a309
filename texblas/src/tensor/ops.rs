//! Consuming operations: each enqueues a compute pass and returns a new
//! tensor wrapping the result texture.

use crate::dispatch;
use crate::error::Result;
use crate::tensor::Tensor;

impl Tensor {
    /// Transpose: returns a `(cols, rows)` tensor with
    /// `out[j, i] == self[i, j]`.
    ///
    /// Consumes `self`; the source texture is released once the pass has
    /// been issued. Output padding is computed fresh from the new row count.
    pub fn transpose(mut self) -> Result<Tensor> {
        let src = self.handle()?;
        let (rows, cols) = self.shape;
        let out = dispatch::transpose(&self.ctx, src, rows, cols)?;
        self.texture = None;
        Ok(Tensor::from_parts(self.ctx.clone(), (cols, rows), out))
    }

    /// Multiply every element by `k`. Consumes `self`; the result has the
    /// same shape.
    pub fn scale(mut self, k: f32) -> Result<Tensor> {
        let src = self.handle()?;
        let (rows, cols) = self.shape;
        let out = dispatch::scale(&self.ctx, src, rows, cols, k)?;
        self.texture = None;
        Ok(Tensor::from_parts(self.ctx.clone(), (rows, cols), out))
    }

    /// Matrix product `self (m x k) * other (k x n)`.
    ///
    /// Requires `self.cols() == other.rows()`; fails with a shape error —
    /// and issues no GPU work — otherwise. Consumes both operands on
    /// success; on a shape failure the operands are dropped with the error,
    /// which releases their textures.
    pub fn matmul(mut self, mut other: Tensor) -> Result<Tensor> {
        let a = self.handle()?;
        let b = other.handle()?;
        let out = dispatch::matmul(&self.ctx, a, self.shape, b, other.shape)?;
        self.texture = None;
        other.texture = None;
        Ok(Tensor::from_parts(
            self.ctx.clone(),
            (self.shape.0, other.shape.1),
            out,
        ))
    }
}

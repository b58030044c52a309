//! Kernel dispatcher: shape validation, output layout, pass submission, and
//! the resource-consumption policy around every kernel family.
//!
//! The bookkeeping here is identical regardless of which concrete kernel
//! runs: validate shapes before any GPU work, size the output through the
//! codec, allocate and dispatch, then release consumed inputs once their
//! data has been handed to the pass.

use texblas_backend::{KernelParams, TextureHandle};

use crate::context::Context;
use crate::error::{Result, TensorError};

fn alloc_output(ctx: &Context, rows: usize, cols: usize) -> Result<TextureHandle> {
    let pad = ctx.pad_for(rows);
    Ok(ctx
        .backend()
        .allocate_texture(cols as u32, (rows + pad) as u32)?)
}

/// Run a single-input kernel. `consume` releases the input texture after the
/// pass has been issued; the output texture never leaks on failure.
fn unary(
    ctx: &Context,
    name: &str,
    src: TextureHandle,
    out_shape: (usize, usize),
    params: KernelParams,
    consume: bool,
) -> Result<TextureHandle> {
    let out = alloc_output(ctx, out_shape.0, out_shape.1)?;
    log::debug!("dispatch {name}: src={} out={}", src.id(), out.id());
    if let Err(e) = ctx.backend().run_kernel(name, &[src], out, params) {
        let _ = ctx.backend().release_texture(out);
        return Err(e.into());
    }
    if consume {
        if let Err(e) = ctx.backend().release_texture(src) {
            let _ = ctx.backend().release_texture(out);
            return Err(e.into());
        }
    }
    Ok(out)
}

/// Transpose an `rows x cols` input; output is `cols x rows` with padding
/// computed fresh from the new row count. Consumes the input.
pub(crate) fn transpose(
    ctx: &Context,
    src: TextureHandle,
    rows: usize,
    cols: usize,
) -> Result<TextureHandle> {
    let params = KernelParams {
        m: rows as u32,
        n: cols as u32,
        ..Default::default()
    };
    unary(ctx, "transpose", src, (cols, rows), params, true)
}

/// Multiply every element by `alpha`, preserving shape. Consumes the input.
pub(crate) fn scale(
    ctx: &Context,
    src: TextureHandle,
    rows: usize,
    cols: usize,
    alpha: f32,
) -> Result<TextureHandle> {
    let params = KernelParams {
        m: rows as u32,
        n: cols as u32,
        alpha,
        ..Default::default()
    };
    unary(ctx, "scale", src, (rows, cols), params, true)
}

/// Same-shape copy (a scale by 1.0) that retains its input. Backs
/// [`crate::Tensor::duplicate`].
pub(crate) fn copy(
    ctx: &Context,
    src: TextureHandle,
    rows: usize,
    cols: usize,
) -> Result<TextureHandle> {
    let params = KernelParams {
        m: rows as u32,
        n: cols as u32,
        alpha: 1.0,
        ..Default::default()
    };
    unary(ctx, "scale", src, (rows, cols), params, false)
}

/// `a (m x k) * b (k x n)`. Fails fast with a shape error — before any GPU
/// work is issued — when the inner dimensions disagree. Consumes both inputs
/// on success.
pub(crate) fn matmul(
    ctx: &Context,
    a: TextureHandle,
    a_shape: (usize, usize),
    b: TextureHandle,
    b_shape: (usize, usize),
) -> Result<TextureHandle> {
    let (m, k) = a_shape;
    let (k2, n) = b_shape;
    if k != k2 {
        return Err(TensorError::Shape(format!(
            "matmul dimension mismatch: {m}x{k} * {k2}x{n}"
        )));
    }
    let out = alloc_output(ctx, m, n)?;
    log::debug!(
        "dispatch matmul: a={} b={} out={} ({m}x{k} * {k}x{n})",
        a.id(),
        b.id(),
        out.id()
    );
    let params = KernelParams {
        m: m as u32,
        k: k as u32,
        n: n as u32,
        alpha: 0.0,
    };
    if let Err(e) = ctx.backend().run_kernel("matmul", &[a, b], out, params) {
        let _ = ctx.backend().release_texture(out);
        return Err(e.into());
    }
    for input in [a, b] {
        if let Err(e) = ctx.backend().release_texture(input) {
            let _ = ctx.backend().release_texture(out);
            return Err(e.into());
        }
    }
    Ok(out)
}

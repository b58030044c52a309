//! Texture codec: the encode/decode contract between host float arrays and
//! padded texture layouts.
//!
//! A `rows x cols` row-major matrix is stored as a texture `cols` texels
//! wide and `rows + pad` texels tall, one f32 per texel. `pad` is derived
//! from the row count alone and evaluated identically on every encode,
//! decode, and kernel-output allocation — this is the single place that
//! computes it. Pad rows are zero-filled and never surface as logical data.

use texblas_backend::TextureHandle;

use crate::context::Context;
use crate::error::{Result, TensorError};

/// Smallest non-negative number of rows to append so that `rows + pad` is a
/// multiple of `block`. Zero when `rows` is already aligned.
pub fn pad_for(rows: usize, block: usize) -> usize {
    debug_assert!(block > 0);
    (block - rows % block) % block
}

/// Encode a host matrix into a freshly allocated texture of physical size
/// `cols x (rows + pad)`.
pub fn encode(ctx: &Context, rows: usize, cols: usize, data: &[f32]) -> Result<TextureHandle> {
    if data.len() != rows * cols {
        return Err(TensorError::Shape(format!(
            "data length {} does not match {}x{} matrix",
            data.len(),
            rows,
            cols
        )));
    }
    let pad = ctx.pad_for(rows);
    let backend = ctx.backend();
    let handle = backend.allocate_texture(cols as u32, (rows + pad) as u32)?;

    let mut texels = Vec::with_capacity((rows + pad) * cols);
    texels.extend_from_slice(data);
    texels.resize((rows + pad) * cols, 0.0);
    if let Err(e) = backend.write_pixels(handle, bytemuck::cast_slice(&texels)) {
        let _ = backend.release_texture(handle);
        return Err(e.into());
    }
    Ok(handle)
}

/// Decode a texture back to a `rows * cols` host array, stripping pad rows.
///
/// Synchronization barrier: blocks until all GPU work affecting the texture
/// has completed. Exact inverse of [`encode`] when no kernel ran in between.
pub fn decode(ctx: &Context, handle: TextureHandle, rows: usize, cols: usize) -> Result<Vec<f32>> {
    let pad = ctx.pad_for(rows);
    let bytes = ctx
        .backend()
        .read_pixels(handle, cols as u32, (rows + pad) as u32)?;
    let mut texels: Vec<f32> = bytemuck::cast_slice(&bytes).to_vec();
    texels.truncate(rows * cols);
    Ok(texels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use texblas_backend::ROW_BLOCK;

    #[test]
    fn pad_is_deterministic_and_zero_for_aligned() {
        for rows in 1..64 {
            let pad = pad_for(rows, ROW_BLOCK);
            assert_eq!(pad, pad_for(rows, ROW_BLOCK));
            assert_eq!((rows + pad) % ROW_BLOCK, 0);
            assert!(pad < ROW_BLOCK);
            if rows % ROW_BLOCK == 0 {
                assert_eq!(pad, 0);
            }
        }
        assert_eq!(pad_for(3, 4), 1);
        assert_eq!(pad_for(4, 4), 0);
    }

    #[test]
    fn round_trip_is_bit_exact_with_padding() {
        let ctx = Context::cpu();
        // 3 rows forces pad = 1. Values chosen to be awkward in f32.
        let data: Vec<f32> = (0..15)
            .map(|i| (i as f32 + 0.1) * 1.000_000_1e-3)
            .collect();
        let handle = encode(&ctx, 3, 5, &data).unwrap();
        let back = decode(&ctx, handle, 3, 5).unwrap();
        assert_eq!(data.len(), back.len());
        for (a, b) in data.iter().zip(back.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        ctx.backend().release_texture(handle).unwrap();
    }

    #[test]
    fn round_trip_is_bit_exact_without_padding() {
        let ctx = Context::cpu();
        let data: Vec<f32> = (0..8).map(|i| f32::from_bits(0x3f80_0001 + i)).collect();
        let handle = encode(&ctx, 4, 2, &data).unwrap();
        let back = decode(&ctx, handle, 4, 2).unwrap();
        for (a, b) in data.iter().zip(back.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        ctx.backend().release_texture(handle).unwrap();
    }

    #[test]
    fn encode_rejects_length_mismatch() {
        let ctx = Context::cpu();
        let err = encode(&ctx, 2, 2, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.is_shape());
        assert_eq!(ctx.live_textures(), 0);
    }
}

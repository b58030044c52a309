//! End-to-end tensor tests against the CPU reference backend.
//!
//! One test at the bottom runs the same pipeline on a real GPU adapter and
//! is ignored by default.

use std::sync::Arc;

use texblas::backend::{CpuBackend, TextureBackend};
use texblas::{Context, Tensor, TensorError};
use texblas_loader::assert::{allclose, ATOL, RTOL};

fn host_transpose(rows: usize, cols: usize, data: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0; data.len()];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = data[i * cols + j];
        }
    }
    out
}

#[test]
fn transpose_3x3() {
    let ctx = Context::cpu();
    let x = [1.0, 2.0, 3.0, 5.0, 6.0, 7.0, 9.0, 10.0, 11.0];
    let expected = [1.0, 5.0, 9.0, 2.0, 6.0, 10.0, 3.0, 7.0, 11.0];

    let t0 = Tensor::new(&ctx, (3, 3), &x).unwrap();
    let mut t1 = t0.transpose().unwrap();
    let result = t1.transfer(true).unwrap();

    allclose(&result, &expected, None, RTOL, ATOL).unwrap();
    assert_eq!(ctx.live_textures(), 0);
}

#[test]
fn transpose_3x4() {
    let ctx = Context::cpu();
    let x = [
        1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
    ];
    let expected = [
        1.0, 5.0, 9.0, 2.0, 6.0, 10.0, 3.0, 7.0, 11.0, 4.0, 8.0, 12.0,
    ];

    let t0 = Tensor::new(&ctx, (3, 4), &x).unwrap();
    let mut t1 = t0.transpose().unwrap();
    assert_eq!(t1.shape(), (4, 3));
    let result = t1.transfer(true).unwrap();

    allclose(&result, &expected, None, RTOL, ATOL).unwrap();
}

#[test]
fn transposed_texture_is_padded_with_zero_rows() {
    // Drive the backend directly to inspect the physical texture behind a
    // 3x3 transpose result: 3 pad rows' worth of zeros after the logical
    // data, since pad_for(3) == 1.
    let backend = Arc::new(CpuBackend::new());
    let ctx = Context::with_backend(backend.clone());
    assert_eq!(ctx.pad_for(3), 1);

    let x = [1.0, 2.0, 3.0, 5.0, 6.0, 7.0, 9.0, 10.0, 11.0];
    let expected = [1.0, 5.0, 9.0, 2.0, 6.0, 10.0, 3.0, 7.0, 11.0];
    let mut padded = expected.to_vec();
    padded.extend_from_slice(&[0.0; 3]);

    let t1 = Tensor::new(&ctx, (3, 3), &x).unwrap().transpose().unwrap();
    let handle = t1.texture().unwrap();
    let bytes = backend.read_pixels(handle, 3, 4).unwrap();
    let physical: &[f32] = bytemuck::cast_slice(&bytes);

    allclose(physical, &padded, None, RTOL, ATOL).unwrap();
}

#[test]
fn transpose_is_an_involution() {
    let ctx = Context::cpu();
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let (rows, cols) = (7, 5);
    let data: Vec<f32> = (0..rows * cols).map(|_| rng.gen_range(-10.0..10.0)).collect();

    let t = Tensor::new(&ctx, (rows, cols), &data).unwrap();
    let mut back = t.transpose().unwrap().transpose().unwrap();
    assert_eq!(back.shape(), (rows, cols));
    let result = back.transfer(true).unwrap();
    // Exact: transposing moves values, it never rounds them.
    assert_eq!(result, data);
}

#[test]
fn transpose_swaps_every_index() {
    let ctx = Context::cpu();
    let (rows, cols) = (4, 6);
    let data: Vec<f32> = (0..rows * cols).map(|i| i as f32).collect();

    let mut t = Tensor::new(&ctx, (rows, cols), &data)
        .unwrap()
        .transpose()
        .unwrap();
    let out = t.transfer(true).unwrap();
    for i in 0..rows {
        for j in 0..cols {
            assert_eq!(out[j * rows + i], data[i * cols + j]);
        }
    }
    assert_eq!(out, host_transpose(rows, cols, &data));
}

#[test]
fn scale_multiplies_elementwise() {
    let ctx = Context::cpu();
    let data = [1.0, -2.0, 3.5, 0.0, 4.0, -0.25];
    let expected = [2.5, -5.0, 8.75, 0.0, 10.0, -0.625];

    let mut t = Tensor::new(&ctx, (2, 3), &data)
        .unwrap()
        .scale(2.5)
        .unwrap();
    assert_eq!(t.shape(), (2, 3));
    let result = t.transfer(true).unwrap();
    allclose(&result, &expected, None, RTOL, ATOL).unwrap();
}

#[test]
fn matmul_small_known_product() {
    let ctx = Context::cpu();
    // [[1,2,3],[4,5,6]] * [[7,8],[9,10],[11,12]] = [[58,64],[139,154]]
    let a = Tensor::new(&ctx, (2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let b = Tensor::new(&ctx, (3, 2), &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();

    let mut c = a.matmul(b).unwrap();
    assert_eq!(c.shape(), (2, 2));
    let result = c.transfer(true).unwrap();
    allclose(&result, &[58.0, 64.0, 139.0, 154.0], None, RTOL, ATOL).unwrap();
    assert_eq!(ctx.live_textures(), 0);
}

#[test]
fn matmul_matches_host_reference() {
    let ctx = Context::cpu();
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let (m, k, n) = (5, 7, 3);
    let a: Vec<f32> = (0..m * k).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let b: Vec<f32> = (0..k * n).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut expected = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            for t in 0..k {
                expected[i * n + j] += a[i * k + t] * b[t * n + j];
            }
        }
    }

    let ta = Tensor::new(&ctx, (m, k), &a).unwrap();
    let tb = Tensor::new(&ctx, (k, n), &b).unwrap();
    let result = ta.matmul(tb).unwrap().transfer(true).unwrap();
    allclose(&result, &expected, None, RTOL, ATOL).unwrap();
}

#[test]
fn matmul_shape_mismatch_fails_before_gpu_work() {
    let ctx = Context::cpu();
    let a = Tensor::new(&ctx, (2, 3), &[0.0; 6]).unwrap();
    let b = Tensor::new(&ctx, (2, 2), &[0.0; 4]).unwrap();
    assert_eq!(ctx.live_textures(), 2);

    let err = a.matmul(b).unwrap_err();
    assert!(matches!(err, TensorError::Shape(_)), "{err}");
    // No output texture was ever allocated; the moved operands were dropped
    // and released alongside the error.
    assert_eq!(ctx.live_textures(), 0);
}

#[test]
fn delete_twice_is_a_double_free() {
    let ctx = Context::cpu();
    let mut t = Tensor::new(&ctx, (4, 4), &[0.5; 16]).unwrap();
    t.delete().unwrap();
    assert!(t.is_released());

    let err = t.delete().unwrap_err();
    assert!(matches!(err, TensorError::Resource(_)), "{err}");
}

#[test]
fn operations_after_release_fail_with_resource_error() {
    let ctx = Context::cpu();
    let mut t = Tensor::new(&ctx, (3, 3), &[1.0; 9]).unwrap();
    let _ = t.transfer(true).unwrap();

    assert!(matches!(t.transfer(false), Err(TensorError::Resource(_))));
    assert!(matches!(t.duplicate(), Err(TensorError::Resource(_))));
    assert!(matches!(t.transpose(), Err(TensorError::Resource(_))));
}

#[test]
fn transfer_without_release_keeps_tensor_usable() {
    let ctx = Context::cpu();
    let data = [1.0, 2.0, 3.0, 4.0];
    let mut t = Tensor::new(&ctx, (2, 2), &data).unwrap();

    let first = t.transfer(false).unwrap();
    assert_eq!(first, data);
    assert!(!t.is_released());

    let mut doubled = t.scale(2.0).unwrap();
    assert_eq!(doubled.transfer(true).unwrap(), [2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn duplicate_survives_consuming_the_original() {
    let ctx = Context::cpu();
    let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let t = Tensor::new(&ctx, (2, 3), &data).unwrap();

    let dup = t.duplicate().unwrap();
    assert_eq!(ctx.live_textures(), 2);

    // Consume the original; the duplicate's texture is untouched.
    let mut transposed = t.transpose().unwrap();
    let _ = transposed.transfer(true).unwrap();

    let mut dup = dup;
    assert_eq!(dup.transfer(true).unwrap(), data);
    assert_eq!(ctx.live_textures(), 0);
}

#[test]
fn chained_operations_release_every_intermediate() {
    let ctx = Context::cpu();
    let data: Vec<f32> = (0..12).map(|i| i as f32).collect();

    let result = Tensor::new(&ctx, (3, 4), &data)
        .unwrap()
        .transpose()
        .unwrap()
        .scale(-1.0)
        .unwrap()
        .transpose()
        .unwrap()
        .transfer(true)
        .unwrap();

    let expected: Vec<f32> = data.iter().map(|v| -v).collect();
    allclose(&result, &expected, None, RTOL, ATOL).unwrap();
    assert_eq!(ctx.live_textures(), 0);
}

#[test]
fn zero_dimension_is_rejected() {
    let ctx = Context::cpu();
    assert!(matches!(
        Tensor::new(&ctx, (0, 3), &[]),
        Err(TensorError::Shape(_))
    ));
    assert!(matches!(
        Tensor::new(&ctx, (2, 2), &[1.0, 2.0, 3.0]),
        Err(TensorError::Shape(_))
    ));
    assert_eq!(ctx.live_textures(), 0);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_pipeline_matches_cpu_reference() {
    let gpu = Context::new().unwrap();
    let cpu = Context::cpu();
    let data: Vec<f32> = (0..35).map(|i| (i as f32 * 0.37).sin()).collect();

    let run = |ctx: &Context| -> Vec<f32> {
        let a = Tensor::new(ctx, (5, 7), &data).unwrap();
        let b = a.duplicate().unwrap();
        let at = a.transpose().unwrap();
        at.matmul(b).unwrap().scale(0.5).unwrap().transfer(true).unwrap()
    };

    let expected = run(&cpu);
    let result = run(&gpu);
    allclose(&result, &expected, None, RTOL, ATOL).unwrap();
    assert_eq!(gpu.live_textures(), 0);
}

//! GPU compute kernels (WGSL).
//!
//! Each kernel family reads its inputs as `texture_2d<f32>` and writes a
//! `r32float` storage texture. A texture is one logical matrix: width is the
//! column count, height is the row count plus alignment padding. Pad rows of
//! every output are written as zero.

pub const KERNELS_WGSL: &str = r#"
// Per-dispatch parameters. Field meaning is per-kernel: m/k/n are the
// logical (unpadded) dimensions of the inputs, alpha is the scalar for
// the scale kernel.
struct Params {
    m: u32,
    k: u32,
    n: u32,
    alpha: f32,
}

// --- transpose: out[j, i] = in[i, j] ---
// src is m x n logical; dst is n x m logical.

@group(0) @binding(0) var tr_src: texture_2d<f32>;
@group(0) @binding(1) var tr_dst: texture_storage_2d<r32float, write>;
@group(0) @binding(2) var<uniform> tr_params: Params;

@compute @workgroup_size(16, 16, 1)
fn transpose(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(tr_dst);
    if (gid.x >= dims.x || gid.y >= dims.y) { return; }
    var v = 0.0;
    // Rows at or past n are alignment padding and stay zero.
    if (gid.y < tr_params.n && gid.x < tr_params.m) {
        v = textureLoad(tr_src, vec2<i32>(i32(gid.y), i32(gid.x)), 0).r;
    }
    textureStore(tr_dst, vec2<i32>(i32(gid.x), i32(gid.y)), vec4<f32>(v, 0.0, 0.0, 0.0));
}

// --- scale: out = alpha * in, same layout ---

@group(0) @binding(0) var sc_src: texture_2d<f32>;
@group(0) @binding(1) var sc_dst: texture_storage_2d<r32float, write>;
@group(0) @binding(2) var<uniform> sc_params: Params;

@compute @workgroup_size(16, 16, 1)
fn scale(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(sc_dst);
    if (gid.x >= dims.x || gid.y >= dims.y) { return; }
    let v = textureLoad(sc_src, vec2<i32>(i32(gid.x), i32(gid.y)), 0).r;
    textureStore(sc_dst, vec2<i32>(i32(gid.x), i32(gid.y)),
                 vec4<f32>(v * sc_params.alpha, 0.0, 0.0, 0.0));
}

// --- matmul: out = a (m x k) * b (k x n) ---

@group(0) @binding(0) var mm_a: texture_2d<f32>;
@group(0) @binding(1) var mm_b: texture_2d<f32>;
@group(0) @binding(2) var mm_dst: texture_storage_2d<r32float, write>;
@group(0) @binding(3) var<uniform> mm_params: Params;

@compute @workgroup_size(16, 16, 1)
fn matmul(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(mm_dst);
    if (gid.x >= dims.x || gid.y >= dims.y) { return; }
    var acc = 0.0;
    if (gid.y < mm_params.m) {
        for (var t = 0u; t < mm_params.k; t = t + 1u) {
            let a = textureLoad(mm_a, vec2<i32>(i32(t), i32(gid.y)), 0).r;
            let b = textureLoad(mm_b, vec2<i32>(i32(gid.x), i32(t)), 0).r;
            acc = acc + a * b;
        }
    }
    textureStore(mm_dst, vec2<i32>(i32(gid.x), i32(gid.y)), vec4<f32>(acc, 0.0, 0.0, 0.0));
}
"#;

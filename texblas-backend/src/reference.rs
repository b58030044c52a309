//! Host-memory reference backend.
//!
//! Implements the exact kernel contract of the WGSL kernels against plain
//! `Vec<f32>` storage. Lets the core engine and its test suite run on
//! machines with no GPU adapter, and doubles as the fixture for verifying
//! dispatcher bookkeeping (shape validation, release accounting) without
//! real GPU state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::{BackendError, KernelParams, TextureBackend, TextureHandle, ROW_BLOCK};

#[derive(Debug, Clone)]
struct CpuTexture {
    width: u32,
    height: u32,
    texels: Vec<f32>,
}

impl CpuTexture {
    fn at(&self, x: u32, y: u32) -> f32 {
        self.texels[(y * self.width + x) as usize]
    }
}

/// CPU implementation of [`TextureBackend`].
pub struct CpuBackend {
    textures: Mutex<HashMap<u64, CpuTexture>>,
    next_id: AtomicU64,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lookup(&self, handle: TextureHandle) -> Result<CpuTexture, BackendError> {
        self.textures
            .lock()
            .expect("texture registry poisoned")
            .get(&handle.id())
            .cloned()
            .ok_or(BackendError::InvalidHandle(handle.id()))
    }

    fn store(&self, handle: TextureHandle, texture: CpuTexture) {
        self.textures
            .lock()
            .expect("texture registry poisoned")
            .insert(handle.id(), texture);
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureBackend for CpuBackend {
    fn name(&self) -> String {
        "cpu-reference".to_string()
    }

    fn row_alignment(&self) -> usize {
        ROW_BLOCK
    }

    fn allocate_texture(&self, width: u32, height: u32) -> Result<TextureHandle, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.textures.lock().expect("texture registry poisoned").insert(
            id,
            CpuTexture {
                width,
                height,
                texels: vec![0.0; (width * height) as usize],
            },
        );
        Ok(TextureHandle(id))
    }

    fn write_pixels(&self, handle: TextureHandle, bytes: &[u8]) -> Result<(), BackendError> {
        let mut registry = self.textures.lock().expect("texture registry poisoned");
        let texture = registry
            .get_mut(&handle.id())
            .ok_or(BackendError::InvalidHandle(handle.id()))?;
        let expected = texture.texels.len() * 4;
        if bytes.len() != expected {
            return Err(BackendError::BadLength {
                expected,
                got: bytes.len(),
            });
        }
        texture.texels.copy_from_slice(bytemuck::cast_slice(bytes));
        Ok(())
    }

    fn read_pixels(
        &self,
        handle: TextureHandle,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BackendError> {
        let texture = self.lookup(handle)?;
        let expected = (width * height) as usize;
        if texture.texels.len() != expected {
            return Err(BackendError::BadLength {
                expected: expected * 4,
                got: texture.texels.len() * 4,
            });
        }
        Ok(bytemuck::cast_slice(&texture.texels).to_vec())
    }

    fn run_kernel(
        &self,
        name: &str,
        inputs: &[TextureHandle],
        output: TextureHandle,
        params: KernelParams,
    ) -> Result<(), BackendError> {
        let mut out = self.lookup(output)?;
        match name {
            "transpose" => {
                let src = self.lookup(inputs[0])?;
                let (m, n) = (params.m, params.n);
                for oy in 0..out.height {
                    for ox in 0..out.width {
                        let v = if oy < n && ox < m { src.at(oy, ox) } else { 0.0 };
                        out.texels[(oy * out.width + ox) as usize] = v;
                    }
                }
            }
            "scale" => {
                let src = self.lookup(inputs[0])?;
                for (dst, s) in out.texels.iter_mut().zip(src.texels.iter()) {
                    *dst = params.alpha * s;
                }
            }
            "matmul" => {
                let a = self.lookup(inputs[0])?;
                let b = self.lookup(inputs[1])?;
                let (m, k) = (params.m, params.k);
                for oy in 0..out.height {
                    for ox in 0..out.width {
                        let mut acc = 0.0f32;
                        if oy < m {
                            for t in 0..k {
                                acc += a.at(t, oy) * b.at(ox, t);
                            }
                        }
                        out.texels[(oy * out.width + ox) as usize] = acc;
                    }
                }
            }
            other => return Err(BackendError::UnknownKernel(other.to_string())),
        }
        self.store(output, out);
        Ok(())
    }

    fn release_texture(&self, handle: TextureHandle) -> Result<(), BackendError> {
        self.textures
            .lock()
            .expect("texture registry poisoned")
            .remove(&handle.id())
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle(handle.id()))
    }

    fn live_textures(&self) -> usize {
        self.textures.lock().expect("texture registry poisoned").len()
    }
}

impl std::fmt::Debug for CpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuBackend")
            .field("live_textures", &self.live_textures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(backend: &CpuBackend, width: u32, height: u32, data: &[f32]) -> TextureHandle {
        let handle = backend.allocate_texture(width, height).unwrap();
        backend
            .write_pixels(handle, bytemuck::cast_slice(data))
            .unwrap();
        handle
    }

    #[test]
    fn transpose_kernel_swaps_indices() {
        let backend = CpuBackend::new();
        // 2x3 logical, padded to height 4.
        let src = upload(
            &backend,
            3,
            4,
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        );
        let dst = backend.allocate_texture(2, 4).unwrap();
        backend
            .run_kernel(
                "transpose",
                &[src],
                dst,
                KernelParams {
                    m: 2,
                    n: 3,
                    ..Default::default()
                },
            )
            .unwrap();
        let bytes = backend.read_pixels(dst, 2, 4).unwrap();
        let out: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(out, &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn matmul_kernel_ignores_pad_rows() {
        let backend = CpuBackend::new();
        // a = [[1, 2], [3, 4]], one pad row each to height 4.
        let a = upload(&backend, 2, 4, &[1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
        let b = upload(&backend, 2, 4, &[5.0, 6.0, 7.0, 8.0, 0.0, 0.0, 0.0, 0.0]);
        let dst = backend.allocate_texture(2, 4).unwrap();
        backend
            .run_kernel(
                "matmul",
                &[a, b],
                dst,
                KernelParams {
                    m: 2,
                    k: 2,
                    n: 2,
                    ..Default::default()
                },
            )
            .unwrap();
        let bytes = backend.read_pixels(dst, 2, 4).unwrap();
        let out: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(&out[..4], &[19.0, 22.0, 43.0, 50.0]);
        assert_eq!(&out[4..], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn release_twice_is_an_error() {
        let backend = CpuBackend::new();
        let handle = backend.allocate_texture(4, 4).unwrap();
        backend.release_texture(handle).unwrap();
        assert!(matches!(
            backend.release_texture(handle),
            Err(BackendError::InvalidHandle(_))
        ));
        assert_eq!(backend.live_textures(), 0);
    }
}

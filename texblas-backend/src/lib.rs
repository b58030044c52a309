//! Texture-based compute backends for texblas.
//!
//! The core engine never talks to the GPU directly: it goes through the
//! [`TextureBackend`] trait, which models the four capabilities the engine
//! needs — allocate/release a 2D float texture, fill it, run a named compute
//! kernel over textures, and read a texture back into host memory.
//!
//! Two implementations live here: [`WgpuBackend`], which runs the WGSL
//! kernels in `kernels.rs` as wgpu compute passes over `R32Float` textures,
//! and [`reference::CpuBackend`], which executes the same kernel contract on
//! host vectors and makes the whole stack testable without a GPU adapter.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use wgpu::util::DeviceExt;

pub use wgpu; // Re-export wgpu for downstream crates

mod kernels;
pub mod reference;

pub use reference::CpuBackend;

/// Row counts are padded up to a multiple of this block before a texture is
/// allocated. Every backend reports it through [`TextureBackend::row_alignment`].
pub const ROW_BLOCK: usize = 4;

/// Kernel names every backend must implement.
pub const KERNEL_NAMES: [&str; 3] = ["transpose", "scale", "matmul"];

/// Opaque handle to a backend-owned texture.
///
/// Only meaningful to the backend that issued it; using it against another
/// backend (or after release) fails with [`BackendError::InvalidHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u64);

impl TextureHandle {
    /// Raw id, for diagnostics only.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Per-dispatch kernel parameters. Must match the WGSL `Params` struct.
///
/// `m`/`k`/`n` are the logical (unpadded) dimensions of the kernel's inputs;
/// `alpha` is the scalar for the `scale` kernel and ignored elsewhere.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelParams {
    pub m: u32,
    pub k: u32,
    pub n: u32,
    pub alpha: f32,
}

/// Errors surfaced by a backend. Not recoverable by retry.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    RequestDevice(String),
    #[error("invalid or released texture handle: {0}")]
    InvalidHandle(u64),
    #[error("unknown kernel: {0}")]
    UnknownKernel(String),
    #[error("pixel data length mismatch: expected {expected} bytes, got {got}")]
    BadLength { expected: usize, got: usize },
    #[error("texture readback failed: {0}")]
    Readback(String),
}

/// The capability surface the core engine dispatches against.
///
/// All methods are synchronous from the caller's perspective; `read_pixels`
/// is the only synchronization barrier and blocks until every queued pass
/// touching the handle has completed.
pub trait TextureBackend: Send + Sync {
    /// Human-readable backend name (adapter info for GPU backends).
    fn name(&self) -> String;

    /// Row-count alignment block required of every texture this backend runs
    /// kernels over.
    fn row_alignment(&self) -> usize;

    /// Allocate a `width x height` f32 texture. Contents are unspecified
    /// until written.
    fn allocate_texture(&self, width: u32, height: u32) -> Result<TextureHandle, BackendError>;

    /// Fill an allocated texture with raw little-endian f32 bytes
    /// (`width * height * 4` of them, row-major).
    fn write_pixels(&self, handle: TextureHandle, bytes: &[u8]) -> Result<(), BackendError>;

    /// Read the full physical texture back as raw bytes. Blocks until all
    /// GPU work affecting the texture has completed.
    fn read_pixels(
        &self,
        handle: TextureHandle,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BackendError>;

    /// Execute a named kernel with `inputs` bound as sampling textures and
    /// `output` as the write target.
    fn run_kernel(
        &self,
        name: &str,
        inputs: &[TextureHandle],
        output: TextureHandle,
        params: KernelParams,
    ) -> Result<(), BackendError>;

    /// Free a texture. Releasing the same handle twice is an error.
    fn release_texture(&self, handle: TextureHandle) -> Result<(), BackendError>;

    /// Number of currently live textures. Used for leak accounting.
    fn live_textures(&self) -> usize;
}

/// wgpu-based backend: one compute pipeline per kernel name, textures stored
/// as `R32Float`, readback through a mapped staging buffer.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    pipelines: HashMap<&'static str, wgpu::ComputePipeline>,
    textures: Mutex<HashMap<u64, Arc<wgpu::Texture>>>,
    next_id: AtomicU64,
}

impl WgpuBackend {
    /// Create a backend on the best available adapter.
    pub fn new() -> Result<Self, BackendError> {
        pollster::block_on(Self::new_async())
    }

    /// Async version of [`WgpuBackend::new`].
    pub async fn new_async() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(BackendError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("texblas device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| BackendError::RequestDevice(e.to_string()))?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("texblas kernels"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(kernels::KERNELS_WGSL)),
        });

        let mut pipelines = HashMap::new();
        for name in KERNEL_NAMES {
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: None,
                module: &module,
                entry_point: name,
                compilation_options: Default::default(),
                cache: None,
            });
            pipelines.insert(name, pipeline);
        }

        log::info!(
            "texblas backend: {} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        Ok(Self {
            device,
            queue,
            adapter_info: adapter.get_info(),
            pipelines,
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn lookup(&self, handle: TextureHandle) -> Result<Arc<wgpu::Texture>, BackendError> {
        self.textures
            .lock()
            .expect("texture registry poisoned")
            .get(&handle.0)
            .cloned()
            .ok_or(BackendError::InvalidHandle(handle.0))
    }

    /// 16x16 tile dispatch size over a texture's physical dimensions.
    fn workgroups_2d(width: u32, height: u32) -> (u32, u32) {
        ((width + 15) / 16, (height + 15) / 16)
    }
}

impl TextureBackend for WgpuBackend {
    fn name(&self) -> String {
        format!("{} ({:?})", self.adapter_info.name, self.adapter_info.backend)
    }

    fn row_alignment(&self) -> usize {
        ROW_BLOCK
    }

    fn allocate_texture(&self, width: u32, height: u32) -> Result<TextureHandle, BackendError> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texblas texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.textures
            .lock()
            .expect("texture registry poisoned")
            .insert(id, Arc::new(texture));
        Ok(TextureHandle(id))
    }

    fn write_pixels(&self, handle: TextureHandle, bytes: &[u8]) -> Result<(), BackendError> {
        let texture = self.lookup(handle)?;
        let (width, height) = (texture.width(), texture.height());
        let expected = (width * height * 4) as usize;
        if bytes.len() != expected {
            return Err(BackendError::BadLength {
                expected,
                got: bytes.len(),
            });
        }
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn read_pixels(
        &self,
        handle: TextureHandle,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BackendError> {
        let texture = self.lookup(handle)?;

        // Texture-to-buffer copies require 256-byte row alignment; copy with
        // padded rows and strip on the host.
        let unpadded_bpr = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bpr = unpadded_bpr.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texblas staging"),
            size: (padded_bpr * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        match pollster::block_on(rx.receive()) {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(BackendError::Readback(e.to_string())),
            None => return Err(BackendError::Readback("map_async dropped".into())),
        }

        let mapped = slice.get_mapped_range();
        let mut out = Vec::with_capacity((unpadded_bpr * height) as usize);
        for row in 0..height {
            let start = (row * padded_bpr) as usize;
            out.extend_from_slice(&mapped[start..start + unpadded_bpr as usize]);
        }
        drop(mapped);
        staging.unmap();
        Ok(out)
    }

    fn run_kernel(
        &self,
        name: &str,
        inputs: &[TextureHandle],
        output: TextureHandle,
        params: KernelParams,
    ) -> Result<(), BackendError> {
        let pipeline = self
            .pipelines
            .get(name)
            .ok_or_else(|| BackendError::UnknownKernel(name.to_string()))?;

        let input_textures = inputs
            .iter()
            .map(|&h| self.lookup(h))
            .collect::<Result<Vec<_>, _>>()?;
        let output_texture = self.lookup(output)?;

        let input_views: Vec<wgpu::TextureView> = input_textures
            .iter()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()))
            .collect();
        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kernel params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        // Binding order: inputs, output, params.
        let mut entries = Vec::with_capacity(inputs.len() + 2);
        for (i, view) in input_views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: input_views.len() as u32,
            resource: wgpu::BindingResource::TextureView(&output_view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: input_views.len() as u32 + 1,
            resource: params_buffer.as_entire_binding(),
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(name),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(name),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (wx, wy) = Self::workgroups_2d(output_texture.width(), output_texture.height());
            pass.dispatch_workgroups(wx, wy, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn release_texture(&self, handle: TextureHandle) -> Result<(), BackendError> {
        let texture = self
            .textures
            .lock()
            .expect("texture registry poisoned")
            .remove(&handle.0)
            .ok_or(BackendError::InvalidHandle(handle.0))?;
        texture.destroy();
        Ok(())
    }

    fn live_textures(&self) -> usize {
        self.textures.lock().expect("texture registry poisoned").len()
    }
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter_info.name)
            .field("live_textures", &self.live_textures())
            .finish()
    }
}

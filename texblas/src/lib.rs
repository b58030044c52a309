//! # texblas — dense matrix compute over GPU texture memory
//!
//! texblas represents two-dimensional f32 matrices as GPU textures and runs
//! linear algebra (transpose, scalar scale, matrix multiply) as compute
//! passes over that texture data. It targets programmable-GPU environments
//! through the [`texblas_backend::TextureBackend`] trait, so the same engine
//! runs on wgpu or on the bundled CPU reference backend.
//!
//! ## Quick start
//!
//! ```rust
//! use texblas::{Context, Tensor};
//!
//! let ctx = Context::cpu(); // or Context::new()? for a real GPU
//! let a = Tensor::new(&ctx, (2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! let mut b = a.transpose().unwrap();
//! let data = b.transfer(true).unwrap();
//! assert_eq!(data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
//! ```
//!
//! ## Ownership model
//!
//! Every [`Tensor`] exclusively owns one backend texture. Operations that
//! produce a new tensor consume their inputs (Rust moves) and release the
//! input textures once the compute pass has been issued; callers who need to
//! keep an operand duplicate it first. `transfer` is the only
//! synchronization barrier, and `delete` detects double frees.

#![warn(missing_docs)]

pub mod codec;
mod context;
mod dispatch;
mod error;
pub mod tensor;

pub use context::Context;
pub use error::{Result, TensorError};
pub use tensor::Tensor;

pub use texblas_backend as backend;

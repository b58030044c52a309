//! The tensor resource handle and its operation surface.

mod core;
mod ops;

pub use self::core::Tensor;

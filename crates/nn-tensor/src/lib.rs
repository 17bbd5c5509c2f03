//! `nn-tensor` - Tensor descriptors exchanged at the nn-host boundary.
//!
//! This crate provides:
//! - `TensorType` element types (f16, f32, i32, u32) and their byte widths
//! - `Shape` utilities (element counts, row-major strides)
//! - `TensorView` for borrowed caller memory and owned `Tensor` copies
//! - `validate`, the buffer-length consistency check every input passes
//! - `TensorSpec` for exact matching against a graph's declared inputs

pub mod dtype;
pub mod error;
pub mod shape;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use dtype::TensorType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use tensor::{validate, Tensor, TensorSpec, TensorView};

use thiserror::Error;

use crate::dtype::TensorType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("tensor must have at least one dimension")]
    ZeroRank,
    #[error("tensor dimensions {dims:?} overflow the addressable element count")]
    ShapeOverflow { dims: Vec<usize> },
    #[error("buffer length mismatch for {ty} tensor {dims:?}: expected {expected} bytes, got {got}")]
    BufferLength {
        dims: Vec<usize>,
        ty: TensorType,
        expected: usize,
        got: usize,
    },
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: TensorType, got: TensorType },
    #[error("unknown tensor type id: {0}")]
    UnknownType(u32),
    #[error("tensor of {got} bytes exceeds the limit of {limit} bytes")]
    TooLarge { got: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, TensorError>;

use thiserror::Error;

use crate::encoding::ExecutionTarget;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("graph bytes truncated while reading {0}")]
    Truncated(&'static str),
    #[error("invalid graph magic: expected 'NNRG', got {0:?}")]
    InvalidMagic([u8; 4]),
    #[error("unsupported graph format version: {0}")]
    UnsupportedVersion(u32),
    #[error("backend '{backend}' cannot execute on target {target}")]
    UnsupportedTarget {
        backend: String,
        target: ExecutionTarget,
    },
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),
    #[error("unknown tensor type id: {0}")]
    UnknownTensorType(u32),
    #[error("input {0} declared more than once")]
    DuplicateInput(u32),
    #[error("output {0} written by more than one op")]
    DuplicateOutput(u32),
    #[error("op reads undeclared input {0}")]
    UndeclaredInput(u32),
    #[error("graph declares no inputs")]
    NoInputs,
    #[error("input {0} is declared with rank 0")]
    ZeroRankInput(u32),
    #[error("{op:?} requires a float input, but input {input} is {ty}")]
    NonFloatInput {
        op: crate::reference::OpCode,
        input: u32,
        ty: nn_tensor::TensorType,
    },
    #[error("{0} trailing bytes after graph definition")]
    TrailingBytes(usize),
    #[error("input {0} is not bound")]
    MissingInput(u32),
    #[error("tensor error: {0}")]
    Tensor(#[from] nn_tensor::TensorError),
    #[error("run cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

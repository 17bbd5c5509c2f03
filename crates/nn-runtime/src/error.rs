use std::fmt;

use thiserror::Error;

use nn_backend::{BackendError, GraphEncoding};
use nn_tensor::TensorError;

/// The closed set of failure categories every runtime error maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unsupported,
    InvalidHandle,
    InvalidArgument,
    NotReady,
    Busy,
    BackendFailure,
    ResourceExhausted,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::InvalidHandle => "invalid-handle",
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::NotReady => "not-ready",
            ErrorKind::Busy => "busy",
            ErrorKind::BackendFailure => "backend-failure",
            ErrorKind::ResourceExhausted => "resource-exhausted",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum NnError {
    #[error("no backend registered for encoding {0}")]
    Unsupported(GraphEncoding),
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid tensor: {0}")]
    Tensor(#[from] TensorError),
    #[error("not ready: {0}")]
    NotReady(String),
    #[error("{0} has a call in flight")]
    Busy(String),
    #[error("backend failure: {0}")]
    Backend(BackendError),
    #[error("{resource} limit of {limit} reached")]
    ResourceExhausted { resource: &'static str, limit: usize },
    #[error("compute cancelled")]
    Cancelled,
}

impl NnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NnError::Unsupported(_) => ErrorKind::Unsupported,
            NnError::InvalidHandle(_) => ErrorKind::InvalidHandle,
            NnError::InvalidArgument(_) | NnError::Tensor(_) => ErrorKind::InvalidArgument,
            NnError::NotReady(_) => ErrorKind::NotReady,
            NnError::Busy(_) => ErrorKind::Busy,
            NnError::Backend(_) => ErrorKind::BackendFailure,
            NnError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            NnError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<BackendError> for NnError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => NnError::Cancelled,
            other => NnError::Backend(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, NnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            NnError::Unsupported(GraphEncoding::Unknown).kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(
            NnError::from(TensorError::ZeroRank).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            NnError::from(BackendError::Other("boom".into())).kind(),
            ErrorKind::BackendFailure
        );
        assert_eq!(NnError::from(BackendError::Cancelled).kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_backend_message_passes_through() {
        let err = NnError::from(BackendError::Other("device lost".into()));
        assert_eq!(err.to_string(), "backend failure: device lost");
    }
}

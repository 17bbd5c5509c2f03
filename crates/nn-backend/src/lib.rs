pub mod backend;
pub mod encoding;
pub mod error;
pub mod reference;

pub use backend::{Backend, BackendContext, BackendGraph, CancelToken, TensorMap};
pub use encoding::{ExecutionTarget, GraphEncoding};
pub use error::{BackendError, Result};
pub use reference::ReferenceBackend;

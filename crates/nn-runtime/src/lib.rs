//! `nn-runtime` - Graph registry and execution contexts for nn-host.
//!
//! This crate provides:
//! - `Runtime`, the entry point owning backends, graphs and contexts
//! - Generation-checked `GraphHandle` / `ContextHandle` values
//! - The `Created -> Ready -> Computed` execution context state machine
//! - `ComputeTask` for cancellable compute
//! - `RuntimeConfig` limits and busy policy

pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod registry;
pub mod runtime;
pub mod task;

// Re-export primary types at the crate root for convenience.
pub use config::{BusyPolicy, RuntimeConfig};
pub use context::ContextState;
pub use error::{ErrorKind, NnError, Result};
pub use handle::{ContextHandle, GraphHandle};
pub use registry::GraphInfo;
pub use runtime::Runtime;
pub use task::ComputeTask;

pub use nn_backend::{Backend, CancelToken, ExecutionTarget, GraphEncoding};
pub use nn_tensor::{Tensor, TensorType, TensorView};

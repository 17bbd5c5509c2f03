use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nn_tensor::{Tensor, TensorSpec};

use crate::encoding::{ExecutionTarget, GraphEncoding};
use crate::error::Result;

/// Bound tensors keyed by input or output index.
pub type TensorMap = BTreeMap<u32, Tensor>;

/// A pluggable implementation for one graph encoding.
///
/// The runtime keeps one `Backend` per encoding tag and calls `compile` for
/// every `load` of that encoding. Compilation may be eager or deferred until
/// `instantiate`; the runtime only guarantees that `instantiate` precedes
/// any `run`.
pub trait Backend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "reference", "openvino").
    fn name(&self) -> &str;

    /// The encoding tag this backend is registered under.
    fn encoding(&self) -> GraphEncoding;

    /// Parse and compile encoded graph bytes for `target`.
    fn compile(&self, bytes: &[u8], target: ExecutionTarget) -> Result<Box<dyn BackendGraph>>;
}

/// A compiled graph. Shared read-only by every context created from it.
pub trait BackendGraph: Send + Sync + Debug {
    /// Declared inputs, when the format carries them.
    ///
    /// When present, the runtime only accepts inputs at these indices with
    /// exactly these shapes and types, and `compute` requires all of them
    /// to be bound.
    fn input_specs(&self) -> Option<&BTreeMap<u32, TensorSpec>> {
        None
    }

    /// Create per-context execution state.
    fn instantiate(&self) -> Result<Box<dyn BackendContext>>;
}

/// Per-context execution state owned by one execution context.
pub trait BackendContext: Send + Debug {
    /// Run the graph over `inputs` and return every produced output.
    ///
    /// Implementations should poll `cancel` between units of work and
    /// return `BackendError::Cancelled` once it trips.
    fn run(&mut self, inputs: &TensorMap, cancel: &CancelToken) -> Result<TensorMap>;
}

/// Cooperative cancellation flag shared between a running compute and the
/// caller that may want to abandon it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

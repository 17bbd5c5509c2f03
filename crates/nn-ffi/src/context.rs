use nn_runtime::{Runtime, RuntimeConfig};

/// Opaque runtime handle owning every graph and execution context created
/// through it. The only pointer the library hands out besides strings and
/// output tensors.
pub struct NNRuntime {
    pub runtime: Runtime,
}

impl Default for NNRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl NNRuntime {
    /// Create a runtime with the reference backend registered.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            runtime: Runtime::with_reference_backend(config),
        }
    }
}

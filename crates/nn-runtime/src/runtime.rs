use std::sync::Arc;

use nn_backend::{Backend, ExecutionTarget, GraphEncoding, ReferenceBackend};
use nn_tensor::{Tensor, TensorView};

use crate::config::RuntimeConfig;
use crate::context::{ContextManager, ContextState};
use crate::error::Result;
use crate::handle::{ContextHandle, GraphHandle};
use crate::registry::{GraphInfo, GraphRegistry};
use crate::task::ComputeTask;

/// The host-side inference runtime: backend table, graph registry and
/// execution contexts behind one explicitly created value.
///
/// Every method takes `&self`; share a runtime across threads with `Arc`.
/// Calls on different contexts never wait on each other. Calls on the same
/// context follow the configured [`BusyPolicy`](crate::BusyPolicy).
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    graphs: GraphRegistry,
    contexts: ContextManager,
}

impl Runtime {
    /// Create a runtime with no backends registered.
    pub fn new(config: RuntimeConfig) -> Self {
        Runtime {
            graphs: GraphRegistry::new(config.max_graphs),
            contexts: ContextManager::new(&config),
            config,
        }
    }

    /// Create a runtime with the built-in reference backend registered.
    pub fn with_reference_backend(config: RuntimeConfig) -> Self {
        let runtime = Runtime::new(config);
        runtime.graphs.insert_backend(Arc::new(ReferenceBackend::new()));
        runtime
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn register_backend(&self, backend: Arc<dyn Backend>) -> Result<Option<Arc<dyn Backend>>> {
        self.graphs.register_backend(backend)
    }

    pub fn unregister_backend(&self, encoding: GraphEncoding) -> Option<Arc<dyn Backend>> {
        self.graphs.unregister_backend(encoding)
    }

    /// Compile `bytes` with the backend for `encoding` and return a handle.
    pub fn load(
        &self,
        bytes: &[u8],
        encoding: GraphEncoding,
        target: ExecutionTarget,
    ) -> Result<GraphHandle> {
        self.graphs.load(bytes, encoding, target)
    }

    /// Invalidate a graph handle. Contexts already created from it keep
    /// working until they are released.
    pub fn release_graph(&self, graph: GraphHandle) -> Result<()> {
        self.graphs.release(graph)
    }

    pub fn graph_info(&self, graph: GraphHandle) -> Result<GraphInfo> {
        Ok(self.graphs.get(graph)?.info())
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    pub fn init_execution_context(&self, graph: GraphHandle) -> Result<ContextHandle> {
        let graph = self.graphs.get(graph)?;
        self.contexts.create(graph)
    }

    /// Validate `tensor` and bind a copy of it as input `index`.
    pub fn set_input(&self, context: ContextHandle, index: u32, tensor: &TensorView<'_>) -> Result<()> {
        self.contexts.set_input(context, index, tensor)
    }

    /// Run inference over the bound inputs, blocking until it finishes.
    pub fn compute(&self, context: ContextHandle) -> Result<()> {
        self.begin_compute(context)?.wait()
    }

    /// Admit a compute without running it yet, so the caller can take its
    /// cancel token first.
    pub fn begin_compute(&self, context: ContextHandle) -> Result<ComputeTask<'_>> {
        self.contexts.begin_compute(context)
    }

    /// Copy out output `index` of the last successful compute.
    pub fn get_output(&self, context: ContextHandle, index: u32) -> Result<Tensor> {
        self.contexts.get_output(context, index)
    }

    pub fn release_context(&self, context: ContextHandle) -> Result<()> {
        self.contexts.release(context)
    }

    pub fn context_state(&self, context: ContextHandle) -> Result<ContextState> {
        self.contexts.state(context)
    }

    pub fn input_indices(&self, context: ContextHandle) -> Result<Vec<u32>> {
        self.contexts.input_indices(context)
    }

    pub fn output_indices(&self, context: ContextHandle) -> Result<Vec<u32>> {
        self.contexts.output_indices(context)
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Release every context and then every graph. Outstanding handles all
    /// become invalid; registered backends stay registered. Never waits on
    /// a compute in flight: a held [`ComputeTask`] still finishes, but its
    /// context is gone afterwards.
    pub fn teardown(&self) {
        let contexts = self.contexts.clear();
        let graphs = self.graphs.clear();
        if contexts + graphs > 0 {
            tracing::info!(contexts, graphs, "runtime torn down");
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.teardown();
    }
}

use std::fmt;
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};

use nn_backend::{BackendContext, CancelToken, TensorMap};
use nn_tensor::{Tensor, TensorError, TensorView};

use crate::config::{has_room, BusyPolicy, RuntimeConfig};
use crate::error::{NnError, Result};
use crate::handle::{ContextHandle, HandleTable};
use crate::registry::Graph;
use crate::task::ComputeTask;

/// Lifecycle state of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No inputs bound yet.
    Created,
    /// At least one input bound; outputs are absent or stale.
    Ready,
    /// The last compute succeeded and outputs are readable.
    Computed,
}

/// Per-context state. Always accessed through its context mutex.
pub struct ExecutionContext {
    graph: Arc<Graph>,
    backend: Option<Box<dyn BackendContext>>,
    inputs: TensorMap,
    outputs: TensorMap,
    state: ContextState,
}

impl ExecutionContext {
    pub(crate) fn new(graph: Arc<Graph>, backend: Box<dyn BackendContext>) -> Self {
        ExecutionContext {
            graph,
            backend: Some(backend),
            inputs: TensorMap::new(),
            outputs: TensorMap::new(),
            state: ContextState::Created,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn input_indices(&self) -> Vec<u32> {
        self.inputs.keys().copied().collect()
    }

    pub fn output_indices(&self) -> Vec<u32> {
        self.outputs.keys().copied().collect()
    }

    /// Validate `view` and bind a copy of it at `index`.
    ///
    /// Validation runs before any mutation. A bind after a successful compute
    /// discards the outputs and moves the context back to `Ready`.
    pub(crate) fn bind_input(&mut self, index: u32, view: &TensorView<'_>, max_bytes: usize) -> Result<()> {
        view.validate()?;
        if max_bytes != 0 && view.data.len() > max_bytes {
            return Err(TensorError::TooLarge {
                got: view.data.len(),
                limit: max_bytes,
            }
            .into());
        }
        if let Some(specs) = self.graph.input_specs() {
            let spec = specs.get(&index).ok_or_else(|| {
                NnError::InvalidArgument(format!("graph declares no input {}", index))
            })?;
            spec.check(view)?;
        }

        let tensor = view.to_tensor()?;
        tracing::trace!(index, ty = %tensor.ty(), dims = %tensor.shape(), "input bound");
        self.inputs.insert(index, tensor);
        if self.state == ContextState::Computed {
            self.outputs.clear();
        }
        self.state = ContextState::Ready;
        Ok(())
    }

    /// Readiness policy for compute: at least one input bound, and when the
    /// graph declares its inputs, every declared input bound.
    pub(crate) fn check_ready(&self) -> Result<()> {
        if self.state == ContextState::Created {
            return Err(NnError::NotReady("no inputs bound".to_string()));
        }
        if let Some(specs) = self.graph.input_specs() {
            let missing: Vec<u32> = specs
                .keys()
                .filter(|i| !self.inputs.contains_key(i))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(NnError::NotReady(format!(
                    "declared inputs {:?} are not bound",
                    missing
                )));
            }
        }
        Ok(())
    }

    /// Run the backend over the bound inputs. Outputs are replaced wholesale
    /// on success; on failure nothing changes.
    pub(crate) fn run(&mut self, cancel: &CancelToken) -> Result<()> {
        self.check_ready()?;
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| NnError::InvalidHandle("context released".to_string()))?;
        match backend.run(&self.inputs, cancel) {
            Ok(outputs) => {
                tracing::debug!(outputs = outputs.len(), "compute finished");
                self.outputs = outputs;
                self.state = ContextState::Computed;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(backend = self.graph.backend_name(), error = %e, "compute failed");
                Err(e.into())
            }
        }
    }

    pub(crate) fn output(&self, index: u32) -> Result<Tensor> {
        if self.state != ContextState::Computed {
            return Err(NnError::NotReady("no successful compute".to_string()));
        }
        self.outputs
            .get(&index)
            .cloned()
            .ok_or_else(|| NnError::InvalidArgument(format!("no output at index {}", index)))
    }

    /// Drop the backend state and bound tensors.
    pub(crate) fn release(&mut self) {
        self.backend = None;
        self.inputs.clear();
        self.outputs.clear();
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("graph", &self.graph)
            .field("state", &self.state)
            .field("inputs", &self.input_indices())
            .field("outputs", &self.output_indices())
            .finish()
    }
}

pub(crate) type ContextCell = Arc<Mutex<ExecutionContext>>;
pub(crate) type ContextGuard = ArcMutexGuard<RawMutex, ExecutionContext>;

/// Owns every execution context and serializes calls on each one.
///
/// The handle table lock is only held to look a context up or to insert or
/// remove one; it is never held across a backend call.
pub struct ContextManager {
    contexts: RwLock<HandleTable<ContextCell>>,
    busy_policy: BusyPolicy,
    max_contexts: usize,
    max_tensor_bytes: usize,
}

impl ContextManager {
    pub fn new(config: &RuntimeConfig) -> Self {
        ContextManager {
            contexts: RwLock::new(HandleTable::new()),
            busy_policy: config.busy_policy,
            max_contexts: config.max_contexts,
            max_tensor_bytes: config.max_tensor_bytes,
        }
    }

    /// Instantiate backend state for `graph` and issue a handle for it.
    pub fn create(&self, graph: Arc<Graph>) -> Result<ContextHandle> {
        if !has_room(self.contexts.read().len(), self.max_contexts) {
            return Err(self.exhausted());
        }
        let backend = graph.instantiate().map_err(|e| {
            tracing::warn!(backend = graph.backend_name(), error = %e, "instantiate failed");
            e
        })?;
        let cell = Arc::new(Mutex::new(ExecutionContext::new(graph, backend)));

        let mut contexts = self.contexts.write();
        if !has_room(contexts.len(), self.max_contexts) {
            return Err(self.exhausted());
        }
        let raw = contexts.insert(cell).ok_or(NnError::ResourceExhausted {
            resource: "context",
            limit: u32::MAX as usize,
        })?;
        let handle = ContextHandle::from_raw(raw);
        tracing::debug!(%handle, "execution context created");
        Ok(handle)
    }

    /// Acquire exclusive access to a context according to the busy policy.
    pub(crate) fn lock(&self, handle: ContextHandle) -> Result<ContextGuard> {
        let cell = self
            .contexts
            .read()
            .get(handle.raw())
            .cloned()
            .ok_or_else(|| NnError::InvalidHandle(handle.to_string()))?;

        let guard = match self.busy_policy {
            BusyPolicy::Reject => cell
                .try_lock_arc()
                .ok_or_else(|| NnError::Busy(handle.to_string()))?,
            BusyPolicy::Block => cell.lock_arc(),
        };
        // Released or torn down while we waited for the lock.
        let live = self
            .contexts
            .read()
            .get(handle.raw())
            .is_some_and(|current| Arc::ptr_eq(current, &cell));
        if !live {
            return Err(NnError::InvalidHandle(handle.to_string()));
        }
        Ok(guard)
    }

    pub fn set_input(&self, handle: ContextHandle, index: u32, view: &TensorView<'_>) -> Result<()> {
        let mut ctx = self.lock(handle)?;
        ctx.bind_input(index, view, self.max_tensor_bytes)
    }

    /// Lock the context, check readiness and hand back a task that performs
    /// the backend run when waited on.
    pub fn begin_compute(&self, handle: ContextHandle) -> Result<ComputeTask<'_>> {
        let ctx = self.lock(handle)?;
        ctx.check_ready()?;
        Ok(ComputeTask::new(handle, ctx))
    }

    pub fn get_output(&self, handle: ContextHandle, index: u32) -> Result<Tensor> {
        self.lock(handle)?.output(index)
    }

    pub fn state(&self, handle: ContextHandle) -> Result<ContextState> {
        Ok(self.lock(handle)?.state())
    }

    pub fn input_indices(&self, handle: ContextHandle) -> Result<Vec<u32>> {
        Ok(self.lock(handle)?.input_indices())
    }

    pub fn output_indices(&self, handle: ContextHandle) -> Result<Vec<u32>> {
        Ok(self.lock(handle)?.output_indices())
    }

    /// Invalidate `handle` and drop its backend state. Obeys the busy policy.
    pub fn release(&self, handle: ContextHandle) -> Result<()> {
        let mut ctx = self.lock(handle)?;
        ctx.release();
        self.contexts
            .write()
            .remove(handle.raw())
            .ok_or_else(|| NnError::InvalidHandle(handle.to_string()))?;
        drop(ctx);
        tracing::debug!(%handle, "execution context released");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invalidate every context handle and drop backend state. A context
    /// locked by a call in flight is only detached; it is dropped when that
    /// call finishes. Returns how many were live.
    pub fn clear(&self) -> usize {
        let cells = self.contexts.write().drain();
        for cell in &cells {
            if let Some(mut ctx) = cell.try_lock() {
                ctx.release();
            }
        }
        cells.len()
    }

    fn exhausted(&self) -> NnError {
        NnError::ResourceExhausted {
            resource: "context",
            limit: self.max_contexts,
        }
    }
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("contexts", &self.contexts.read().len())
            .field("busy_policy", &self.busy_policy)
            .field("max_contexts", &self.max_contexts)
            .field("max_tensor_bytes", &self.max_tensor_bytes)
            .finish()
    }
}

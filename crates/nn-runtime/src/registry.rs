use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use nn_backend::{Backend, BackendContext, BackendGraph, ExecutionTarget, GraphEncoding};
use nn_tensor::TensorSpec;

use crate::config::has_room;
use crate::error::{NnError, Result};
use crate::handle::{GraphHandle, HandleTable};

/// A loaded graph. Immutable; shared read-only by its execution contexts.
pub struct Graph {
    encoding: GraphEncoding,
    target: ExecutionTarget,
    backend_name: String,
    inner: Box<dyn BackendGraph>,
}

impl Graph {
    pub fn encoding(&self) -> GraphEncoding {
        self.encoding
    }

    pub fn target(&self) -> ExecutionTarget {
        self.target
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Inputs the backend declared for this graph, if any.
    pub fn input_specs(&self) -> Option<&BTreeMap<u32, TensorSpec>> {
        self.inner.input_specs()
    }

    pub(crate) fn instantiate(&self) -> Result<Box<dyn BackendContext>> {
        Ok(self.inner.instantiate()?)
    }

    pub fn info(&self) -> GraphInfo {
        GraphInfo {
            encoding: self.encoding,
            target: self.target,
            backend: self.backend_name.clone(),
            inputs: self.input_specs().cloned(),
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("encoding", &self.encoding)
            .field("target", &self.target)
            .field("backend", &self.backend_name)
            .finish()
    }
}

/// A snapshot of what is known about a loaded graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInfo {
    pub encoding: GraphEncoding,
    pub target: ExecutionTarget,
    pub backend: String,
    pub inputs: Option<BTreeMap<u32, TensorSpec>>,
}

/// Owns the backend table and every loaded graph.
pub struct GraphRegistry {
    backends: RwLock<HashMap<GraphEncoding, Arc<dyn Backend>>>,
    graphs: RwLock<HandleTable<Arc<Graph>>>,
    max_graphs: usize,
}

impl GraphRegistry {
    pub fn new(max_graphs: usize) -> Self {
        GraphRegistry {
            backends: RwLock::new(HashMap::new()),
            graphs: RwLock::new(HandleTable::new()),
            max_graphs,
        }
    }

    /// Register `backend` under its encoding, replacing and returning any
    /// previous registration. Graphs already loaded keep their backend.
    pub fn register_backend(&self, backend: Arc<dyn Backend>) -> Result<Option<Arc<dyn Backend>>> {
        let encoding = backend.encoding();
        if encoding == GraphEncoding::Unknown {
            return Err(NnError::InvalidArgument(format!(
                "backend '{}' cannot be registered for the unknown encoding",
                backend.name()
            )));
        }
        Ok(self.insert_backend(backend))
    }

    /// Install a backend whose encoding is already known to be registrable.
    pub(crate) fn insert_backend(&self, backend: Arc<dyn Backend>) -> Option<Arc<dyn Backend>> {
        let encoding = backend.encoding();
        tracing::info!(backend = backend.name(), %encoding, "registered backend");
        self.backends.write().insert(encoding, backend)
    }

    pub fn unregister_backend(&self, encoding: GraphEncoding) -> Option<Arc<dyn Backend>> {
        self.backends.write().remove(&encoding)
    }

    pub fn has_backend(&self, encoding: GraphEncoding) -> bool {
        self.backends.read().contains_key(&encoding)
    }

    /// Compile `bytes` with the backend registered for `encoding` and store
    /// the result under a fresh handle.
    ///
    /// Nothing is allocated unless compilation succeeds and the registry
    /// has room.
    pub fn load(
        &self,
        bytes: &[u8],
        encoding: GraphEncoding,
        target: ExecutionTarget,
    ) -> Result<GraphHandle> {
        let backend = self
            .backends
            .read()
            .get(&encoding)
            .cloned()
            .ok_or(NnError::Unsupported(encoding))?;

        if !has_room(self.graphs.read().len(), self.max_graphs) {
            return Err(self.exhausted());
        }

        let inner = backend.compile(bytes, target).map_err(|e| {
            tracing::warn!(backend = backend.name(), %encoding, %target, error = %e, "graph compile failed");
            NnError::from(e)
        })?;

        let graph = Arc::new(Graph {
            encoding,
            target,
            backend_name: backend.name().to_string(),
            inner,
        });

        let mut graphs = self.graphs.write();
        if !has_room(graphs.len(), self.max_graphs) {
            return Err(self.exhausted());
        }
        let raw = graphs
            .insert(graph)
            .ok_or(NnError::ResourceExhausted {
                resource: "graph",
                limit: u32::MAX as usize,
            })?;
        let handle = GraphHandle::from_raw(raw);
        tracing::debug!(%handle, %encoding, %target, bytes = bytes.len(), "graph loaded");
        Ok(handle)
    }

    pub fn get(&self, handle: GraphHandle) -> Result<Arc<Graph>> {
        self.graphs
            .read()
            .get(handle.raw())
            .cloned()
            .ok_or_else(|| NnError::InvalidHandle(handle.to_string()))
    }

    /// Invalidate `handle`. Contexts created from the graph keep their own
    /// reference and stay usable until they are released.
    pub fn release(&self, handle: GraphHandle) -> Result<()> {
        self.graphs
            .write()
            .remove(handle.raw())
            .ok_or_else(|| NnError::InvalidHandle(handle.to_string()))?;
        tracing::debug!(%handle, "graph released");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.graphs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every graph handle, returning how many were live.
    pub fn clear(&self) -> usize {
        self.graphs.write().drain().len()
    }

    fn exhausted(&self) -> NnError {
        NnError::ResourceExhausted {
            resource: "graph",
            limit: self.max_graphs,
        }
    }
}

impl fmt::Debug for GraphRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphRegistry")
            .field("backends", &self.backends.read().len())
            .field("graphs", &self.graphs.read().len())
            .field("max_graphs", &self.max_graphs)
            .finish()
    }
}

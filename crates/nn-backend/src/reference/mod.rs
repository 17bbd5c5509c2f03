//! Reference CPU backend for the `reference` graph encoding.
//!
//! The format is deliberately tiny (declared inputs plus a flat list of
//! element-wise ops) so the execution protocol can be exercised end to end
//! without linking a production inference engine.

pub mod builder;
pub mod format;
pub mod ops;

pub use builder::ReferenceGraphBuilder;
pub use format::{Program, REFERENCE_MAGIC, REFERENCE_VERSION};
pub use ops::{Op, OpCode};

use std::collections::BTreeMap;
use std::sync::Arc;

use nn_tensor::TensorSpec;

use crate::backend::{Backend, BackendContext, BackendGraph, CancelToken, TensorMap};
use crate::encoding::{ExecutionTarget, GraphEncoding};
use crate::error::{BackendError, Result};

/// Backend for [`GraphEncoding::Reference`]. Only targets the CPU.
#[derive(Debug, Clone)]
pub struct ReferenceBackend;

impl ReferenceBackend {
    pub fn new() -> Self {
        ReferenceBackend
    }
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for ReferenceBackend {
    fn name(&self) -> &str {
        "reference"
    }

    fn encoding(&self) -> GraphEncoding {
        GraphEncoding::Reference
    }

    fn compile(&self, bytes: &[u8], target: ExecutionTarget) -> Result<Box<dyn BackendGraph>> {
        if target != ExecutionTarget::Cpu {
            return Err(BackendError::UnsupportedTarget {
                backend: self.name().to_string(),
                target,
            });
        }
        let program = Program::parse(bytes)?;
        tracing::debug!(
            inputs = program.inputs.len(),
            ops = program.ops.len(),
            "compiled reference graph"
        );
        Ok(Box::new(ReferenceGraph {
            program: Arc::new(program),
        }))
    }
}

/// A parsed reference program, shared with every context instantiated from it.
#[derive(Debug)]
pub struct ReferenceGraph {
    program: Arc<Program>,
}

impl BackendGraph for ReferenceGraph {
    fn input_specs(&self) -> Option<&BTreeMap<u32, TensorSpec>> {
        Some(&self.program.inputs)
    }

    fn instantiate(&self) -> Result<Box<dyn BackendContext>> {
        Ok(Box::new(ReferenceContext {
            program: Arc::clone(&self.program),
        }))
    }
}

#[derive(Debug)]
pub struct ReferenceContext {
    program: Arc<Program>,
}

impl BackendContext for ReferenceContext {
    fn run(&mut self, inputs: &TensorMap, cancel: &CancelToken) -> Result<TensorMap> {
        let mut outputs = TensorMap::new();
        for op in &self.program.ops {
            if cancel.is_cancelled() {
                return Err(BackendError::Cancelled);
            }
            let src = inputs
                .get(&op.src)
                .ok_or(BackendError::MissingInput(op.src))?;
            outputs.insert(op.dst, op.apply(src)?);
        }
        Ok(outputs)
    }
}

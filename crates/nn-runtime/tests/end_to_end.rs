use std::sync::{Arc, Barrier};
use std::thread;

use approx::assert_relative_eq;
use half::f16;

use nn_backend::reference::{OpCode, ReferenceGraphBuilder};
use nn_backend::{BackendContext, BackendError, BackendGraph, TensorMap};
use nn_runtime::{
    Backend, BusyPolicy, CancelToken, ContextState, ErrorKind, ExecutionTarget, GraphEncoding,
    Runtime, RuntimeConfig, Tensor, TensorType, TensorView,
};

const GATED: GraphEncoding = GraphEncoding::Custom(7);

/// Backend whose `run` parks on a barrier twice: once to announce it has
/// started, once to wait for permission to finish.
#[derive(Debug)]
struct GatedBackend {
    gate: Arc<Barrier>,
}

#[derive(Debug)]
struct GatedGraph {
    gate: Arc<Barrier>,
}

#[derive(Debug)]
struct GatedContext {
    gate: Arc<Barrier>,
}

impl Backend for GatedBackend {
    fn name(&self) -> &str {
        "gated"
    }

    fn encoding(&self) -> GraphEncoding {
        GATED
    }

    fn compile(
        &self,
        _bytes: &[u8],
        _target: ExecutionTarget,
    ) -> nn_backend::Result<Box<dyn BackendGraph>> {
        Ok(Box::new(GatedGraph {
            gate: Arc::clone(&self.gate),
        }))
    }
}

impl BackendGraph for GatedGraph {
    fn instantiate(&self) -> nn_backend::Result<Box<dyn BackendContext>> {
        Ok(Box::new(GatedContext {
            gate: Arc::clone(&self.gate),
        }))
    }
}

impl BackendContext for GatedContext {
    fn run(&mut self, inputs: &TensorMap, _cancel: &CancelToken) -> nn_backend::Result<TensorMap> {
        self.gate.wait();
        self.gate.wait();
        Ok(inputs.clone())
    }
}

/// Backend that compiles anything but fails every run.
#[derive(Debug)]
struct FailingBackend;

#[derive(Debug)]
struct FailingGraph;

#[derive(Debug)]
struct FailingContext;

impl Backend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn encoding(&self) -> GraphEncoding {
        GraphEncoding::Custom(8)
    }

    fn compile(
        &self,
        _bytes: &[u8],
        _target: ExecutionTarget,
    ) -> nn_backend::Result<Box<dyn BackendGraph>> {
        Ok(Box::new(FailingGraph))
    }
}

impl BackendGraph for FailingGraph {
    fn instantiate(&self) -> nn_backend::Result<Box<dyn BackendContext>> {
        Ok(Box::new(FailingContext))
    }
}

impl BackendContext for FailingContext {
    fn run(&mut self, _inputs: &TensorMap, _cancel: &CancelToken) -> nn_backend::Result<TensorMap> {
        Err(BackendError::Other("accelerator fault".to_string()))
    }
}

/// Backend whose contexts succeed on the first run and fail afterwards.
#[derive(Debug)]
struct FailsAfterFirstRun;

#[derive(Debug)]
struct OnceGraph;

#[derive(Debug)]
struct OnceContext {
    runs: usize,
}

impl Backend for FailsAfterFirstRun {
    fn name(&self) -> &str {
        "once"
    }

    fn encoding(&self) -> GraphEncoding {
        GraphEncoding::Custom(9)
    }

    fn compile(
        &self,
        _bytes: &[u8],
        _target: ExecutionTarget,
    ) -> nn_backend::Result<Box<dyn BackendGraph>> {
        Ok(Box::new(OnceGraph))
    }
}

impl BackendGraph for OnceGraph {
    fn instantiate(&self) -> nn_backend::Result<Box<dyn BackendContext>> {
        Ok(Box::new(OnceContext { runs: 0 }))
    }
}

impl BackendContext for OnceContext {
    fn run(&mut self, inputs: &TensorMap, _cancel: &CancelToken) -> nn_backend::Result<TensorMap> {
        self.runs += 1;
        if self.runs > 1 {
            return Err(BackendError::Other("device lost".to_string()));
        }
        Ok(inputs.clone())
    }
}

fn scalar(value: f32) -> Tensor {
    Tensor::from_f32(vec![1, 1], &[value]).unwrap()
}

#[test]
fn test_end_to_end_scenario() {
    let rt = Runtime::with_reference_backend(RuntimeConfig::default());

    let err = rt
        .load(&[7u8; 10], GraphEncoding::Unknown, ExecutionTarget::Cpu)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(rt.graph_count(), 0);

    let bytes = ReferenceGraphBuilder::new()
        .input(0, TensorType::F32, &[1, 1])
        .op(OpCode::Scale, 0, 0, 3.0)
        .build();
    let g1 = rt
        .load(&bytes, GraphEncoding::Reference, ExecutionTarget::Cpu)
        .unwrap();

    let c1 = rt.init_execution_context(g1).unwrap();
    assert_eq!(rt.context_state(c1).unwrap(), ContextState::Created);

    rt.set_input(c1, 0, &scalar(4.0).view()).unwrap();
    assert_eq!(rt.context_state(c1).unwrap(), ContextState::Ready);

    rt.compute(c1).unwrap();
    assert_eq!(rt.context_state(c1).unwrap(), ContextState::Computed);

    let first = rt.get_output(c1, 0).unwrap();
    let second = rt.get_output(c1, 0).unwrap();
    assert_eq!(first.data(), second.data());
    assert_eq!(first.dims(), &[1, 1]);
    assert_eq!(first.to_f32_vec().unwrap(), vec![12.0]);

    rt.release_context(c1).unwrap();
    rt.release_graph(g1).unwrap();
    assert_eq!(rt.context_count(), 0);
    assert_eq!(rt.graph_count(), 0);
}

#[test]
fn test_caller_buffer_is_copied() {
    let rt = Runtime::with_reference_backend(RuntimeConfig::default());
    let bytes = ReferenceGraphBuilder::new()
        .input(0, TensorType::F32, &[1, 1])
        .op(OpCode::Identity, 0, 0, 0.0)
        .build();
    let g = rt
        .load(&bytes, GraphEncoding::Reference, ExecutionTarget::Cpu)
        .unwrap();
    let c = rt.init_execution_context(g).unwrap();

    let dims = [1usize, 1];
    let mut buf = 1.5f32.to_le_bytes().to_vec();
    rt.set_input(c, 0, &TensorView::new(&dims, TensorType::F32, &buf))
        .unwrap();
    buf.copy_from_slice(&9.0f32.to_le_bytes());

    rt.compute(c).unwrap();
    assert_eq!(rt.get_output(c, 0).unwrap().to_f32_vec().unwrap(), vec![1.5]);
}

#[test]
fn test_backend_failure_keeps_prior_state() {
    let rt = Runtime::new(RuntimeConfig::default());
    rt.register_backend(Arc::new(FailingBackend)).unwrap();
    let g = rt
        .load(b"opaque", GraphEncoding::Custom(8), ExecutionTarget::Tpu)
        .unwrap();
    let c = rt.init_execution_context(g).unwrap();

    // Without declared inputs any bound index makes the context ready.
    rt.set_input(c, 42, &scalar(1.0).view()).unwrap();
    let err = rt.compute(c).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendFailure);
    assert!(err.to_string().contains("accelerator fault"));
    assert_eq!(rt.context_state(c).unwrap(), ContextState::Ready);
    assert_eq!(rt.get_output(c, 0).unwrap_err().kind(), ErrorKind::NotReady);
}

#[test]
fn test_failure_after_compute_keeps_outputs() {
    let rt = Runtime::new(RuntimeConfig::default());
    rt.register_backend(Arc::new(FailsAfterFirstRun)).unwrap();
    let g = rt
        .load(b"opaque", GraphEncoding::Custom(9), ExecutionTarget::Cpu)
        .unwrap();
    let c = rt.init_execution_context(g).unwrap();

    rt.set_input(c, 0, &scalar(1.0).view()).unwrap();
    rt.compute(c).unwrap();

    let err = rt.compute(c).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendFailure);
    assert!(err.to_string().contains("device lost"));
    assert_eq!(rt.context_state(c).unwrap(), ContextState::Computed);
    assert_eq!(rt.get_output(c, 0).unwrap(), scalar(1.0));
}

#[test]
fn test_busy_while_compute_in_flight() {
    let gate = Arc::new(Barrier::new(2));
    let rt = Runtime::with_reference_backend(RuntimeConfig::default());
    rt.register_backend(Arc::new(GatedBackend {
        gate: Arc::clone(&gate),
    }))
    .unwrap();

    let g = rt.load(b"", GATED, ExecutionTarget::Gpu).unwrap();
    let c = rt.init_execution_context(g).unwrap();
    rt.set_input(c, 0, &scalar(2.0).view()).unwrap();

    let other_bytes = ReferenceGraphBuilder::new()
        .input(0, TensorType::F32, &[1, 1])
        .op(OpCode::Add, 0, 0, 1.0)
        .build();
    let other_graph = rt
        .load(&other_bytes, GraphEncoding::Reference, ExecutionTarget::Cpu)
        .unwrap();
    let other = rt.init_execution_context(other_graph).unwrap();

    thread::scope(|s| {
        let worker = s.spawn(|| rt.compute(c));

        // The worker is now inside the backend run, holding the context.
        gate.wait();
        assert_eq!(
            rt.set_input(c, 0, &scalar(5.0).view()).unwrap_err().kind(),
            ErrorKind::Busy
        );
        assert_eq!(rt.get_output(c, 0).unwrap_err().kind(), ErrorKind::Busy);
        assert_eq!(rt.compute(c).unwrap_err().kind(), ErrorKind::Busy);
        assert_eq!(rt.release_context(c).unwrap_err().kind(), ErrorKind::Busy);

        // Other contexts are unaffected.
        rt.set_input(other, 0, &scalar(1.0).view()).unwrap();
        rt.compute(other).unwrap();
        assert_eq!(
            rt.get_output(other, 0).unwrap().to_f32_vec().unwrap(),
            vec![2.0]
        );

        gate.wait();
        worker.join().unwrap().unwrap();
    });

    assert_eq!(rt.context_state(c).unwrap(), ContextState::Computed);
    assert_eq!(rt.get_output(c, 0).unwrap(), scalar(2.0));
}

#[test]
fn test_block_policy_waits_for_compute() {
    let gate = Arc::new(Barrier::new(2));
    let rt = Runtime::new(RuntimeConfig::new().with_busy_policy(BusyPolicy::Block));
    rt.register_backend(Arc::new(GatedBackend {
        gate: Arc::clone(&gate),
    }))
    .unwrap();

    let g = rt.load(b"", GATED, ExecutionTarget::Cpu).unwrap();
    let c = rt.init_execution_context(g).unwrap();
    rt.set_input(c, 3, &scalar(8.0).view()).unwrap();

    thread::scope(|s| {
        let worker = s.spawn(|| rt.compute(c));
        gate.wait();

        let reader = s.spawn(|| rt.get_output(c, 3));

        gate.wait();
        worker.join().unwrap().unwrap();
        // The reader either waited for the compute or ran after it; it
        // never observes a half-finished context.
        assert_eq!(reader.join().unwrap().unwrap(), scalar(8.0));
    });
}

#[test]
fn test_handles_are_not_reused_after_release() {
    let rt = Runtime::with_reference_backend(RuntimeConfig::default());
    let bytes = ReferenceGraphBuilder::new()
        .input(0, TensorType::F32, &[1, 1])
        .op(OpCode::Identity, 0, 0, 0.0)
        .build();

    let mut seen = Vec::new();
    for _ in 0..16 {
        let g = rt
            .load(&bytes, GraphEncoding::Reference, ExecutionTarget::Cpu)
            .unwrap();
        assert!(!seen.contains(&g.to_bits()));
        seen.push(g.to_bits());
        rt.release_graph(g).unwrap();
    }
}

#[test]
fn test_f16_graph_end_to_end() {
    let rt = Runtime::with_reference_backend(RuntimeConfig::default());
    let bytes = ReferenceGraphBuilder::new()
        .input(0, TensorType::F16, &[3])
        .op(OpCode::Scale, 0, 0, 0.1)
        .op(OpCode::Sum, 0, 1, 0.0)
        .build();
    let g = rt
        .load(&bytes, GraphEncoding::Reference, ExecutionTarget::Cpu)
        .unwrap();
    let c = rt.init_execution_context(g).unwrap();

    let values = [1.0f32, 2.0, 3.0].map(f16::from_f32);
    let x = Tensor::from_f16(vec![3], &values).unwrap();
    rt.set_input(c, 0, &x.view()).unwrap();
    rt.compute(c).unwrap();

    let scaled = rt.get_output(c, 0).unwrap();
    assert_eq!(scaled.ty(), TensorType::F16);
    for (got, want) in scaled.to_f32_vec().unwrap().iter().zip([0.1f32, 0.2, 0.3]) {
        assert_relative_eq!(*got, want, epsilon = 1e-3);
    }
    let total = rt.get_output(c, 1).unwrap().to_f32_vec().unwrap();
    assert_relative_eq!(total[0], 6.0);
}

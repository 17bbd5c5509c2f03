use nn_tensor::TensorType;

use super::format::{REFERENCE_MAGIC, REFERENCE_VERSION};
use super::ops::OpCode;

/// Writes reference graph bytes in the layout read by
/// [`Program::parse`](super::format::Program::parse).
///
/// Entries are emitted exactly as given, so the builder can also produce
/// malformed graphs (duplicate inputs, dangling sources) for testing.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraphBuilder {
    inputs: Vec<(u32, TensorType, Vec<u32>)>,
    ops: Vec<(OpCode, u32, u32, f32)>,
}

impl ReferenceGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input. Builder-style.
    pub fn input(mut self, index: u32, ty: TensorType, dims: &[u32]) -> Self {
        self.inputs.push((index, ty, dims.to_vec()));
        self
    }

    /// Append an op reading input `src` and writing output `dst`.
    pub fn op(mut self, code: OpCode, src: u32, dst: u32, param: f32) -> Self {
        self.ops.push((code, src, dst, param));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&REFERENCE_MAGIC);
        out.extend_from_slice(&REFERENCE_VERSION.to_le_bytes());

        out.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for (index, ty, dims) in &self.inputs {
            out.extend_from_slice(&index.to_le_bytes());
            out.push(ty.to_id() as u8);
            out.push(dims.len() as u8);
            for d in dims {
                out.extend_from_slice(&d.to_le_bytes());
            }
        }

        out.extend_from_slice(&(self.ops.len() as u32).to_le_bytes());
        for (code, src, dst, param) in &self.ops {
            out.push(code.to_u8());
            out.extend_from_slice(&src.to_le_bytes());
            out.extend_from_slice(&dst.to_le_bytes());
            out.extend_from_slice(&param.to_le_bytes());
        }
        out
    }
}

use std::collections::BTreeMap;
use std::io::Read;

use nn_tensor::{TensorSpec, TensorType};

use super::ops::{Op, OpCode};
use crate::error::{BackendError, Result};

/// The four-byte magic number identifying a reference graph: ASCII "NNRG".
pub const REFERENCE_MAGIC: [u8; 4] = *b"NNRG";

/// The only format version this backend reads.
pub const REFERENCE_VERSION: u32 = 1;

/// A parsed reference graph: declared inputs and the ops that produce
/// outputs from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub inputs: BTreeMap<u32, TensorSpec>,
    pub ops: Vec<Op>,
}

fn read_exact<const N: usize>(reader: &mut &[u8], what: &'static str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    // A slice reader only fails at end of input.
    reader
        .read_exact(&mut buf)
        .map_err(|_| BackendError::Truncated(what))?;
    Ok(buf)
}

fn read_u8(reader: &mut &[u8], what: &'static str) -> Result<u8> {
    Ok(read_exact::<1>(reader, what)?[0])
}

fn read_u32(reader: &mut &[u8], what: &'static str) -> Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4>(reader, what)?))
}

fn read_f32(reader: &mut &[u8], what: &'static str) -> Result<f32> {
    Ok(f32::from_le_bytes(read_exact::<4>(reader, what)?))
}

impl Program {
    /// Parse a complete reference graph.
    ///
    /// Layout (all integers little-endian):
    /// 1. magic "NNRG", u32 version
    /// 2. u32 input count, then per input: u32 index, u8 type id,
    ///    u8 rank, rank x u32 dims
    /// 3. u32 op count, then per op: u8 opcode, u32 source input,
    ///    u32 destination output, f32 parameter
    ///
    /// The whole slice must be consumed. Graphs that could never run are
    /// rejected: no declared inputs, rank-0 inputs, and float ops reading
    /// integer inputs.
    pub fn parse(bytes: &[u8]) -> Result<Program> {
        let mut reader = bytes;

        let magic = read_exact::<4>(&mut reader, "magic")?;
        if magic != REFERENCE_MAGIC {
            return Err(BackendError::InvalidMagic(magic));
        }
        let version = read_u32(&mut reader, "version")?;
        if version != REFERENCE_VERSION {
            return Err(BackendError::UnsupportedVersion(version));
        }

        let n_inputs = read_u32(&mut reader, "input count")?;
        if n_inputs == 0 {
            return Err(BackendError::NoInputs);
        }
        let mut inputs = BTreeMap::new();
        for _ in 0..n_inputs {
            let index = read_u32(&mut reader, "input index")?;
            let type_id = read_u8(&mut reader, "input type")? as u32;
            let ty = TensorType::from_id(type_id)
                .ok_or(BackendError::UnknownTensorType(type_id))?;
            let rank = read_u8(&mut reader, "input rank")?;
            if rank == 0 {
                return Err(BackendError::ZeroRankInput(index));
            }
            let mut dims = Vec::with_capacity(rank as usize);
            for _ in 0..rank {
                dims.push(read_u32(&mut reader, "input dims")? as usize);
            }
            if inputs.insert(index, TensorSpec::new(dims, ty)).is_some() {
                return Err(BackendError::DuplicateInput(index));
            }
        }

        let n_ops = read_u32(&mut reader, "op count")?;
        let mut ops: Vec<Op> = Vec::new();
        for _ in 0..n_ops {
            let raw = read_u8(&mut reader, "opcode")?;
            let code = OpCode::from_u8(raw).ok_or(BackendError::UnknownOpcode(raw))?;
            let src = read_u32(&mut reader, "op source")?;
            let dst = read_u32(&mut reader, "op destination")?;
            let param = read_f32(&mut reader, "op parameter")?;
            let spec = inputs
                .get(&src)
                .ok_or(BackendError::UndeclaredInput(src))?;
            if code != OpCode::Identity && !spec.ty.is_float() {
                return Err(BackendError::NonFloatInput {
                    op: code,
                    input: src,
                    ty: spec.ty,
                });
            }
            if ops.iter().any(|op| op.dst == dst) {
                return Err(BackendError::DuplicateOutput(dst));
            }
            ops.push(Op {
                code,
                src,
                dst,
                param,
            });
        }

        if !reader.is_empty() {
            return Err(BackendError::TrailingBytes(reader.len()));
        }

        Ok(Program { inputs, ops })
    }
}

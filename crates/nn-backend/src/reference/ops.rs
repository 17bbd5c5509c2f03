use half::f16;

use nn_tensor::{Tensor, TensorType};

use crate::error::{BackendError, Result};

/// Operations understood by the reference backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Copy the input unchanged. Accepts every element type.
    Identity,
    /// x * param
    Scale,
    /// x + param
    Add,
    /// max(x, 0)
    Relu,
    /// Sum of all elements, producing a `[1]` tensor.
    Sum,
}

impl OpCode {
    pub fn from_u8(raw: u8) -> Option<OpCode> {
        match raw {
            0 => Some(OpCode::Identity),
            1 => Some(OpCode::Scale),
            2 => Some(OpCode::Add),
            3 => Some(OpCode::Relu),
            4 => Some(OpCode::Sum),
            _ => None,
        }
    }

    pub fn to_u8(&self) -> u8 {
        match self {
            OpCode::Identity => 0,
            OpCode::Scale => 1,
            OpCode::Add => 2,
            OpCode::Relu => 3,
            OpCode::Sum => 4,
        }
    }
}

/// One op: reads input `src`, writes output `dst`.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub code: OpCode,
    pub src: u32,
    pub dst: u32,
    pub param: f32,
}

impl Op {
    /// Apply this op to a single input tensor.
    ///
    /// Float ops compute in f32; f16 inputs are widened and the result is
    /// narrowed back so the output type matches the input type.
    pub fn apply(&self, input: &Tensor) -> Result<Tensor> {
        if self.code == OpCode::Identity {
            return Ok(input.clone());
        }
        if !input.ty().is_float() {
            return Err(BackendError::Other(format!(
                "{:?} requires a float input, got {}",
                self.code,
                input.ty()
            )));
        }

        let x = input.to_f32_vec()?;
        let (dims, values): (Vec<usize>, Vec<f32>) = match self.code {
            OpCode::Scale => (input.dims().to_vec(), x.iter().map(|v| v * self.param).collect()),
            OpCode::Add => (input.dims().to_vec(), x.iter().map(|v| v + self.param).collect()),
            OpCode::Relu => (input.dims().to_vec(), x.iter().map(|v| v.max(0.0)).collect()),
            OpCode::Sum => (vec![1], vec![x.iter().sum()]),
            OpCode::Identity => (input.dims().to_vec(), x),
        };

        let out = match input.ty() {
            TensorType::F16 => {
                let narrowed: Vec<f16> = values.iter().map(|v| f16::from_f32(*v)).collect();
                Tensor::from_f16(dims, &narrowed)?
            }
            _ => Tensor::from_f32(dims, &values)?,
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn op(code: OpCode, param: f32) -> Op {
        Op {
            code,
            src: 0,
            dst: 0,
            param,
        }
    }

    #[test]
    fn test_opcode_mapping() {
        for raw in 0..=4u8 {
            assert_eq!(OpCode::from_u8(raw).unwrap().to_u8(), raw);
        }
        assert!(OpCode::from_u8(5).is_none());
    }

    #[test]
    fn test_scale_add_relu() {
        let x = Tensor::from_f32(vec![2, 2], &[1.0, -2.0, 3.0, -4.0]).unwrap();

        let y = op(OpCode::Scale, 0.5).apply(&x).unwrap();
        assert_eq!(y.dims(), &[2, 2]);
        assert_eq!(y.to_f32_vec().unwrap(), vec![0.5, -1.0, 1.5, -2.0]);

        let y = op(OpCode::Add, 1.0).apply(&x).unwrap();
        assert_eq!(y.to_f32_vec().unwrap(), vec![2.0, -1.0, 4.0, -3.0]);

        let y = op(OpCode::Relu, 0.0).apply(&x).unwrap();
        assert_eq!(y.to_f32_vec().unwrap(), vec![1.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_sum_reduces() {
        let x = Tensor::from_f32(vec![1, 3], &[0.25, 0.5, 1.0]).unwrap();
        let y = op(OpCode::Sum, 0.0).apply(&x).unwrap();
        assert_eq!(y.dims(), &[1]);
        assert_relative_eq!(y.to_f32_vec().unwrap()[0], 1.75);
    }

    #[test]
    fn test_f16_stays_f16() {
        let x = Tensor::from_f16(vec![2], &[f16::from_f32(1.5), f16::from_f32(-3.0)]).unwrap();
        let y = op(OpCode::Scale, 2.0).apply(&x).unwrap();
        assert_eq!(y.ty(), TensorType::F16);
        let v = y.to_f32_vec().unwrap();
        assert_relative_eq!(v[0], 3.0);
        assert_relative_eq!(v[1], -6.0);
    }

    #[test]
    fn test_integer_inputs() {
        let x = Tensor::from_i32(vec![2], &[1, 2]).unwrap();
        assert_eq!(op(OpCode::Identity, 0.0).apply(&x).unwrap(), x);
        assert!(op(OpCode::Scale, 2.0).apply(&x).is_err());
    }
}

use half::f16;

use crate::dtype::TensorType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// Checks a tensor description for internal consistency.
///
/// The rank must be at least one and the buffer must hold exactly
/// `product(dims) * width(ty)` bytes. This says nothing about whether the
/// shape is what a particular graph expects; see [`TensorSpec::check`].
pub fn validate(dims: &[usize], ty: TensorType, data_len: usize) -> Result<()> {
    if dims.is_empty() {
        return Err(TensorError::ZeroRank);
    }
    let expected = Shape::from_slice(dims)
        .checked_numel()
        .and_then(|n| n.checked_mul(ty.size_in_bytes()))
        .ok_or_else(|| TensorError::ShapeOverflow {
            dims: dims.to_vec(),
        })?;
    if expected != data_len {
        return Err(TensorError::BufferLength {
            dims: dims.to_vec(),
            ty,
            expected,
            got: data_len,
        });
    }
    Ok(())
}

/// A borrowed tensor description pointing at caller-owned memory.
///
/// Nothing here is guaranteed to outlive the call it is passed to, so
/// consumers copy it into a [`Tensor`] with [`TensorView::to_tensor`].
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    pub dims: &'a [usize],
    pub ty: TensorType,
    pub data: &'a [u8],
}

impl<'a> TensorView<'a> {
    pub fn new(dims: &'a [usize], ty: TensorType, data: &'a [u8]) -> Self {
        TensorView { dims, ty, data }
    }

    /// Validates the view, see [`validate`].
    pub fn validate(&self) -> Result<()> {
        validate(self.dims, self.ty, self.data.len())
    }

    /// Validates the view and deep-copies it into an owned tensor.
    pub fn to_tensor(&self) -> Result<Tensor> {
        Tensor::new(self.dims.to_vec(), self.ty, self.data.to_vec())
    }
}

/// An owned, validated tensor: dimensions, element type and a row-major,
/// little-endian byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    shape: Shape,
    ty: TensorType,
    data: Vec<u8>,
}

impl Tensor {
    /// Create a tensor from raw bytes, validating the buffer length.
    pub fn new(dims: Vec<usize>, ty: TensorType, data: Vec<u8>) -> Result<Self> {
        validate(&dims, ty, data.len())?;
        Ok(Tensor {
            shape: Shape::new(dims),
            ty,
            data,
        })
    }

    /// Create an f32 tensor from element values.
    pub fn from_f32(dims: Vec<usize>, values: &[f32]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Tensor::new(dims, TensorType::F32, data)
    }

    /// Create an f16 tensor from element values.
    pub fn from_f16(dims: Vec<usize>, values: &[f16]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Tensor::new(dims, TensorType::F16, data)
    }

    /// Create an i32 tensor from element values.
    pub fn from_i32(dims: Vec<usize>, values: &[i32]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Tensor::new(dims, TensorType::I32, data)
    }

    /// Create a u32 tensor from element values.
    pub fn from_u32(dims: Vec<usize>, values: &[u32]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Tensor::new(dims, TensorType::U32, data)
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Returns the tensor's element type.
    pub fn ty(&self) -> TensorType {
        self.ty
    }

    /// Returns the raw element bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len() / self.ty.size_in_bytes()
    }

    /// Borrow this tensor as a view.
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            dims: self.shape.dims(),
            ty: self.ty,
            data: &self.data,
        }
    }

    /// Decodes the elements as f32, widening f16 values.
    ///
    /// # Errors
    /// Returns `TypeMismatch` for integer tensors.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        match self.ty {
            TensorType::F32 => Ok(self
                .data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()),
            TensorType::F16 => Ok(self
                .data
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect()),
            other => Err(TensorError::TypeMismatch {
                expected: TensorType::F32,
                got: other,
            }),
        }
    }

    pub fn to_i32_vec(&self) -> Result<Vec<i32>> {
        self.expect_type(TensorType::I32)?;
        Ok(self
            .data
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    pub fn to_u32_vec(&self) -> Result<Vec<u32>> {
        self.expect_type(TensorType::U32)?;
        Ok(self
            .data
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn expect_type(&self, expected: TensorType) -> Result<()> {
        if self.ty != expected {
            return Err(TensorError::TypeMismatch {
                expected,
                got: self.ty,
            });
        }
        Ok(())
    }
}

/// The shape and type a graph declares for one of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub dims: Vec<usize>,
    pub ty: TensorType,
}

impl TensorSpec {
    pub fn new(dims: Vec<usize>, ty: TensorType) -> Self {
        TensorSpec { dims, ty }
    }

    /// Requires an exact match of type and dimensions. No reshaping or
    /// coercion is attempted.
    pub fn check(&self, view: &TensorView<'_>) -> Result<()> {
        if view.ty != self.ty {
            return Err(TensorError::TypeMismatch {
                expected: self.ty,
                got: view.ty,
            });
        }
        if view.dims != self.dims.as_slice() {
            return Err(TensorError::ShapeMismatch {
                expected: self.dims.clone(),
                got: view.dims.to_vec(),
            });
        }
        Ok(())
    }
}

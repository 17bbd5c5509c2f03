use std::fmt;

/// Element types that can cross the input/output boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorType {
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
    /// 32-bit floating point.
    F32,
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
}

impl TensorType {
    /// Returns the width in bytes of a single element.
    ///
    /// - F16: 2 bytes
    /// - F32, I32, U32: 4 bytes
    pub fn size_in_bytes(&self) -> usize {
        match self {
            TensorType::F16 => 2,
            TensorType::F32 | TensorType::I32 | TensorType::U32 => 4,
        }
    }

    /// Converts a wire type ID to a `TensorType`.
    ///
    /// Type IDs:
    /// - 0 => F16
    /// - 1 => F32
    /// - 2 => I32
    /// - 3 => U32
    pub fn from_id(id: u32) -> Option<TensorType> {
        match id {
            0 => Some(TensorType::F16),
            1 => Some(TensorType::F32),
            2 => Some(TensorType::I32),
            3 => Some(TensorType::U32),
            _ => None,
        }
    }

    /// Returns the wire type ID for this `TensorType`.
    pub fn to_id(&self) -> u32 {
        match self {
            TensorType::F16 => 0,
            TensorType::F32 => 1,
            TensorType::I32 => 2,
            TensorType::U32 => 3,
        }
    }

    /// Returns true for the floating point types.
    pub fn is_float(&self) -> bool {
        matches!(self, TensorType::F16 | TensorType::F32)
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorType::F16 => write!(f, "f16"),
            TensorType::F32 => write!(f, "f32"),
            TensorType::I32 => write!(f, "i32"),
            TensorType::U32 => write!(f, "u32"),
        }
    }
}

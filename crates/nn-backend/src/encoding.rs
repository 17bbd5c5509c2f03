use std::fmt;

/// Tag naming the format of a graph's encoded bytes.
///
/// The set is open: deployments register backends under `Custom` ids. The
/// `Unknown` tag never has a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphEncoding {
    Unknown,
    /// The built-in reference format, see [`crate::reference`].
    Reference,
    Custom(u32),
}

impl GraphEncoding {
    /// Maps a wire id to an encoding: 0 => Unknown, 1 => Reference,
    /// anything else => Custom(id).
    pub fn from_id(id: u32) -> GraphEncoding {
        match id {
            0 => GraphEncoding::Unknown,
            1 => GraphEncoding::Reference,
            n => GraphEncoding::Custom(n),
        }
    }

    pub fn to_id(&self) -> u32 {
        match self {
            GraphEncoding::Unknown => 0,
            GraphEncoding::Reference => 1,
            GraphEncoding::Custom(n) => *n,
        }
    }
}

impl fmt::Display for GraphEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphEncoding::Unknown => write!(f, "unknown"),
            GraphEncoding::Reference => write!(f, "reference"),
            GraphEncoding::Custom(n) => write!(f, "custom({})", n),
        }
    }
}

/// Hardware a graph is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionTarget {
    Cpu,
    Gpu,
    Tpu,
}

impl ExecutionTarget {
    /// Maps a wire id to a target: 0 => Cpu, 1 => Gpu, 2 => Tpu.
    pub fn from_id(id: u32) -> Option<ExecutionTarget> {
        match id {
            0 => Some(ExecutionTarget::Cpu),
            1 => Some(ExecutionTarget::Gpu),
            2 => Some(ExecutionTarget::Tpu),
            _ => None,
        }
    }

    pub fn to_id(&self) -> u32 {
        match self {
            ExecutionTarget::Cpu => 0,
            ExecutionTarget::Gpu => 1,
            ExecutionTarget::Tpu => 2,
        }
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTarget::Cpu => write!(f, "cpu"),
            ExecutionTarget::Gpu => write!(f, "gpu"),
            ExecutionTarget::Tpu => write!(f, "tpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_ids() {
        assert_eq!(GraphEncoding::from_id(0), GraphEncoding::Unknown);
        assert_eq!(GraphEncoding::from_id(1), GraphEncoding::Reference);
        assert_eq!(GraphEncoding::from_id(77), GraphEncoding::Custom(77));
        assert_eq!(GraphEncoding::Custom(77).to_id(), 77);
    }

    #[test]
    fn test_target_ids() {
        for t in &[ExecutionTarget::Cpu, ExecutionTarget::Gpu, ExecutionTarget::Tpu] {
            assert_eq!(ExecutionTarget::from_id(t.to_id()), Some(*t));
        }
        assert!(ExecutionTarget::from_id(3).is_none());
    }
}

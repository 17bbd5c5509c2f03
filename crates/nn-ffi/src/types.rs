use nn_runtime::{BusyPolicy, ErrorKind, RuntimeConfig};

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NNStatus {
    Ok = 0,
    ErrorUnsupported = 1,
    ErrorInvalidHandle = 2,
    ErrorInvalidArgument = 3,
    ErrorNotReady = 4,
    ErrorBusy = 5,
    ErrorBackend = 6,
    ErrorResourceExhausted = 7,
    ErrorCancelled = 8,
    ErrorInternal = 9,
}

impl From<ErrorKind> for NNStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Unsupported => NNStatus::ErrorUnsupported,
            ErrorKind::InvalidHandle => NNStatus::ErrorInvalidHandle,
            ErrorKind::InvalidArgument => NNStatus::ErrorInvalidArgument,
            ErrorKind::NotReady => NNStatus::ErrorNotReady,
            ErrorKind::Busy => NNStatus::ErrorBusy,
            ErrorKind::BackendFailure => NNStatus::ErrorBackend,
            ErrorKind::ResourceExhausted => NNStatus::ErrorResourceExhausted,
            ErrorKind::Cancelled => NNStatus::ErrorCancelled,
        }
    }
}

/// Behaviour when a context already has a call in flight.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum NNBusyPolicy {
    Reject = 0,
    Block = 1,
}

/// Runtime limits. Zero means unlimited.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct NNRuntimeConfig {
    pub busy_policy: NNBusyPolicy,
    pub max_graphs: u64,
    pub max_contexts: u64,
    pub max_tensor_bytes: u64,
}

impl Default for NNRuntimeConfig {
    fn default() -> Self {
        Self {
            busy_policy: NNBusyPolicy::Reject,
            max_graphs: 0,
            max_contexts: 0,
            max_tensor_bytes: 0,
        }
    }
}

impl From<&NNRuntimeConfig> for RuntimeConfig {
    fn from(cfg: &NNRuntimeConfig) -> Self {
        let clamp = |v: u64| usize::try_from(v).unwrap_or(usize::MAX);
        RuntimeConfig::new()
            .with_busy_policy(match cfg.busy_policy {
                NNBusyPolicy::Reject => BusyPolicy::Reject,
                NNBusyPolicy::Block => BusyPolicy::Block,
            })
            .with_max_graphs(clamp(cfg.max_graphs))
            .with_max_contexts(clamp(cfg.max_contexts))
            .with_max_tensor_bytes(clamp(cfg.max_tensor_bytes))
    }
}

/// A tensor described by caller-owned memory. Only read during the call.
///
/// `ty` is a type id: 0 = f16, 1 = f32, 2 = i32, 3 = u32.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NNTensor {
    pub dims: *const u32,
    pub rank: u32,
    pub ty: u32,
    pub data: *const u8,
    pub data_len: usize,
}

/// A tensor allocated by the library. Release with `nn_tensor_free`.
#[repr(C)]
#[derive(Debug)]
pub struct NNOwnedTensor {
    pub dims: *mut u32,
    pub rank: u32,
    pub ty: u32,
    pub data: *mut u8,
    pub data_len: usize,
}

impl NNOwnedTensor {
    pub fn empty() -> Self {
        Self {
            dims: std::ptr::null_mut(),
            rank: 0,
            ty: 0,
            data: std::ptr::null_mut(),
            data_len: 0,
        }
    }
}

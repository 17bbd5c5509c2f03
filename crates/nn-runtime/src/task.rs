use std::fmt;
use std::marker::PhantomData;

use nn_backend::CancelToken;

use crate::context::ContextGuard;
use crate::error::Result;
use crate::handle::ContextHandle;

/// A compute that has been admitted but not yet run.
///
/// Holding a `ComputeTask` holds the context's lock, so every other call on
/// the same context is blocked or rejected until the task is waited on or
/// dropped. Dropping the task without waiting leaves the context unchanged.
/// The task stays on the thread that created it and cannot outlive the
/// runtime; hand its [`CancelToken`] to whoever enforces a deadline.
pub struct ComputeTask<'rt> {
    handle: ContextHandle,
    guard: ContextGuard,
    cancel: CancelToken,
    _runtime: PhantomData<&'rt ()>,
}

impl<'rt> ComputeTask<'rt> {
    pub(crate) fn new(handle: ContextHandle, guard: ContextGuard) -> Self {
        ComputeTask {
            handle,
            guard,
            cancel: CancelToken::new(),
            _runtime: PhantomData,
        }
    }

    pub fn handle(&self) -> ContextHandle {
        self.handle
    }

    /// A token that aborts this compute at the backend's next check.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the backend to completion and commit its outputs.
    pub fn wait(mut self) -> Result<()> {
        tracing::debug!(handle = %self.handle, "compute started");
        self.guard.run(&self.cancel)
    }
}

impl fmt::Debug for ComputeTask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeTask")
            .field("handle", &self.handle)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

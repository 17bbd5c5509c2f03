/// What a call does when another call is already in flight on the same
/// execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Fail immediately with `Busy`.
    #[default]
    Reject,
    /// Wait for the in-flight call to finish.
    Block,
}

/// Runtime limits and concurrency behaviour.
///
/// Zero means unlimited for every `max_*` field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeConfig {
    pub busy_policy: BusyPolicy,
    /// Maximum number of live graph handles.
    pub max_graphs: usize,
    /// Maximum number of live execution context handles.
    pub max_contexts: usize,
    /// Maximum byte length of a single input tensor.
    pub max_tensor_bytes: usize,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }

    pub fn with_max_graphs(mut self, max: usize) -> Self {
        self.max_graphs = max;
        self
    }

    pub fn with_max_contexts(mut self, max: usize) -> Self {
        self.max_contexts = max;
        self
    }

    pub fn with_max_tensor_bytes(mut self, max: usize) -> Self {
        self.max_tensor_bytes = max;
        self
    }
}

/// True when `current` live entries leave room for one more under `limit`.
pub(crate) fn has_room(current: usize, limit: usize) -> bool {
    limit == 0 || current < limit
}

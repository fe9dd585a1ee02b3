//! Per-item deletion outcomes and the fixed-capacity result sink
//!
//! Every delete attempt produces exactly one [`DeletionOutcome`],
//! success or failure. Outcomes for one resource kind accumulate in a
//! [`ResultSink`] whose capacity is fixed at fan-out time; a full sink
//! is the completion signal for that kind.

use crate::resource_kind::ResourceKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// The result of one delete (or detach) attempt against the control plane.
///
/// Immutable once produced. `response` is the opaque response body,
/// status, or error text captured from the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionOutcome {
    pub success: bool,
    pub response: String,
    /// The request parameters that identify the item, e.g.
    /// `{"router_id": ..., "subnet_id": ...}` for a router interface.
    pub parameters: BTreeMap<String, String>,
}

impl DeletionOutcome {
    pub fn succeeded(parameters: BTreeMap<String, String>, response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: response.into(),
            parameters,
        }
    }

    pub fn failed(parameters: BTreeMap<String, String>, response: impl Into<String>) -> Self {
        Self {
            success: false,
            response: response.into(),
            parameters,
        }
    }
}

/// Append-only collection of outcomes for one resource kind.
///
/// Capacity is fixed when the kind's instances are discovered; the sink
/// is full exactly when every fan-out task has reported. Writers append
/// concurrently-collected outcomes via the fan-out barrier; readers
/// only see the sink after it is full (build-then-freeze).
#[derive(Debug, Clone, Serialize)]
pub struct ResultSink {
    kind: ResourceKind,
    capacity: usize,
    outcomes: Vec<DeletionOutcome>,
}

impl ResultSink {
    /// An empty sink that is immediately full (zero items discovered).
    pub fn empty(kind: ResourceKind) -> Self {
        Self::with_capacity(kind, 0)
    }

    pub fn with_capacity(kind: ResourceKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            outcomes: Vec::with_capacity(capacity),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Full means every expected outcome has arrived.
    pub fn is_full(&self) -> bool {
        self.outcomes.len() == self.capacity
    }

    /// Append one outcome. Appending past capacity is a logic error in
    /// the barrier; the outcome is dropped rather than corrupting the
    /// completion signal.
    pub fn push(&mut self, outcome: DeletionOutcome) {
        debug_assert!(
            self.outcomes.len() < self.capacity,
            "result sink for {} overflowed capacity {}",
            self.kind,
            self.capacity
        );
        if self.outcomes.len() < self.capacity {
            self.outcomes.push(outcome);
        }
    }

    pub fn outcomes(&self) -> &[DeletionOutcome] {
        &self.outcomes
    }

    pub fn successes(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(id: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("network_id".to_string(), id.to_string())])
    }

    #[test]
    fn empty_sink_is_immediately_full() {
        let sink = ResultSink::empty(ResourceKind::Network);
        assert!(sink.is_full());
        assert!(sink.is_empty());
    }

    #[test]
    fn sink_fills_at_capacity() {
        let mut sink = ResultSink::with_capacity(ResourceKind::Network, 2);
        assert!(!sink.is_full());
        sink.push(DeletionOutcome::succeeded(params("a"), "204"));
        assert!(!sink.is_full());
        sink.push(DeletionOutcome::failed(params("b"), "409 conflict"));
        assert!(sink.is_full());
        assert_eq!(sink.successes().count(), 1);
        assert_eq!(sink.failures().count(), 1);
    }

    #[test]
    #[should_panic(expected = "overflowed")]
    fn overflow_is_a_logic_error() {
        let mut sink = ResultSink::with_capacity(ResourceKind::Network, 1);
        sink.push(DeletionOutcome::succeeded(params("a"), "204"));
        sink.push(DeletionOutcome::succeeded(params("b"), "204"));
    }
}

//! Nullable resolver — a fixed answer for every request.

use std::sync::atomic::{AtomicUsize, Ordering};
use veriflow_flow::{OutcomeResolver, ResolveError};
use veriflow_types::{EvidenceRef, Outcome, RequestDescriptor};

pub struct FixedResolver {
    answer: Result<Outcome, ResolveError>,
    calls: AtomicUsize,
}

impl FixedResolver {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            answer: Ok(outcome),
            calls: AtomicUsize::new(0),
        }
    }

    /// A resolver whose backend can never be reached.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            answer: Err(ResolveError::Unreachable(reason.into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OutcomeResolver for FixedResolver {
    fn resolve(
        &self,
        _request: &RequestDescriptor,
        _evidence: &[EvidenceRef],
    ) -> Result<Outcome, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

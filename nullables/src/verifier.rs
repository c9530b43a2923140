//! Nullable verification provider — answers from a script.

use crate::locked;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use veriflow_session::{CollaboratorError, VerificationProvider};
use veriflow_types::{EvidenceRef, Outcome, RequestDescriptor};

/// Returns scripted answers in order. Once the script runs out, the final
/// answer repeats.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Outcome, CollaboratorError>>>,
    last: Mutex<Result<Outcome, CollaboratorError>>,
    calls: AtomicUsize,
    seen_evidence: Mutex<Vec<Vec<EvidenceRef>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Outcome, CollaboratorError>>) -> Self {
        let last = script
            .last()
            .cloned()
            .unwrap_or_else(|| Err(CollaboratorError::Unavailable("empty script".into())));
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
            seen_evidence: Mutex::new(Vec::new()),
        }
    }

    pub fn always(outcome: Outcome) -> Self {
        Self::new(vec![Ok(outcome)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The evidence passed to each call, in call order.
    pub fn seen_evidence(&self) -> Vec<Vec<EvidenceRef>> {
        locked(&self.seen_evidence).clone()
    }
}

#[async_trait]
impl VerificationProvider for ScriptedProvider {
    async fn verify(
        &self,
        _request: &RequestDescriptor,
        evidence: &[EvidenceRef],
    ) -> Result<Outcome, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.seen_evidence).push(evidence.to_vec());
        let next = locked(&self.script).pop_front();
        match next {
            Some(answer) => {
                *locked(&self.last) = answer.clone();
                answer
            }
            None => locked(&self.last).clone(),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

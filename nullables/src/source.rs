//! Nullable request source — an in-memory listing that records answers.

use crate::{locked, FailureQueue};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use veriflow_flow::{terminal_status, trust_delta_for};
use veriflow_session::{CollaboratorError, RequestSource};
use veriflow_types::{Outcome, RequestDescriptor, RequestId, RequestStatus, SubjectId};

/// A recorded `mark_outcome` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkedOutcome {
    pub request: RequestId,
    pub outcome: Outcome,
    pub trust_score_delta: u32,
}

/// Serves the same listing to every subject. Marking an outcome updates the
/// stored status, so the next listing reflects it.
#[derive(Default)]
pub struct NullRequestSource {
    requests: Mutex<Vec<RequestDescriptor>>,
    responses: Mutex<Vec<(RequestId, BTreeMap<String, String>)>>,
    outcomes: Mutex<Vec<MarkedOutcome>>,
    failures: FailureQueue,
}

impl NullRequestSource {
    pub fn new(requests: Vec<RequestDescriptor>) -> Self {
        Self {
            requests: Mutex::new(requests),
            ..Self::default()
        }
    }

    /// Make the next call, whichever it is, fail with `error`.
    pub fn fail_next(&self, error: CollaboratorError) {
        self.failures.push(error);
    }

    pub fn insert(&self, descriptor: RequestDescriptor) {
        locked(&self.requests).push(descriptor);
    }

    pub fn status_of(&self, request: &RequestId) -> Option<RequestStatus> {
        locked(&self.requests)
            .iter()
            .find(|r| &r.id == request)
            .map(|r| r.status)
    }

    pub fn responses(&self) -> Vec<(RequestId, BTreeMap<String, String>)> {
        locked(&self.responses).clone()
    }

    pub fn outcomes(&self) -> Vec<MarkedOutcome> {
        locked(&self.outcomes).clone()
    }

    /// Total trust points awarded so far.
    pub fn trust_score(&self) -> u32 {
        locked(&self.outcomes)
            .iter()
            .map(|o| o.trust_score_delta)
            .sum()
    }
}

#[async_trait]
impl RequestSource for NullRequestSource {
    async fn list_requests(
        &self,
        _subject: &SubjectId,
    ) -> Result<Vec<RequestDescriptor>, CollaboratorError> {
        self.failures.next()?;
        Ok(locked(&self.requests).clone())
    }

    async fn submit_response(
        &self,
        request: &RequestId,
        fields: BTreeMap<String, String>,
    ) -> Result<(), CollaboratorError> {
        self.failures.next()?;
        if !locked(&self.requests).iter().any(|r| &r.id == request) {
            return Err(CollaboratorError::NotFound(request.to_string()));
        }
        locked(&self.responses).push((request.clone(), fields));
        Ok(())
    }

    async fn mark_outcome(
        &self,
        request: &RequestId,
        outcome: Outcome,
        trust_score_delta: u32,
    ) -> Result<(), CollaboratorError> {
        self.failures.next()?;
        let mut requests = locked(&self.requests);
        let descriptor = requests
            .iter_mut()
            .find(|r| &r.id == request)
            .ok_or_else(|| CollaboratorError::NotFound(request.to_string()))?;
        if trust_score_delta != trust_delta_for(descriptor, outcome) {
            return Err(CollaboratorError::Rejected(format!(
                "delta {trust_score_delta} does not match {outcome} for {request}"
            )));
        }
        descriptor.status = terminal_status(outcome);
        drop(requests);
        locked(&self.outcomes).push(MarkedOutcome {
            request: request.clone(),
            outcome,
            trust_score_delta,
        });
        Ok(())
    }
}

use thiserror::Error;
use veriflow_types::{
    AttesterId, EvidenceId, FlowId, KindFamily, MessageId, Outcome, RequestId, TypeError,
};

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("expected step {expected}, flow is at {actual}")]
    WrongStep {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("step {0} accepts no input")]
    StepLocked(&'static str),

    #[error("step {0} has no previous step")]
    NoPreviousStep(&'static str),

    #[error("consent has not been given")]
    ConsentRequired,

    #[error("no attester selected")]
    AttesterRequired,

    #[error("attester {0} is not on the roster")]
    UnknownAttester(AttesterId),

    #[error("at least one evidence item is required")]
    EvidenceRequired,

    #[error("evidence {0} is not attached to this flow")]
    UnknownEvidence(EvidenceId),

    #[error("evidence {0} is already attached to this flow")]
    DuplicateEvidence(EvidenceId),

    #[error("evidence changed while it was being submitted")]
    EvidenceChanged,

    #[error("message text is empty")]
    EmptyMessage,

    #[error("message {0} is already in the transcript")]
    DuplicateMessage(MessageId),

    #[error("request {0} has expired")]
    Expired(RequestId),

    #[error("resolution already in flight")]
    AlreadyResolving,

    #[error("no resolution in flight")]
    NotResolving,

    #[error("flow has not reached a resolved result")]
    NotTerminal,

    #[error("outcome {outcome} is not allowed for {family:?} requests")]
    OutcomeNotAllowed {
        outcome: Outcome,
        family: KindFamily,
    },

    #[error("request {0} is a {1:?} request and cannot run this flow")]
    KindMismatch(RequestId, KindFamily),

    #[error("flow belongs to request {expected}, got {actual}")]
    RequestMismatch {
        expected: RequestId,
        actual: RequestId,
    },

    #[error("unknown flow {0}")]
    UnknownFlow(FlowId),

    #[error("unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("request {request} already has open flow {flow}")]
    AlreadyOpen { request: RequestId, flow: FlowId },

    #[error(transparent)]
    Types(#[from] TypeError),
}

/// Why a resolver could not produce an outcome.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("verification provider unreachable: {0}")]
    Unreachable(String),

    #[error("verification provider rejected the request: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

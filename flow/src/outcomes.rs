//! Flow results: what a finished flow reports to its host.

use crate::error::{FlowError, ResolveError};
use serde::{Deserialize, Serialize};
use veriflow_types::{
    FlowId, Outcome, OutcomeSet, RequestDescriptor, RequestId, RequestStatus, SubjectId,
};

/// How the processing or review step ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Resolution {
    /// The resolver produced an outcome.
    Resolved { outcome: Outcome },
    /// The resolver could not be reached or failed; the flow may be retried.
    Unavailable { reason: String },
}

impl Resolution {
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Resolved { outcome } => Some(*outcome),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Reported to the host when the user continues past the result step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReport {
    pub flow: FlowId,
    pub request: RequestId,
    pub subject: SubjectId,
    pub outcome: Outcome,
    /// Non-zero only for [`Outcome::Success`].
    pub trust_score_delta: u32,
}

/// Trust score awarded for an outcome: the declared delta on success, else nothing.
pub fn trust_delta_for(descriptor: &RequestDescriptor, outcome: Outcome) -> u32 {
    match outcome {
        Outcome::Success => descriptor.trust_score_delta,
        Outcome::RequiresInfo | Outcome::Failed => 0,
    }
}

/// The request status an outcome settles on.
pub fn terminal_status(outcome: Outcome) -> RequestStatus {
    match outcome {
        Outcome::Success => RequestStatus::Completed,
        Outcome::RequiresInfo => RequestStatus::RequiresInfo,
        Outcome::Failed => RequestStatus::Failed,
    }
}

/// Turn a resolver answer into a resolution, writing the terminal status back.
///
/// Resolver errors and outcomes outside the kind's set both become
/// [`Resolution::Unavailable`]; the descriptor status is left untouched then.
pub(crate) fn settle(
    descriptor: &mut RequestDescriptor,
    answer: Result<Outcome, ResolveError>,
) -> Result<Resolution, FlowError> {
    let family = descriptor.family();
    match answer {
        Ok(outcome) if OutcomeSet::for_family(family).contains(outcome) => {
            descriptor.advance_status(terminal_status(outcome))?;
            Ok(Resolution::Resolved { outcome })
        }
        Ok(outcome) => {
            let err = FlowError::OutcomeNotAllowed { outcome, family };
            tracing::warn!(request = %descriptor.id, %outcome, "resolver returned a disallowed outcome");
            Ok(Resolution::Unavailable {
                reason: err.to_string(),
            })
        }
        Err(err) => {
            tracing::warn!(request = %descriptor.id, error = %err, "resolution failed");
            Ok(Resolution::Unavailable {
                reason: err.to_string(),
            })
        }
    }
}

pub fn compute_report(
    flow: FlowId,
    subject: &SubjectId,
    descriptor: &RequestDescriptor,
    outcome: Outcome,
) -> FlowReport {
    FlowReport {
        flow,
        request: descriptor.id.clone(),
        subject: subject.clone(),
        outcome,
        trust_score_delta: trust_delta_for(descriptor, outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriflow_types::{RequestKind, Timestamp};

    fn bvn(delta: u32) -> RequestDescriptor {
        RequestDescriptor::system(
            "req-bvn",
            RequestKind::BankNumber,
            "BVN",
            "First Bank",
            Timestamp::new(10_000),
            delta,
        )
    }

    #[test]
    fn delta_awarded_only_on_success() {
        let req = bvn(15);
        assert_eq!(trust_delta_for(&req, Outcome::Success), 15);
        assert_eq!(trust_delta_for(&req, Outcome::Failed), 0);
        assert_eq!(trust_delta_for(&req, Outcome::RequiresInfo), 0);
    }

    #[test]
    fn report_carries_request_and_subject() {
        let req = bvn(15);
        let report = compute_report(FlowId::new(3), &SubjectId::new("sub-1"), &req, Outcome::Success);
        assert_eq!(report.request, req.id);
        assert_eq!(report.subject.as_str(), "sub-1");
        assert_eq!(report.trust_score_delta, 15);
    }

    #[test]
    fn settle_writes_terminal_status() {
        let mut req = bvn(15);
        req.advance_status(RequestStatus::InProgress).unwrap();
        let resolution = settle(&mut req, Ok(Outcome::Success)).unwrap();
        assert_eq!(resolution.outcome(), Some(Outcome::Success));
        assert_eq!(req.status, RequestStatus::Completed);
    }

    #[test]
    fn settle_refuses_requires_info_for_system_checks() {
        let mut req = bvn(15);
        req.advance_status(RequestStatus::InProgress).unwrap();
        let resolution = settle(&mut req, Ok(Outcome::RequiresInfo)).unwrap();
        assert!(resolution.is_retryable());
        assert_eq!(req.status, RequestStatus::InProgress);
    }

    #[test]
    fn settle_maps_resolver_errors_to_unavailable() {
        let mut req = bvn(15);
        req.advance_status(RequestStatus::InProgress).unwrap();
        let resolution = settle(&mut req, Err(ResolveError::Unreachable("timeout".into()))).unwrap();
        assert_eq!(
            resolution,
            Resolution::Unavailable {
                reason: "verification provider unreachable: timeout".into()
            }
        );
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(Resolution::Unavailable { reason: "timeout".into() }.is_retryable());
        let done = Resolution::Resolved { outcome: Outcome::Failed };
        assert!(!done.is_retryable());
        assert_eq!(done.outcome(), Some(Outcome::Failed));
    }
}

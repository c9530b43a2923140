//! System verification flow: `details -> consent -> processing -> result`.

use crate::error::{FlowError, ResolveError};
use crate::outcomes::{compute_report, settle, FlowReport, Resolution};
use crate::resolver::OutcomeResolver;
use crate::step::{Step, SystemStep};
use veriflow_types::{
    ExpiryPolicy, FlowId, KindFamily, Outcome, RequestDescriptor, RequestId, RequestStatus,
    SubjectId, Timestamp,
};

/// Working state of one automatically resolved check.
#[derive(Clone, Debug)]
pub struct SystemFlow {
    id: FlowId,
    request: RequestId,
    subject: SubjectId,
    step: SystemStep,
    consent: bool,
    resolving: bool,
    resolution: Option<Resolution>,
    expiry_policy: ExpiryPolicy,
}

impl SystemFlow {
    pub fn new(
        id: FlowId,
        subject: SubjectId,
        descriptor: &RequestDescriptor,
        expiry_policy: ExpiryPolicy,
    ) -> Result<Self, FlowError> {
        let family = descriptor.family();
        if family != KindFamily::System {
            return Err(FlowError::KindMismatch(descriptor.id.clone(), family));
        }
        Ok(Self {
            id,
            request: descriptor.id.clone(),
            subject,
            step: SystemStep::Details,
            consent: false,
            resolving: false,
            resolution: None,
            expiry_policy,
        })
    }

    pub fn id(&self) -> FlowId {
        self.id
    }

    pub fn request(&self) -> &RequestId {
        &self.request
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn step(&self) -> SystemStep {
        self.step
    }

    pub fn consent(&self) -> bool {
        self.consent
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    /// Whether the forward control is enabled right now.
    pub fn can_advance(&self) -> bool {
        match self.step {
            SystemStep::Details => true,
            SystemStep::Consent => self.consent,
            SystemStep::Processing | SystemStep::Result => false,
        }
    }

    /// Tick or untick the consent box.
    pub fn set_consent(
        &mut self,
        descriptor: &RequestDescriptor,
        consent: bool,
        now: Timestamp,
    ) -> Result<(), FlowError> {
        self.expect_step(SystemStep::Consent)?;
        if consent {
            self.check_not_expired(descriptor, now)?;
        }
        self.consent = consent;
        Ok(())
    }

    /// Move to the next step if its guard allows.
    ///
    /// Leaving `consent` writes `in-progress` to the descriptor.
    pub fn advance(
        &mut self,
        descriptor: &mut RequestDescriptor,
        now: Timestamp,
    ) -> Result<SystemStep, FlowError> {
        self.check_request(descriptor)?;
        match self.step {
            SystemStep::Details => {}
            SystemStep::Consent => {
                if !self.consent {
                    return Err(FlowError::ConsentRequired);
                }
                self.check_not_expired(descriptor, now)?;
                descriptor.advance_status(RequestStatus::InProgress)?;
            }
            SystemStep::Processing | SystemStep::Result => {
                return Err(FlowError::StepLocked(self.step.name()));
            }
        }
        self.step = self.step.next().unwrap_or(self.step);
        tracing::debug!(flow = %self.id, request = %self.request, step = %self.step, "advanced");
        Ok(self.step)
    }

    /// Return to the previous step. Nothing collected so far is cleared.
    pub fn back(&mut self) -> Result<SystemStep, FlowError> {
        match self.step {
            SystemStep::Details => Err(FlowError::NoPreviousStep(self.step.name())),
            SystemStep::Consent => {
                self.step = SystemStep::Details;
                Ok(self.step)
            }
            SystemStep::Processing | SystemStep::Result => {
                Err(FlowError::StepLocked(self.step.name()))
            }
        }
    }

    /// Mark the single resolver call for this processing entry as in flight.
    pub fn begin_resolution(&mut self) -> Result<(), FlowError> {
        self.expect_step(SystemStep::Processing)?;
        if self.resolving {
            return Err(FlowError::AlreadyResolving);
        }
        self.resolving = true;
        Ok(())
    }

    /// Forget an in-flight resolution whose answer will never arrive.
    pub fn abort_resolution(&mut self) {
        if self.step == SystemStep::Processing {
            self.resolving = false;
        }
    }

    /// Apply the resolver's answer and move to `result`.
    pub fn complete_resolution(
        &mut self,
        descriptor: &mut RequestDescriptor,
        answer: Result<Outcome, ResolveError>,
    ) -> Result<&Resolution, FlowError> {
        self.check_request(descriptor)?;
        self.expect_step(SystemStep::Processing)?;
        if !self.resolving {
            return Err(FlowError::NotResolving);
        }
        let resolution = settle(descriptor, answer)?;
        tracing::info!(flow = %self.id, request = %self.request, ?resolution, "system check resolved");
        self.resolving = false;
        self.step = SystemStep::Result;
        Ok(&*self.resolution.insert(resolution))
    }

    /// Run processing synchronously against a resolver.
    pub fn resolve_with(
        &mut self,
        descriptor: &mut RequestDescriptor,
        resolver: &dyn OutcomeResolver,
    ) -> Result<&Resolution, FlowError> {
        self.check_request(descriptor)?;
        self.begin_resolution()?;
        let answer = resolver.resolve(descriptor, &[]);
        self.complete_resolution(descriptor, answer)
    }

    /// Go back to `processing` after an unavailable resolution.
    pub fn retry(&mut self) -> Result<(), FlowError> {
        self.expect_step(SystemStep::Result)?;
        match self.resolution {
            Some(Resolution::Unavailable { .. }) => {
                self.resolution = None;
                self.step = SystemStep::Processing;
                Ok(())
            }
            _ => Err(FlowError::StepLocked(self.step.name())),
        }
    }

    /// The report handed to the host on "continue".
    pub fn report(&self, descriptor: &RequestDescriptor) -> Result<FlowReport, FlowError> {
        self.check_request(descriptor)?;
        match (self.step, self.resolution.as_ref().and_then(Resolution::outcome)) {
            (SystemStep::Result, Some(outcome)) => {
                Ok(compute_report(self.id, &self.subject, descriptor, outcome))
            }
            _ => Err(FlowError::NotTerminal),
        }
    }

    fn expect_step(&self, expected: SystemStep) -> Result<(), FlowError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(FlowError::WrongStep {
                expected: expected.name(),
                actual: self.step.name(),
            })
        }
    }

    fn check_request(&self, descriptor: &RequestDescriptor) -> Result<(), FlowError> {
        if descriptor.id == self.request {
            Ok(())
        } else {
            Err(FlowError::RequestMismatch {
                expected: self.request.clone(),
                actual: descriptor.id.clone(),
            })
        }
    }

    fn check_not_expired(
        &self,
        descriptor: &RequestDescriptor,
        now: Timestamp,
    ) -> Result<(), FlowError> {
        if self.expiry_policy == ExpiryPolicy::Enforce && descriptor.is_expired(now) {
            return Err(FlowError::Expired(descriptor.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriflow_types::RequestKind;

    const NOW: Timestamp = Timestamp::EPOCH;

    struct Always(Result<Outcome, ResolveError>);

    impl OutcomeResolver for Always {
        fn resolve(
            &self,
            _request: &RequestDescriptor,
            _evidence: &[veriflow_types::EvidenceRef],
        ) -> Result<Outcome, ResolveError> {
            self.0.clone()
        }
        fn name(&self) -> &str {
            "always"
        }
    }

    fn bvn() -> RequestDescriptor {
        RequestDescriptor::system(
            "req-bvn",
            RequestKind::BankNumber,
            "Bank verification number",
            "First Bank",
            Timestamp::new(100_000),
            15,
        )
    }

    fn flow(req: &RequestDescriptor, policy: ExpiryPolicy) -> SystemFlow {
        SystemFlow::new(FlowId::new(1), SubjectId::new("sub-1"), req, policy).unwrap()
    }

    fn at_consent(req: &mut RequestDescriptor) -> SystemFlow {
        let mut f = flow(req, ExpiryPolicy::Advisory);
        f.advance(req, NOW).unwrap();
        f
    }

    #[test]
    fn refuses_attester_requests() {
        let mut req = bvn();
        req.kind = RequestKind::Employment;
        let err = SystemFlow::new(FlowId::new(1), SubjectId::new("s"), &req, ExpiryPolicy::Advisory)
            .unwrap_err();
        assert!(matches!(err, FlowError::KindMismatch(_, KindFamily::Attester)));
    }

    #[test]
    fn consent_gates_processing() {
        let mut req = bvn();
        let mut f = at_consent(&mut req);
        assert!(!f.can_advance());
        assert_eq!(f.advance(&mut req, NOW), Err(FlowError::ConsentRequired));
        assert_eq!(f.step(), SystemStep::Consent);
        assert_eq!(req.status, RequestStatus::Pending);

        f.set_consent(&req, true, NOW).unwrap();
        assert!(f.can_advance());
        assert_eq!(f.advance(&mut req, NOW), Ok(SystemStep::Processing));
        assert_eq!(req.status, RequestStatus::InProgress);
    }

    #[test]
    fn back_from_consent_keeps_consent() {
        let mut req = bvn();
        let mut f = at_consent(&mut req);
        f.set_consent(&req, true, NOW).unwrap();
        assert_eq!(f.back(), Ok(SystemStep::Details));
        assert!(f.consent());
        f.advance(&mut req, NOW).unwrap();
        assert_eq!(f.advance(&mut req, NOW), Ok(SystemStep::Processing));
    }

    #[test]
    fn details_has_no_previous_step() {
        let req = bvn();
        let mut f = flow(&req, ExpiryPolicy::Advisory);
        assert_eq!(f.back(), Err(FlowError::NoPreviousStep("details")));
    }

    #[test]
    fn consent_outside_consent_step_is_rejected() {
        let req = bvn();
        let mut f = flow(&req, ExpiryPolicy::Advisory);
        assert_eq!(
            f.set_consent(&req, true, NOW),
            Err(FlowError::WrongStep {
                expected: "consent",
                actual: "details"
            })
        );
    }

    #[test]
    fn processing_accepts_no_navigation() {
        let mut req = bvn();
        let mut f = at_consent(&mut req);
        f.set_consent(&req, true, NOW).unwrap();
        f.advance(&mut req, NOW).unwrap();
        assert_eq!(f.advance(&mut req, NOW), Err(FlowError::StepLocked("processing")));
        assert_eq!(f.back(), Err(FlowError::StepLocked("processing")));
    }

    #[test]
    fn resolver_is_called_once_per_processing_entry() {
        let mut req = bvn();
        let mut f = at_consent(&mut req);
        f.set_consent(&req, true, NOW).unwrap();
        f.advance(&mut req, NOW).unwrap();
        f.begin_resolution().unwrap();
        assert_eq!(f.begin_resolution(), Err(FlowError::AlreadyResolving));

        f.abort_resolution();
        assert!(!f.is_resolving());
        f.begin_resolution().unwrap();
    }

    #[test]
    fn success_completes_and_reports_delta() {
        let mut req = bvn();
        let mut f = at_consent(&mut req);
        f.set_consent(&req, true, NOW).unwrap();
        f.advance(&mut req, NOW).unwrap();
        let resolution = f.resolve_with(&mut req, &Always(Ok(Outcome::Success))).unwrap();
        assert_eq!(resolution.outcome(), Some(Outcome::Success));
        assert_eq!(f.step(), SystemStep::Result);
        assert_eq!(req.status, RequestStatus::Completed);
        let report = f.report(&req).unwrap();
        assert_eq!(report.trust_score_delta, 15);
    }

    #[test]
    fn unavailable_resolution_can_be_retried() {
        let mut req = bvn();
        let mut f = at_consent(&mut req);
        f.set_consent(&req, true, NOW).unwrap();
        f.advance(&mut req, NOW).unwrap();
        let down = Always(Err(ResolveError::Unreachable("503".into())));
        assert!(f.resolve_with(&mut req, &down).unwrap().is_retryable());
        assert_eq!(f.report(&req), Err(FlowError::NotTerminal));
        assert_eq!(req.status, RequestStatus::InProgress);

        f.retry().unwrap();
        assert_eq!(f.step(), SystemStep::Processing);
        f.resolve_with(&mut req, &Always(Ok(Outcome::Failed))).unwrap();
        assert_eq!(req.status, RequestStatus::Failed);
        assert_eq!(f.report(&req).unwrap().trust_score_delta, 0);
        assert!(f.retry().is_err());
    }

    #[test]
    fn enforced_expiry_blocks_consent() {
        let mut req = bvn();
        let mut f = flow(&req, ExpiryPolicy::Enforce);
        f.advance(&mut req, NOW).unwrap();
        let late = Timestamp::new(200_000);
        assert!(matches!(f.set_consent(&req, true, late), Err(FlowError::Expired(_))));
        assert!(!f.consent());
    }

    #[test]
    fn advisory_expiry_blocks_nothing() {
        let mut req = bvn();
        let mut f = at_consent(&mut req);
        let late = Timestamp::new(200_000);
        f.set_consent(&req, true, late).unwrap();
        assert_eq!(f.advance(&mut req, late), Ok(SystemStep::Processing));
    }

    #[test]
    fn rejects_a_different_descriptor() {
        let req = bvn();
        let mut other = bvn();
        other.id = RequestId::new("req-other");
        let mut f = flow(&req, ExpiryPolicy::Advisory);
        assert!(matches!(
            f.advance(&mut other, NOW),
            Err(FlowError::RequestMismatch { .. })
        ));
    }
}

//! Attester verification flow:
//! `details -> attester-selection -> document-upload -> communication -> review -> result`.
//!
//! Going back never discards what later steps collected: the chosen attester,
//! uploaded evidence and the transcript all survive back/forward navigation.

use crate::error::{FlowError, ResolveError};
use crate::outcomes::{compute_report, settle, FlowReport, Resolution};
use crate::resolver::OutcomeResolver;
use crate::step::{AttesterStep, Step};
use veriflow_types::{
    Attester, AttesterId, ChatMessage, EvidenceId, EvidenceItem, EvidenceRef, ExpiryPolicy,
    FlowId, KindFamily, MessageId, Outcome, RequestDescriptor, RequestId, RequestStatus, Sender,
    SubjectId, Timestamp,
};

/// Working state of one attester review.
#[derive(Clone, Debug)]
pub struct AttesterFlow {
    id: FlowId,
    request: RequestId,
    subject: SubjectId,
    step: AttesterStep,
    selected: Option<AttesterId>,
    evidence: Vec<EvidenceItem>,
    /// Filled on submission; the raw evidence is released at that point.
    submitted: Vec<EvidenceRef>,
    transcript: Vec<ChatMessage>,
    resolving: bool,
    resolution: Option<Resolution>,
    expiry_policy: ExpiryPolicy,
}

impl AttesterFlow {
    pub fn new(
        id: FlowId,
        subject: SubjectId,
        descriptor: &RequestDescriptor,
        expiry_policy: ExpiryPolicy,
    ) -> Result<Self, FlowError> {
        let family = descriptor.family();
        if family != KindFamily::Attester {
            return Err(FlowError::KindMismatch(descriptor.id.clone(), family));
        }
        Ok(Self {
            id,
            request: descriptor.id.clone(),
            subject,
            step: AttesterStep::Details,
            selected: None,
            evidence: Vec::new(),
            submitted: Vec::new(),
            transcript: Vec::new(),
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

    pub fn step(&self) -> AttesterStep {
        self.step
    }

    pub fn selected_attester(&self) -> Option<&AttesterId> {
        self.selected.as_ref()
    }

    pub fn evidence(&self) -> &[EvidenceItem] {
        &self.evidence
    }

    pub fn submitted_evidence(&self) -> &[EvidenceRef] {
        &self.submitted
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
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
            AttesterStep::Details | AttesterStep::Communication => true,
            AttesterStep::AttesterSelection => self.selected.is_some(),
            AttesterStep::DocumentUpload => !self.evidence.is_empty(),
            AttesterStep::Review | AttesterStep::Result => false,
        }
    }

    /// Bind an attester. Selecting again replaces the previous choice.
    pub fn select_attester(&mut self, attester: &Attester) -> Result<(), FlowError> {
        self.expect_step(AttesterStep::AttesterSelection)?;
        self.selected = Some(attester.id.clone());
        tracing::debug!(flow = %self.id, attester = %attester.id, "attester selected");
        Ok(())
    }

    pub fn add_evidence(
        &mut self,
        descriptor: &RequestDescriptor,
        item: EvidenceItem,
        now: Timestamp,
    ) -> Result<(), FlowError> {
        self.expect_step(AttesterStep::DocumentUpload)?;
        self.check_not_expired(descriptor, now)?;
        if self.evidence.iter().any(|e| e.id == item.id) {
            return Err(FlowError::DuplicateEvidence(item.id));
        }
        self.evidence.push(item);
        Ok(())
    }

    pub fn remove_evidence(&mut self, id: &EvidenceId) -> Result<EvidenceItem, FlowError> {
        self.expect_step(AttesterStep::DocumentUpload)?;
        let index = self
            .evidence
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| FlowError::UnknownEvidence(id.clone()))?;
        Ok(self.evidence.remove(index))
    }

    /// Append a message to the transcript.
    pub fn post_message(
        &mut self,
        sender: Sender,
        text: impl Into<String>,
        now: Timestamp,
    ) -> Result<ChatMessage, FlowError> {
        self.expect_step(AttesterStep::Communication)?;
        let text = text.into();
        if text.trim().is_empty() {
            return Err(FlowError::EmptyMessage);
        }
        let message = ChatMessage {
            id: MessageId::new(format!("{}-m{}", self.id.as_u64(), self.transcript.len() + 1)),
            sender,
            text,
            sent_at: now,
        };
        self.transcript.push(message.clone());
        Ok(message)
    }

    /// Append a message delivered by the chat channel as-is.
    pub fn receive_message(&mut self, message: ChatMessage) -> Result<(), FlowError> {
        self.expect_step(AttesterStep::Communication)?;
        if self.transcript.iter().any(|m| m.id == message.id) {
            return Err(FlowError::DuplicateMessage(message.id));
        }
        self.transcript.push(message);
        Ok(())
    }

    /// Move to the next step if its guard allows.
    ///
    /// Leaving attester selection writes `assigned` the first time; leaving
    /// communication submits the attached evidence as-is (see [`Self::submit`]).
    pub fn advance(
        &mut self,
        descriptor: &mut RequestDescriptor,
        now: Timestamp,
    ) -> Result<AttesterStep, FlowError> {
        self.check_request(descriptor)?;
        match self.step {
            AttesterStep::Details => {}
            AttesterStep::AttesterSelection => {
                if self.selected.is_none() {
                    return Err(FlowError::AttesterRequired);
                }
                if descriptor.status == RequestStatus::Pending {
                    descriptor.advance_status(RequestStatus::Assigned)?;
                }
            }
            AttesterStep::DocumentUpload => {
                if self.evidence.is_empty() {
                    return Err(FlowError::EvidenceRequired);
                }
            }
            AttesterStep::Communication => {
                let refs = self.evidence.iter().map(EvidenceItem::reference).collect();
                return self.submit(descriptor, refs, now);
            }
            AttesterStep::Review | AttesterStep::Result => {
                return Err(FlowError::StepLocked(self.step.name()));
            }
        }
        self.step = self.step.next().unwrap_or(self.step);
        tracing::debug!(flow = %self.id, request = %self.request, step = %self.step, "advanced");
        Ok(self.step)
    }

    /// Every guard [`Self::submit`] applies before it touches any state.
    pub fn check_submittable(
        &self,
        descriptor: &RequestDescriptor,
        now: Timestamp,
    ) -> Result<(), FlowError> {
        self.check_request(descriptor)?;
        self.expect_step(AttesterStep::Communication)?;
        if self.evidence.is_empty() {
            return Err(FlowError::EvidenceRequired);
        }
        self.check_not_expired(descriptor, now)
    }

    /// Submit for review with the references the storage collaborator returned.
    ///
    /// Writes `in-review` to the descriptor and releases the raw evidence.
    /// `refs` must name the attached evidence in order; anything else means
    /// the evidence changed after the uploads started.
    pub fn submit(
        &mut self,
        descriptor: &mut RequestDescriptor,
        refs: Vec<EvidenceRef>,
        now: Timestamp,
    ) -> Result<AttesterStep, FlowError> {
        self.check_submittable(descriptor, now)?;
        let attached = self.evidence.iter().map(|e| &e.id);
        if !attached.eq(refs.iter().map(|r| &r.id)) {
            return Err(FlowError::EvidenceChanged);
        }
        descriptor.advance_status(RequestStatus::InReview)?;
        self.submitted = refs;
        self.evidence.clear();
        self.step = AttesterStep::Review;
        tracing::info!(
            flow = %self.id,
            request = %self.request,
            evidence = self.submitted.len(),
            messages = self.transcript.len(),
            "submitted for review"
        );
        Ok(self.step)
    }

    /// Return to the previous step. Nothing collected so far is cleared.
    pub fn back(&mut self) -> Result<AttesterStep, FlowError> {
        match self.step {
            AttesterStep::Details => Err(FlowError::NoPreviousStep(self.step.name())),
            AttesterStep::Review | AttesterStep::Result => {
                Err(FlowError::StepLocked(self.step.name()))
            }
            _ => {
                self.step = self.step.prev().unwrap_or(self.step);
                Ok(self.step)
            }
        }
    }

    pub fn begin_resolution(&mut self) -> Result<(), FlowError> {
        self.expect_step(AttesterStep::Review)?;
        if self.resolving {
            return Err(FlowError::AlreadyResolving);
        }
        self.resolving = true;
        Ok(())
    }

    /// Forget an in-flight resolution whose answer will never arrive.
    pub fn abort_resolution(&mut self) {
        if self.step == AttesterStep::Review {
            self.resolving = false;
        }
    }

    pub fn complete_resolution(
        &mut self,
        descriptor: &mut RequestDescriptor,
        answer: Result<Outcome, ResolveError>,
    ) -> Result<&Resolution, FlowError> {
        self.check_request(descriptor)?;
        self.expect_step(AttesterStep::Review)?;
        if !self.resolving {
            return Err(FlowError::NotResolving);
        }
        let resolution = settle(descriptor, answer)?;
        tracing::info!(flow = %self.id, request = %self.request, ?resolution, "review resolved");
        self.resolving = false;
        self.step = AttesterStep::Result;
        Ok(&*self.resolution.insert(resolution))
    }

    /// Run the review synchronously against a resolver.
    pub fn resolve_with(
        &mut self,
        descriptor: &mut RequestDescriptor,
        resolver: &dyn OutcomeResolver,
    ) -> Result<&Resolution, FlowError> {
        self.check_request(descriptor)?;
        self.begin_resolution()?;
        let answer = resolver.resolve(descriptor, &self.submitted);
        self.complete_resolution(descriptor, answer)
    }

    /// Go back to `review` after an unavailable resolution.
    pub fn retry(&mut self) -> Result<(), FlowError> {
        self.expect_step(AttesterStep::Result)?;
        match self.resolution {
            Some(Resolution::Unavailable { .. }) => {
                self.resolution = None;
                self.step = AttesterStep::Review;
                Ok(())
            }
            _ => Err(FlowError::StepLocked(self.step.name())),
        }
    }

    pub fn report(&self, descriptor: &RequestDescriptor) -> Result<FlowReport, FlowError> {
        self.check_request(descriptor)?;
        match (self.step, self.resolution.as_ref().and_then(Resolution::outcome)) {
            (AttesterStep::Result, Some(outcome)) => {
                Ok(compute_report(self.id, &self.subject, descriptor, outcome))
            }
            _ => Err(FlowError::NotTerminal),
        }
    }

    fn expect_step(&self, expected: AttesterStep) -> Result<(), FlowError> {
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

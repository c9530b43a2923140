//! Flow orchestrator: owns the request descriptors and every open flow, routes
//! user actions to the right flow, and records what changed as events for the
//! host to process.

use crate::attester::AttesterFlow;
use crate::deadline::Countdown;
use crate::error::{FlowError, ResolveError};
use crate::instance::FlowInstance;
use crate::outcomes::{FlowReport, Resolution};
use crate::resolver::OutcomeResolver;
use crate::selection::AttesterRoster;
use std::collections::HashMap;
use std::sync::Arc;
use veriflow_types::{
    AttesterId, ChatMessage, Clock, EvidenceId, EvidenceItem, EvidenceRef, FlowId, FlowParams,
    Outcome, RequestDescriptor, RequestId, RequestStatus, Sender, SubjectId, Timestamp,
};

/// Events emitted by the orchestrator for the host to process.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowEvent {
    Opened { flow: FlowId, request: RequestId },
    StepChanged { flow: FlowId, step: &'static str },
    /// A status was written back to a descriptor.
    StatusChanged {
        request: RequestId,
        status: RequestStatus,
    },
    Resolved {
        flow: FlowId,
        resolution: Resolution,
    },
    /// The user continued past the result; the flow is gone.
    Finished(FlowReport),
    /// The user closed the flow before finishing it.
    Abandoned { flow: FlowId, request: RequestId },
}

/// Everything an asynchronous resolver needs, captured when resolution begins.
#[derive(Clone, Debug)]
pub struct ResolutionTicket {
    pub flow: FlowId,
    /// Distinguishes this resolution from later ones on the same flow.
    pub seq: u64,
    pub request: RequestDescriptor,
    pub evidence: Vec<EvidenceRef>,
}

/// The orchestrator ties descriptors, flows and the resolver together.
pub struct FlowOrchestrator {
    params: FlowParams,
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn OutcomeResolver>,
    roster: AttesterRoster,
    requests: HashMap<RequestId, RequestDescriptor>,
    /// Load order of `requests`, which listings preserve.
    order: Vec<RequestId>,
    flows: HashMap<FlowId, FlowInstance>,
    open_by_request: HashMap<RequestId, FlowId>,
    next_id: FlowId,
    /// Ticket of the resolution each flow is waiting on.
    in_flight: HashMap<FlowId, u64>,
    next_ticket: u64,
    pending_events: Vec<FlowEvent>,
}

impl FlowOrchestrator {
    pub fn new(params: FlowParams, clock: Arc<dyn Clock>, resolver: Arc<dyn OutcomeResolver>) -> Self {
        Self {
            params,
            clock,
            resolver,
            roster: AttesterRoster::default(),
            requests: HashMap::new(),
            order: Vec::new(),
            flows: HashMap::new(),
            open_by_request: HashMap::new(),
            next_id: FlowId::new(1),
            in_flight: HashMap::new(),
            next_ticket: 1,
            pending_events: Vec::new(),
        }
    }

    pub fn with_roster(mut self, roster: AttesterRoster) -> Self {
        self.roster = roster;
        self
    }

    pub fn params(&self) -> &FlowParams {
        &self.params
    }

    pub fn roster(&self) -> &AttesterRoster {
        &self.roster
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Replace the cached descriptors with a fresh listing.
    ///
    /// Malformed descriptors are skipped. A request with an open flow keeps
    /// its local copy, since that flow is writing its status. Returns how many
    /// descriptors were accepted.
    pub fn load_requests(&mut self, listing: Vec<RequestDescriptor>) -> usize {
        let mut requests = HashMap::with_capacity(listing.len());
        let mut order = Vec::with_capacity(listing.len());
        for descriptor in listing {
            if let Err(err) = descriptor.validate() {
                tracing::warn!(request = %descriptor.id, error = %err, "skipping malformed request");
                continue;
            }
            if requests.contains_key(&descriptor.id) {
                tracing::warn!(request = %descriptor.id, "skipping duplicate request");
                continue;
            }
            let descriptor = if self.open_by_request.contains_key(&descriptor.id) {
                self.requests.remove(&descriptor.id).unwrap_or(descriptor)
            } else {
                descriptor
            };
            order.push(descriptor.id.clone());
            requests.insert(descriptor.id.clone(), descriptor);
        }
        // Open flows must keep their descriptor even if the listing dropped it.
        for request in self.open_by_request.keys() {
            if let Some(descriptor) = self.requests.remove(request) {
                order.push(request.clone());
                requests.insert(request.clone(), descriptor);
            }
        }
        let accepted = order.len();
        self.requests = requests;
        self.order = order;
        tracing::debug!(accepted, "requests loaded");
        accepted
    }

    /// All cached descriptors in load order.
    pub fn requests(&self) -> impl Iterator<Item = &RequestDescriptor> {
        self.order.iter().filter_map(|id| self.requests.get(id))
    }

    pub fn request(&self, id: &RequestId) -> Option<&RequestDescriptor> {
        self.requests.get(id)
    }

    pub fn flow(&self, id: FlowId) -> Option<&FlowInstance> {
        self.flows.get(&id)
    }

    pub fn is_open(&self, id: FlowId) -> bool {
        self.flows.contains_key(&id)
    }

    pub fn open_flows(&self) -> usize {
        self.flows.len()
    }

    /// Start a flow for one request on behalf of `subject`.
    pub fn open(&mut self, subject: SubjectId, request: &RequestId) -> Result<FlowId, FlowError> {
        if let Some(&flow) = self.open_by_request.get(request) {
            return Err(FlowError::AlreadyOpen {
                request: request.clone(),
                flow,
            });
        }
        let descriptor = self
            .requests
            .get(request)
            .ok_or_else(|| FlowError::UnknownRequest(request.clone()))?;
        let id = self.next_id;
        let instance = FlowInstance::open(id, subject, descriptor, self.params.expiry_policy)?;
        self.next_id = id.next();
        self.flows.insert(id, instance);
        self.open_by_request.insert(request.clone(), id);
        self.pending_events.push(FlowEvent::Opened {
            flow: id,
            request: request.clone(),
        });
        tracing::info!(flow = %id, %request, "flow opened");
        Ok(id)
    }

    /// Time left on the flow's request.
    pub fn countdown(&self, id: FlowId) -> Result<Countdown, FlowError> {
        let flow = self.flows.get(&id).ok_or(FlowError::UnknownFlow(id))?;
        let descriptor = self
            .requests
            .get(flow.request())
            .ok_or_else(|| FlowError::UnknownRequest(flow.request().clone()))?;
        Ok(Countdown::until(descriptor.expires_at, self.clock.now()))
    }

    pub fn advance(&mut self, id: FlowId) -> Result<&'static str, FlowError> {
        self.with_flow(id, |flow, descriptor, now| flow.advance(descriptor, now))
    }

    pub fn back(&mut self, id: FlowId) -> Result<&'static str, FlowError> {
        self.with_flow(id, |flow, _, _| flow.back())
    }

    pub fn set_consent(&mut self, id: FlowId, consent: bool) -> Result<(), FlowError> {
        self.with_flow(id, |flow, descriptor, now| {
            let request = descriptor.id.clone();
            let family = descriptor.family();
            flow.as_system_mut()
                .ok_or(FlowError::KindMismatch(request, family))?
                .set_consent(descriptor, consent, now)
        })
    }

    pub fn select_attester(&mut self, id: FlowId, attester: &AttesterId) -> Result<(), FlowError> {
        let attester = self
            .roster
            .get(attester)
            .cloned()
            .ok_or_else(|| FlowError::UnknownAttester(attester.clone()))?;
        self.with_flow(id, |flow, descriptor, _| {
            attester_flow(flow, descriptor)?.select_attester(&attester)
        })
    }

    pub fn add_evidence(&mut self, id: FlowId, item: EvidenceItem) -> Result<(), FlowError> {
        self.with_flow(id, |flow, descriptor, now| {
            attester_flow(flow, descriptor)?.add_evidence(descriptor, item, now)
        })
    }

    pub fn remove_evidence(
        &mut self,
        id: FlowId,
        evidence: &EvidenceId,
    ) -> Result<EvidenceItem, FlowError> {
        self.with_flow(id, |flow, descriptor, _| {
            attester_flow(flow, descriptor)?.remove_evidence(evidence)
        })
    }

    pub fn post_message(
        &mut self,
        id: FlowId,
        sender: Sender,
        text: impl Into<String>,
    ) -> Result<ChatMessage, FlowError> {
        self.with_flow(id, |flow, descriptor, now| {
            attester_flow(flow, descriptor)?.post_message(sender, text, now)
        })
    }

    /// Append a message delivered by the chat channel, keeping its id and time.
    pub fn receive_message(&mut self, id: FlowId, message: ChatMessage) -> Result<(), FlowError> {
        self.with_flow(id, |flow, descriptor, _| {
            attester_flow(flow, descriptor)?.receive_message(message)
        })
    }

    /// Fail now with whatever [`Self::submit`] would refuse, before any upload.
    pub fn check_submittable(&self, id: FlowId) -> Result<(), FlowError> {
        let flow = self.flows.get(&id).ok_or(FlowError::UnknownFlow(id))?;
        let descriptor = self
            .requests
            .get(flow.request())
            .ok_or_else(|| FlowError::UnknownRequest(flow.request().clone()))?;
        flow.as_attester()
            .ok_or_else(|| FlowError::KindMismatch(descriptor.id.clone(), descriptor.family()))?
            .check_submittable(descriptor, self.clock.now())
    }

    /// Submit an attester flow for review with uploaded evidence references.
    pub fn submit(&mut self, id: FlowId, refs: Vec<EvidenceRef>) -> Result<(), FlowError> {
        self.with_flow(id, |flow, descriptor, now| {
            attester_flow(flow, descriptor)?
                .submit(descriptor, refs, now)
                .map(|_| ())
        })
    }

    /// Run processing or review synchronously against the injected resolver.
    pub fn resolve(&mut self, id: FlowId) -> Result<Resolution, FlowError> {
        let resolver = Arc::clone(&self.resolver);
        let resolution = self.with_flow(id, |flow, descriptor, _| {
            flow.begin_resolution()?;
            let answer = resolver.resolve(descriptor, flow.resolver_evidence());
            flow.complete_resolution(descriptor, answer).cloned()
        })?;
        self.pending_events.push(FlowEvent::Resolved {
            flow: id,
            resolution: resolution.clone(),
        });
        Ok(resolution)
    }

    /// Mark resolution as in flight and capture what the resolver needs.
    pub fn begin_resolution(&mut self, id: FlowId) -> Result<ResolutionTicket, FlowError> {
        let seq = self.next_ticket;
        let ticket = self.with_flow(id, |flow, descriptor, _| {
            flow.begin_resolution()?;
            Ok(ResolutionTicket {
                flow: id,
                seq,
                request: descriptor.clone(),
                evidence: flow.resolver_evidence().to_vec(),
            })
        })?;
        self.next_ticket += 1;
        self.in_flight.insert(id, seq);
        Ok(ticket)
    }

    /// Give up on the resolution behind ticket `seq`, so the flow can resolve again.
    ///
    /// Returns `false` if that resolution already completed, or the flow moved
    /// on to a newer one or closed.
    pub fn abort_resolution(&mut self, id: FlowId, seq: u64) -> bool {
        if self.in_flight.get(&id) != Some(&seq) {
            return false;
        }
        self.in_flight.remove(&id);
        match self.flows.get_mut(&id) {
            Some(flow) => {
                flow.abort_resolution();
                tracing::debug!(flow = %id, seq, "resolution abandoned");
                true
            }
            None => false,
        }
    }

    /// Apply an answer obtained from a ticket.
    ///
    /// Returns `Ok(None)` when the flow was closed while the answer was in
    /// flight; the answer is then dropped without touching any state.
    pub fn complete_resolution(
        &mut self,
        id: FlowId,
        answer: Result<Outcome, ResolveError>,
    ) -> Result<Option<Resolution>, FlowError> {
        if !self.flows.contains_key(&id) {
            tracing::debug!(flow = %id, "discarding resolution for closed flow");
            return Ok(None);
        }
        self.in_flight.remove(&id);
        let resolution = self.with_flow(id, |flow, descriptor, _| {
            flow.complete_resolution(descriptor, answer).cloned()
        })?;
        self.pending_events.push(FlowEvent::Resolved {
            flow: id,
            resolution: resolution.clone(),
        });
        Ok(Some(resolution))
    }

    /// Leave an unavailable result and try resolving again.
    pub fn retry(&mut self, id: FlowId) -> Result<(), FlowError> {
        self.with_flow(id, |flow, _, _| flow.retry())
    }

    /// The report `finish` would produce, without destroying the flow.
    pub fn report(&self, id: FlowId) -> Result<FlowReport, FlowError> {
        let flow = self.flows.get(&id).ok_or(FlowError::UnknownFlow(id))?;
        let descriptor = self
            .requests
            .get(flow.request())
            .ok_or_else(|| FlowError::UnknownRequest(flow.request().clone()))?;
        flow.report(descriptor)
    }

    /// The "continue" action on the result step: report and destroy the flow.
    pub fn finish(&mut self, id: FlowId) -> Result<FlowReport, FlowError> {
        let flow = self.flows.get(&id).ok_or(FlowError::UnknownFlow(id))?;
        let descriptor = self
            .requests
            .get(flow.request())
            .ok_or_else(|| FlowError::UnknownRequest(flow.request().clone()))?;
        let report = flow.report(descriptor)?;
        self.flows.remove(&id);
        self.open_by_request.remove(&report.request);
        tracing::info!(
            flow = %id,
            request = %report.request,
            outcome = %report.outcome,
            delta = report.trust_score_delta,
            "flow finished"
        );
        self.pending_events.push(FlowEvent::Finished(report.clone()));
        Ok(report)
    }

    /// Close a flow at any step. Any in-flight resolution is discarded on arrival.
    pub fn close(&mut self, id: FlowId) -> Result<(), FlowError> {
        let flow = self.flows.remove(&id).ok_or(FlowError::UnknownFlow(id))?;
        let request = flow.request().clone();
        self.open_by_request.remove(&request);
        self.in_flight.remove(&id);
        tracing::info!(
            flow = %id,
            %request,
            step = flow.step_name(),
            resolving = flow.is_resolving(),
            "flow closed"
        );
        self.pending_events
            .push(FlowEvent::Abandoned { flow: id, request });
        Ok(())
    }

    /// Drain all pending events.
    pub fn drain_events(&mut self) -> Vec<FlowEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Run `op` against a flow and its descriptor, recording step and status changes.
    fn with_flow<T>(
        &mut self,
        id: FlowId,
        op: impl FnOnce(&mut FlowInstance, &mut RequestDescriptor, Timestamp) -> Result<T, FlowError>,
    ) -> Result<T, FlowError> {
        let now = self.clock.now();
        let flow = self.flows.get_mut(&id).ok_or(FlowError::UnknownFlow(id))?;
        let descriptor = self
            .requests
            .get_mut(flow.request())
            .ok_or_else(|| FlowError::UnknownRequest(flow.request().clone()))?;
        let step_before = flow.step_name();
        let status_before = descriptor.status;

        let out = op(&mut *flow, &mut *descriptor, now)?;

        if descriptor.status != status_before {
            self.pending_events.push(FlowEvent::StatusChanged {
                request: descriptor.id.clone(),
                status: descriptor.status,
            });
        }
        if flow.step_name() != step_before {
            self.pending_events.push(FlowEvent::StepChanged {
                flow: id,
                step: flow.step_name(),
            });
        }
        Ok(out)
    }
}

fn attester_flow<'a>(
    flow: &'a mut FlowInstance,
    descriptor: &RequestDescriptor,
) -> Result<&'a mut AttesterFlow, FlowError> {
    flow.as_attester_mut()
        .ok_or_else(|| FlowError::KindMismatch(descriptor.id.clone(), descriptor.family()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriflow_nullables::NullClock;
    use veriflow_types::{Attester, AttesterDetails, Priority, RequestKind};

    struct Always(Outcome);

    impl OutcomeResolver for Always {
        fn resolve(
            &self,
            _request: &RequestDescriptor,
            _evidence: &[EvidenceRef],
        ) -> Result<Outcome, ResolveError> {
            Ok(self.0)
        }
        fn name(&self) -> &str {
            "always"
        }
    }

    fn bvn() -> RequestDescriptor {
        RequestDescriptor::system(
            "req-bvn",
            RequestKind::BankNumber,
            "BVN",
            "First Bank",
            Timestamp::new(2_000),
            15,
        )
    }

    fn education() -> RequestDescriptor {
        RequestDescriptor::attester(
            "req-edu",
            RequestKind::Education,
            "Degree",
            "University",
            Timestamp::new(2_000),
            30,
            AttesterDetails {
                required_documents: vec!["Transcript".into()],
                priority: Priority::Urgent,
            },
        )
    }

    fn orchestrator(outcome: Outcome) -> FlowOrchestrator {
        let roster = AttesterRoster::new(vec![
            Attester::new("a1", "Ada", 4.8, "Education", "2h").unwrap(),
        ]);
        let mut orch = FlowOrchestrator::new(
            FlowParams::default(),
            Arc::new(NullClock::new(1_000)),
            Arc::new(Always(outcome)),
        )
        .with_roster(roster);
        orch.load_requests(vec![bvn(), education()]);
        orch
    }

    fn subject() -> SubjectId {
        SubjectId::new("sub-1")
    }

    #[test]
    fn one_open_flow_per_request() {
        let mut orch = orchestrator(Outcome::Success);
        let id = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        assert_eq!(
            orch.open(subject(), &RequestId::new("req-bvn")),
            Err(FlowError::AlreadyOpen {
                request: RequestId::new("req-bvn"),
                flow: id
            })
        );
        orch.close(id).unwrap();
        let reopened = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        assert_ne!(reopened, id);
    }

    #[test]
    fn unknown_request_cannot_be_opened() {
        let mut orch = orchestrator(Outcome::Success);
        assert_eq!(
            orch.open(subject(), &RequestId::new("nope")),
            Err(FlowError::UnknownRequest(RequestId::new("nope")))
        );
    }

    #[test]
    fn system_flow_writes_status_and_emits_events() {
        let mut orch = orchestrator(Outcome::Success);
        let id = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        orch.advance(id).unwrap();
        orch.set_consent(id, true).unwrap();
        assert_eq!(orch.advance(id), Ok("processing"));
        orch.resolve(id).unwrap();
        let report = orch.finish(id).unwrap();
        assert_eq!(report.trust_score_delta, 15);
        assert_eq!(
            orch.request(&RequestId::new("req-bvn")).unwrap().status,
            RequestStatus::Completed
        );
        assert!(!orch.is_open(id));

        let events = orch.drain_events();
        assert!(events.contains(&FlowEvent::StatusChanged {
            request: RequestId::new("req-bvn"),
            status: RequestStatus::InProgress,
        }));
        assert!(matches!(events.last(), Some(FlowEvent::Finished(_))));
        assert!(orch.drain_events().is_empty());
    }

    #[test]
    fn attester_actions_on_a_system_flow_are_refused() {
        let mut orch = orchestrator(Outcome::Success);
        let id = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        assert!(matches!(
            orch.add_evidence(id, EvidenceItem::new("e1", "x.pdf", vec![1])),
            Err(FlowError::KindMismatch(..))
        ));
    }

    #[test]
    fn selecting_an_unlisted_attester_fails() {
        let mut orch = orchestrator(Outcome::Success);
        let id = orch.open(subject(), &RequestId::new("req-edu")).unwrap();
        orch.advance(id).unwrap();
        assert_eq!(
            orch.select_attester(id, &AttesterId::new("ghost")),
            Err(FlowError::UnknownAttester(AttesterId::new("ghost")))
        );
        orch.select_attester(id, &AttesterId::new("a1")).unwrap();
    }

    #[test]
    fn late_resolution_for_closed_flow_is_dropped() {
        let mut orch = orchestrator(Outcome::Success);
        let id = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        orch.advance(id).unwrap();
        orch.set_consent(id, true).unwrap();
        orch.advance(id).unwrap();
        let ticket = orch.begin_resolution(id).unwrap();
        assert_eq!(ticket.request.status, RequestStatus::InProgress);
        orch.close(id).unwrap();

        assert_eq!(orch.complete_resolution(id, Ok(Outcome::Success)), Ok(None));
        assert_eq!(
            orch.request(&RequestId::new("req-bvn")).unwrap().status,
            RequestStatus::InProgress
        );
    }

    #[test]
    fn aborting_a_resolution_frees_the_flow() {
        let mut orch = orchestrator(Outcome::Success);
        let id = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        orch.advance(id).unwrap();
        orch.set_consent(id, true).unwrap();
        orch.advance(id).unwrap();

        let first = orch.begin_resolution(id).unwrap();
        assert_eq!(orch.begin_resolution(id).unwrap_err(), FlowError::AlreadyResolving);
        assert!(!orch.abort_resolution(id, first.seq + 1));
        assert!(orch.abort_resolution(id, first.seq));
        assert!(!orch.abort_resolution(id, first.seq));

        let second = orch.begin_resolution(id).unwrap();
        assert_ne!(second.seq, first.seq);
        assert!(!orch.abort_resolution(id, first.seq));
        let resolution = orch.complete_resolution(id, Ok(Outcome::Success)).unwrap();
        assert_eq!(resolution.and_then(|r| r.outcome()), Some(Outcome::Success));
        assert!(!orch.abort_resolution(id, second.seq));
    }

    #[test]
    fn submittable_check_runs_the_submit_guards() {
        let mut orch = orchestrator(Outcome::Success);
        let bvn = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        assert!(matches!(orch.check_submittable(bvn), Err(FlowError::KindMismatch(..))));

        let id = orch.open(subject(), &RequestId::new("req-edu")).unwrap();
        assert!(matches!(orch.check_submittable(id), Err(FlowError::WrongStep { .. })));
        orch.advance(id).unwrap();
        orch.select_attester(id, &AttesterId::new("a1")).unwrap();
        orch.advance(id).unwrap();
        orch.add_evidence(id, EvidenceItem::new("e1", "transcript.pdf", vec![1]))
            .unwrap();
        orch.advance(id).unwrap();
        assert_eq!(orch.check_submittable(id), Ok(()));
    }

    #[test]
    fn reload_keeps_descriptor_of_open_flow() {
        let mut orch = orchestrator(Outcome::Success);
        let id = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        orch.advance(id).unwrap();
        orch.set_consent(id, true).unwrap();
        orch.advance(id).unwrap();

        // The source still reports it as pending.
        let accepted = orch.load_requests(vec![bvn(), education()]);
        assert_eq!(accepted, 2);
        assert_eq!(
            orch.request(&RequestId::new("req-bvn")).unwrap().status,
            RequestStatus::InProgress
        );
        let ids: Vec<&str> = orch.requests().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["req-bvn", "req-edu"]);
    }

    #[test]
    fn malformed_and_duplicate_requests_are_skipped() {
        let mut orch = orchestrator(Outcome::Success);
        let mut broken = education();
        broken.id = RequestId::new("req-broken");
        broken.attester_details = None;
        assert_eq!(orch.load_requests(vec![bvn(), bvn(), broken]), 1);
    }

    #[test]
    fn countdown_uses_injected_clock() {
        let mut orch = orchestrator(Outcome::Success);
        let id = orch.open(subject(), &RequestId::new("req-bvn")).unwrap();
        assert_eq!(orch.countdown(id).unwrap().to_string(), "00:00:16:40");
    }
}

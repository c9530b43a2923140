//! The verification desk: one subject's flows, wired to the outside world.

use crate::close::CloseSignal;
use crate::collaborators::Collaborators;
use crate::config::DeskConfig;
use crate::error::SessionError;
use crate::retry::{with_retry, RetryPolicy};
use crate::ticker::DeadlineTicker;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use veriflow_dashboard::{BucketCounts, Dashboard, DashboardView, StatusFilter};
use veriflow_flow::{
    AttesterStep, Countdown, FlowError, FlowEvent, FlowOrchestrator, FlowReport, Resolution,
    ResolutionTicket, ResolveError, Step,
};
use veriflow_types::{
    AttesterId, ChatMessage, Clock, EvidenceId, EvidenceItem, EvidenceRef, FlowId, KindFamily,
    RequestDescriptor, RequestId, Sender, SubjectId,
};

/// Per-flow resources that only exist while the flow is open.
struct FlowSession {
    request: RequestId,
    ticker: DeadlineTicker,
    close: CloseSignal,
    /// Uploads already done for this flow, so a retried submit skips them.
    uploaded: HashMap<EvidenceId, EvidenceRef>,
    inbox: Option<mpsc::Receiver<ChatMessage>>,
    /// Held while the flow is submitting or finishing; step actions are
    /// refused until it is released.
    work: Arc<Mutex<()>>,
}

/// Releases a resolution that was dropped before its answer was applied.
struct PendingResolution {
    orchestrator: Option<Arc<Mutex<FlowOrchestrator>>>,
    flow: FlowId,
    seq: u64,
}

impl PendingResolution {
    fn new(orchestrator: Arc<Mutex<FlowOrchestrator>>, ticket: &ResolutionTicket) -> Self {
        Self {
            orchestrator: Some(orchestrator),
            flow: ticket.flow,
            seq: ticket.seq,
        }
    }

    fn disarm(&mut self) {
        self.orchestrator = None;
    }
}

impl Drop for PendingResolution {
    fn drop(&mut self) {
        let Some(orchestrator) = self.orchestrator.take() else {
            return;
        };
        let (flow, seq) = (self.flow, self.seq);
        if let Ok(mut orch) = orchestrator.try_lock() {
            orch.abort_resolution(flow, seq);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    orchestrator.lock().await.abort_resolution(flow, seq);
                });
            }
            Err(_) => tracing::warn!(%flow, seq, "resolution dropped outside the runtime"),
        }
    }
}

/// Async façade over a [`FlowOrchestrator`] for one subject.
///
/// Locks are never held across a collaborator call. When both are needed the
/// orchestrator is locked before the sessions.
pub struct VerificationDesk {
    subject: SubjectId,
    config: DeskConfig,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    collaborators: Collaborators,
    orchestrator: Arc<Mutex<FlowOrchestrator>>,
    sessions: Mutex<HashMap<FlowId, FlowSession>>,
    dashboard: Mutex<Dashboard>,
}

impl VerificationDesk {
    pub fn new(
        subject: SubjectId,
        config: DeskConfig,
        orchestrator: FlowOrchestrator,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            subject,
            retry: config.retry_policy(),
            config,
            clock: orchestrator.clock(),
            collaborators,
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            sessions: Mutex::new(HashMap::new()),
            dashboard: Mutex::new(Dashboard::new()),
        }
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    // ── Dashboard ──────────────────────────────────────────────────────

    /// Re-read the subject's requests from the source.
    pub async fn refresh(&self) -> Result<usize, SessionError> {
        let source = &self.collaborators.source;
        let subject = &self.subject;
        let listing = with_retry(&self.retry, "list_requests", move || {
            source.list_requests(subject)
        })
        .await?;

        let (accepted, snapshot): (usize, Vec<RequestDescriptor>) = {
            let mut orch = self.orchestrator.lock().await;
            let accepted = orch.load_requests(listing);
            (accepted, orch.requests().cloned().collect())
        };
        self.dashboard.lock().await.load(snapshot);
        tracing::debug!(subject = %self.subject, accepted, "requests refreshed");
        Ok(accepted)
    }

    pub async fn view(&self, tab: StatusFilter) -> DashboardView {
        let now = self.clock.now();
        self.dashboard.lock().await.view(tab, now)
    }

    pub async fn counts(&self) -> Option<BucketCounts> {
        let now = self.clock.now();
        self.dashboard.lock().await.counts(now)
    }

    // ── Flow lifecycle ─────────────────────────────────────────────────

    /// Open a flow and start its deadline ticker.
    pub async fn open(&self, request: &RequestId) -> Result<FlowId, SessionError> {
        let (flow, expires_at, is_attester) = {
            let mut orch = self.orchestrator.lock().await;
            let flow = orch.open(self.subject.clone(), request)?;
            let descriptor = orch
                .request(request)
                .ok_or_else(|| FlowError::UnknownRequest(request.clone()))?;
            (
                flow,
                descriptor.expires_at,
                descriptor.family() == KindFamily::Attester,
            )
        };

        let inbox = match (&self.collaborators.messaging, is_attester) {
            (Some(messaging), true) => match messaging.subscribe(request).await {
                Ok(rx) => Some(rx),
                Err(err) => {
                    tracing::warn!(%flow, %request, error = %err, "chat unavailable");
                    None
                }
            },
            _ => None,
        };

        let ticker =
            DeadlineTicker::spawn(expires_at, Arc::clone(&self.clock), self.config.tick_interval());
        self.sessions.lock().await.insert(
            flow,
            FlowSession {
                request: request.clone(),
                ticker,
                close: CloseSignal::new(),
                uploaded: HashMap::new(),
                inbox,
                work: Arc::new(Mutex::new(())),
            },
        );
        Ok(flow)
    }

    /// Close a flow at any step, cancelling whatever it was waiting on.
    pub async fn close(&self, flow: FlowId) -> Result<(), SessionError> {
        self.orchestrator.lock().await.close(flow)?;
        if let Some(session) = self.sessions.lock().await.remove(&flow) {
            session.close.close();
            tracing::debug!(%flow, request = %session.request, "flow session released");
        }
        Ok(())
    }

    /// Report the outcome to the source, destroy the flow, and refresh.
    ///
    /// If the source cannot be told, the flow stays on its result step so the
    /// call can be repeated.
    ///
    /// A second `finish` while the first is still reporting is refused with
    /// [`SessionError::Busy`], so the outcome is reported once.
    pub async fn finish(&self, flow: FlowId) -> Result<FlowReport, SessionError> {
        let _finishing = self.claim(flow).await?;
        let report = self.orchestrator.lock().await.report(flow)?;

        let source = &self.collaborators.source;
        let pending = &report;
        with_retry(&self.retry, "mark_outcome", move || {
            source.mark_outcome(&pending.request, pending.outcome, pending.trust_score_delta)
        })
        .await?;

        let report = self.orchestrator.lock().await.finish(flow)?;
        self.sessions.lock().await.remove(&flow);
        if let Err(err) = self.refresh().await {
            tracing::warn!(%flow, error = %err, "refresh after finish failed");
        }
        Ok(report)
    }

    pub async fn open_flows(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn drain_events(&self) -> Vec<FlowEvent> {
        self.orchestrator.lock().await.drain_events()
    }

    // ── Deadlines ──────────────────────────────────────────────────────

    /// The latest countdown published by the flow's ticker.
    pub async fn countdown(&self, flow: FlowId) -> Result<Countdown, SessionError> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(&flow).ok_or(FlowError::UnknownFlow(flow))?;
        Ok(session.ticker.current())
    }

    pub async fn watch_countdown(
        &self,
        flow: FlowId,
    ) -> Result<watch::Receiver<Countdown>, SessionError> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(&flow).ok_or(FlowError::UnknownFlow(flow))?;
        Ok(session.ticker.subscribe())
    }

    // ── Step actions ───────────────────────────────────────────────────

    /// Go to the next step. Leaving communication submits the attester flow.
    ///
    /// Entering processing or review only moves the step; the host then calls
    /// [`Self::resolve`] to wait for the outcome.
    pub async fn advance(&self, flow: FlowId) -> Result<&'static str, SessionError> {
        {
            let mut orch = self.orchestrator.lock().await;
            self.ensure_idle(flow).await?;
            let at_communication = orch
                .flow(flow)
                .ok_or(FlowError::UnknownFlow(flow))?
                .as_attester()
                .is_some_and(|f| f.step() == AttesterStep::Communication);
            if !at_communication {
                return Ok(orch.advance(flow)?);
            }
        }
        self.submit(flow).await?;
        Ok(AttesterStep::Review.name())
    }

    pub async fn back(&self, flow: FlowId) -> Result<&'static str, SessionError> {
        self.act(flow, |orch| orch.back(flow)).await
    }

    pub async fn set_consent(&self, flow: FlowId, consent: bool) -> Result<(), SessionError> {
        self.act(flow, |orch| orch.set_consent(flow, consent)).await
    }

    pub async fn select_attester(
        &self,
        flow: FlowId,
        attester: &AttesterId,
    ) -> Result<(), SessionError> {
        self.act(flow, |orch| orch.select_attester(flow, attester))
            .await
    }

    pub async fn add_evidence(&self, flow: FlowId, item: EvidenceItem) -> Result<(), SessionError> {
        self.act(flow, |orch| orch.add_evidence(flow, item)).await
    }

    pub async fn remove_evidence(
        &self,
        flow: FlowId,
        evidence: &EvidenceId,
    ) -> Result<EvidenceItem, SessionError> {
        self.act(flow, |orch| orch.remove_evidence(flow, evidence))
            .await
    }

    /// Post the subject's message and forward it to the attester.
    ///
    /// The message is kept in the transcript even if delivery fails.
    pub async fn post_message(
        &self,
        flow: FlowId,
        text: impl Into<String>,
    ) -> Result<ChatMessage, SessionError> {
        let (message, request) = {
            let mut orch = self.orchestrator.lock().await;
            self.ensure_idle(flow).await?;
            let message = orch.post_message(flow, Sender::User, text)?;
            let request = orch
                .flow(flow)
                .ok_or(FlowError::UnknownFlow(flow))?
                .request()
                .clone();
            (message, request)
        };
        if let Some(messaging) = &self.collaborators.messaging {
            let outgoing = &message;
            let request = &request;
            with_retry(&self.retry, "send_message", move || {
                messaging.send_message(request, outgoing)
            })
            .await?;
        }
        Ok(message)
    }

    /// Move attester replies that have arrived into the transcript.
    ///
    /// Replies wait in the inbox until the flow is on its communication step
    /// and keep the id and timestamp the channel gave them.
    pub async fn receive_messages(&self, flow: FlowId) -> Result<usize, SessionError> {
        let mut orch = self.orchestrator.lock().await;
        self.ensure_idle(flow).await?;
        let at_communication = orch
            .flow(flow)
            .ok_or(FlowError::UnknownFlow(flow))?
            .as_attester()
            .is_some_and(|f| f.step() == AttesterStep::Communication);
        if !at_communication {
            return Ok(0);
        }

        let mut sessions = self.sessions.lock().await;
        let Some(inbox) = sessions.get_mut(&flow).and_then(|s| s.inbox.as_mut()) else {
            return Ok(0);
        };
        let mut received = 0;
        while let Ok(message) = inbox.try_recv() {
            orch.receive_message(flow, message)?;
            received += 1;
        }
        Ok(received)
    }

    /// The attester flow's chat transcript.
    pub async fn transcript(&self, flow: FlowId) -> Result<Vec<ChatMessage>, SessionError> {
        let orch = self.orchestrator.lock().await;
        let instance = orch.flow(flow).ok_or(FlowError::UnknownFlow(flow))?;
        let attester = instance.as_attester().ok_or_else(|| {
            FlowError::KindMismatch(instance.request().clone(), KindFamily::System)
        })?;
        Ok(attester.transcript().to_vec())
    }

    /// Upload the attached evidence and submit the flow for review.
    ///
    /// Each item is uploaded at most once per flow, so a submit that failed
    /// part-way can simply be repeated. Everything the flow would refuse is
    /// checked before the first upload, and step actions wait out the
    /// submission with [`SessionError::Busy`].
    pub async fn submit(&self, flow: FlowId) -> Result<(), SessionError> {
        let _submitting = self.claim(flow).await?;
        let (request, items, fields) = {
            let orch = self.orchestrator.lock().await;
            orch.check_submittable(flow)?;
            let instance = orch.flow(flow).ok_or(FlowError::UnknownFlow(flow))?;
            let attester = instance.as_attester().ok_or_else(|| {
                FlowError::KindMismatch(instance.request().clone(), KindFamily::System)
            })?;
            let mut fields = BTreeMap::new();
            if let Some(selected) = attester.selected_attester() {
                fields.insert("attester".to_string(), selected.to_string());
            }
            let names: Vec<&str> = attester.evidence().iter().map(|e| e.name.as_str()).collect();
            fields.insert("evidence".to_string(), names.join(","));
            fields.insert(
                "messages".to_string(),
                attester.transcript().len().to_string(),
            );
            (
                instance.request().clone(),
                attester.evidence().to_vec(),
                fields,
            )
        };

        let mut refs = Vec::with_capacity(items.len());
        for item in &items {
            let cached = self
                .sessions
                .lock()
                .await
                .get(&flow)
                .ok_or(SessionError::Closed(flow))?
                .uploaded
                .get(&item.id)
                .cloned();
            let reference = match cached {
                Some(reference) => reference,
                None => {
                    let storage = &self.collaborators.storage;
                    let reference =
                        with_retry(&self.retry, "upload", move || storage.upload(item)).await?;
                    self.sessions
                        .lock()
                        .await
                        .get_mut(&flow)
                        .ok_or(SessionError::Closed(flow))?
                        .uploaded
                        .insert(item.id.clone(), reference.clone());
                    reference
                }
            };
            refs.push(reference);
        }

        let source = &self.collaborators.source;
        let (request_ref, fields_ref) = (&request, &fields);
        with_retry(&self.retry, "submit_response", move || {
            source.submit_response(request_ref, fields_ref.clone())
        })
        .await?;

        self.orchestrator.lock().await.submit(flow, refs)?;
        Ok(())
    }

    // ── Resolution ─────────────────────────────────────────────────────

    /// Wait out the simulated latency, then ask the provider for the outcome.
    ///
    /// Closing the flow meanwhile cancels the wait and returns
    /// [`SessionError::Closed`]; an answer that arrives for a flow that is no
    /// longer open is dropped.
    pub async fn resolve(&self, flow: FlowId) -> Result<Resolution, SessionError> {
        let ticket = self.orchestrator.lock().await.begin_resolution(flow)?;
        let mut pending = PendingResolution::new(Arc::clone(&self.orchestrator), &ticket);
        let mut closed = self
            .sessions
            .lock()
            .await
            .get(&flow)
            .ok_or(SessionError::Closed(flow))?
            .close
            .subscribe();

        let latency = self.config.latency_for(ticket.request.family());
        let provider = &self.collaborators.provider;
        let ticket_ref = &ticket;
        let work = async move {
            tokio::time::sleep(latency).await;
            with_retry(&self.retry, "verify", move || {
                provider.verify(&ticket_ref.request, &ticket_ref.evidence)
            })
            .await
        };

        let answer = tokio::select! {
            _ = closed.recv() => {
                tracing::info!(%flow, "resolution cancelled");
                return Err(SessionError::Closed(flow));
            }
            answer = work => answer,
        };
        tracing::debug!(%flow, provider = provider.name(), ok = answer.is_ok(), "provider answered");

        let answer = answer.map_err(ResolveError::from);
        let mut orch = self.orchestrator.lock().await;
        pending.disarm();
        orch.complete_resolution(flow, answer)?
            .ok_or(SessionError::Closed(flow))
    }

    /// Leave an unavailable result so the flow can be resolved again.
    pub async fn retry(&self, flow: FlowId) -> Result<(), SessionError> {
        self.act(flow, |orch| orch.retry(flow)).await
    }

    // ── Per-flow exclusion ─────────────────────────────────────────────

    /// Take the flow's work lock for a submit or finish.
    async fn claim(&self, flow: FlowId) -> Result<OwnedMutexGuard<()>, SessionError> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(&flow).ok_or(FlowError::UnknownFlow(flow))?;
        Arc::clone(&session.work)
            .try_lock_owned()
            .map_err(|_| SessionError::Busy(flow))
    }

    /// Refuse step actions while a submit or finish is in flight.
    ///
    /// Callers hold the orchestrator lock, which keeps the lock order.
    async fn ensure_idle(&self, flow: FlowId) -> Result<(), SessionError> {
        let sessions = self.sessions.lock().await;
        match sessions.get(&flow) {
            Some(session) if session.work.try_lock().is_err() => Err(SessionError::Busy(flow)),
            _ => Ok(()),
        }
    }

    /// Run a step action against the orchestrator once the flow is idle.
    async fn act<T>(
        &self,
        flow: FlowId,
        op: impl FnOnce(&mut FlowOrchestrator) -> Result<T, FlowError>,
    ) -> Result<T, SessionError> {
        let mut orch = self.orchestrator.lock().await;
        self.ensure_idle(flow).await?;
        Ok(op(&mut orch)?)
    }
}

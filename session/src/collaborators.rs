//! Ports to the systems the desk talks to.
//!
//! All of them are async and fallible; [`CollaboratorError::is_transient`]
//! decides whether the desk's retry loop tries again.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use veriflow_flow::{OutcomeResolver, ResolveError};
use veriflow_types::{
    ChatMessage, EvidenceItem, EvidenceRef, Outcome, RequestDescriptor, RequestId, SubjectId,
};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl CollaboratorError {
    /// Whether trying the same call again might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<CollaboratorError> for ResolveError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::Unavailable(reason) => ResolveError::Unreachable(reason),
            CollaboratorError::Rejected(reason) => ResolveError::Rejected(reason),
            CollaboratorError::NotFound(what) => ResolveError::Other(format!("not found: {what}")),
        }
    }
}

/// Where a subject's requests come from and where their answers go.
#[async_trait]
pub trait RequestSource: Send + Sync {
    async fn list_requests(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<RequestDescriptor>, CollaboratorError>;

    /// Record what the subject entered for a request.
    async fn submit_response(
        &self,
        request: &RequestId,
        fields: BTreeMap<String, String>,
    ) -> Result<(), CollaboratorError>;

    /// Record the terminal outcome and the trust points it earned.
    async fn mark_outcome(
        &self,
        request: &RequestId,
        outcome: Outcome,
        trust_score_delta: u32,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn upload(&self, item: &EvidenceItem) -> Result<EvidenceRef, CollaboratorError>;
}

/// Chat between the subject and their attester.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send_message(
        &self,
        request: &RequestId,
        message: &ChatMessage,
    ) -> Result<(), CollaboratorError>;

    /// Messages arriving from the attester side for one request.
    async fn subscribe(
        &self,
        request: &RequestId,
    ) -> Result<mpsc::Receiver<ChatMessage>, CollaboratorError>;
}

/// The backend that actually decides a verification.
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    async fn verify(
        &self,
        request: &RequestDescriptor,
        evidence: &[EvidenceRef],
    ) -> Result<Outcome, CollaboratorError>;

    fn name(&self) -> &str;
}

/// Serves a synchronous [`OutcomeResolver`] as a provider, so the weighted
/// placeholder can stand in for a real backend.
pub struct ProviderResolver<R> {
    resolver: R,
}

impl<R: OutcomeResolver> ProviderResolver<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl<R: OutcomeResolver> VerificationProvider for ProviderResolver<R> {
    async fn verify(
        &self,
        request: &RequestDescriptor,
        evidence: &[EvidenceRef],
    ) -> Result<Outcome, CollaboratorError> {
        self.resolver
            .resolve(request, evidence)
            .map_err(|err| match err {
                ResolveError::Unreachable(reason) => CollaboratorError::Unavailable(reason),
                ResolveError::Rejected(reason) | ResolveError::Other(reason) => {
                    CollaboratorError::Rejected(reason)
                }
            })
    }

    fn name(&self) -> &str {
        self.resolver.name()
    }
}

/// Everything a desk needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn RequestSource>,
    pub storage: Arc<dyn EvidenceStore>,
    pub provider: Arc<dyn VerificationProvider>,
    /// Chat is optional; without it messages stay local to the flow.
    pub messaging: Option<Arc<dyn MessagingChannel>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriflow_flow::WeightedResolver;
    use veriflow_types::{FlowParams, RequestKind, Timestamp};

    struct Unreachable;

    impl OutcomeResolver for Unreachable {
        fn resolve(
            &self,
            _request: &RequestDescriptor,
            _evidence: &[EvidenceRef],
        ) -> Result<Outcome, ResolveError> {
            Err(ResolveError::Unreachable("offline".into()))
        }
        fn name(&self) -> &str {
            "unreachable"
        }
    }

    fn nin() -> RequestDescriptor {
        RequestDescriptor::system(
            "r1",
            RequestKind::NationalId,
            "NIN",
            "Gov",
            Timestamp::new(100),
            10,
        )
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(CollaboratorError::Unavailable("x".into()).is_transient());
        assert!(!CollaboratorError::Rejected("x".into()).is_transient());
        assert!(!CollaboratorError::NotFound("x".into()).is_transient());
    }

    #[test]
    fn collaborator_errors_map_to_resolve_errors() {
        assert_eq!(
            ResolveError::from(CollaboratorError::Unavailable("down".into())),
            ResolveError::Unreachable("down".into())
        );
        assert_eq!(
            ResolveError::from(CollaboratorError::Rejected("bad".into())),
            ResolveError::Rejected("bad".into())
        );
    }

    #[tokio::test]
    async fn provider_resolver_wraps_sync_resolvers() {
        let mut params = FlowParams::default();
        params.system_success_bps = FlowParams::FULL_BPS;
        let provider = ProviderResolver::new(WeightedResolver::new(params));
        assert_eq!(provider.verify(&nin(), &[]).await, Ok(Outcome::Success));
        assert_eq!(provider.name(), "weighted-placeholder");

        let offline = ProviderResolver::new(Unreachable);
        assert_eq!(
            offline.verify(&nin(), &[]).await,
            Err(CollaboratorError::Unavailable("offline".into()))
        );
    }
}

//! A live flow of either variant.

use crate::attester::AttesterFlow;
use crate::error::{FlowError, ResolveError};
use crate::outcomes::{FlowReport, Resolution};
use crate::step::Step;
use crate::system::SystemFlow;
use veriflow_types::{
    EvidenceRef, ExpiryPolicy, FlowId, KindFamily, Outcome, RequestDescriptor, RequestId,
    SubjectId, Timestamp,
};

#[derive(Clone, Debug)]
pub enum FlowInstance {
    System(SystemFlow),
    Attester(AttesterFlow),
}

impl FlowInstance {
    /// Open the variant matching the descriptor's kind family.
    pub fn open(
        id: FlowId,
        subject: SubjectId,
        descriptor: &RequestDescriptor,
        expiry_policy: ExpiryPolicy,
    ) -> Result<Self, FlowError> {
        descriptor.validate()?;
        Ok(match descriptor.family() {
            KindFamily::System => {
                Self::System(SystemFlow::new(id, subject, descriptor, expiry_policy)?)
            }
            KindFamily::Attester => {
                Self::Attester(AttesterFlow::new(id, subject, descriptor, expiry_policy)?)
            }
        })
    }

    pub fn id(&self) -> FlowId {
        match self {
            Self::System(f) => f.id(),
            Self::Attester(f) => f.id(),
        }
    }

    pub fn request(&self) -> &RequestId {
        match self {
            Self::System(f) => f.request(),
            Self::Attester(f) => f.request(),
        }
    }

    pub fn subject(&self) -> &SubjectId {
        match self {
            Self::System(f) => f.subject(),
            Self::Attester(f) => f.subject(),
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            Self::System(f) => f.step().name(),
            Self::Attester(f) => f.step().name(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Self::System(f) => f.step().is_terminal(),
            Self::Attester(f) => f.step().is_terminal(),
        }
    }

    pub fn can_advance(&self) -> bool {
        match self {
            Self::System(f) => f.can_advance(),
            Self::Attester(f) => f.can_advance(),
        }
    }

    pub fn is_resolving(&self) -> bool {
        match self {
            Self::System(f) => f.is_resolving(),
            Self::Attester(f) => f.is_resolving(),
        }
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            Self::System(f) => f.resolution(),
            Self::Attester(f) => f.resolution(),
        }
    }

    /// Evidence the resolver gets to see.
    pub fn resolver_evidence(&self) -> &[EvidenceRef] {
        match self {
            Self::System(_) => &[],
            Self::Attester(f) => f.submitted_evidence(),
        }
    }

    pub fn advance(
        &mut self,
        descriptor: &mut RequestDescriptor,
        now: Timestamp,
    ) -> Result<&'static str, FlowError> {
        Ok(match self {
            Self::System(f) => f.advance(descriptor, now)?.name(),
            Self::Attester(f) => f.advance(descriptor, now)?.name(),
        })
    }

    pub fn back(&mut self) -> Result<&'static str, FlowError> {
        Ok(match self {
            Self::System(f) => f.back()?.name(),
            Self::Attester(f) => f.back()?.name(),
        })
    }

    pub fn begin_resolution(&mut self) -> Result<(), FlowError> {
        match self {
            Self::System(f) => f.begin_resolution(),
            Self::Attester(f) => f.begin_resolution(),
        }
    }

    pub fn abort_resolution(&mut self) {
        match self {
            Self::System(f) => f.abort_resolution(),
            Self::Attester(f) => f.abort_resolution(),
        }
    }

    pub fn complete_resolution(
        &mut self,
        descriptor: &mut RequestDescriptor,
        answer: Result<Outcome, ResolveError>,
    ) -> Result<&Resolution, FlowError> {
        match self {
            Self::System(f) => f.complete_resolution(descriptor, answer),
            Self::Attester(f) => f.complete_resolution(descriptor, answer),
        }
    }

    pub fn retry(&mut self) -> Result<(), FlowError> {
        match self {
            Self::System(f) => f.retry(),
            Self::Attester(f) => f.retry(),
        }
    }

    pub fn report(&self, descriptor: &RequestDescriptor) -> Result<FlowReport, FlowError> {
        match self {
            Self::System(f) => f.report(descriptor),
            Self::Attester(f) => f.report(descriptor),
        }
    }

    pub fn as_system_mut(&mut self) -> Option<&mut SystemFlow> {
        match self {
            Self::System(f) => Some(f),
            Self::Attester(_) => None,
        }
    }

    pub fn as_attester(&self) -> Option<&AttesterFlow> {
        match self {
            Self::System(_) => None,
            Self::Attester(f) => Some(f),
        }
    }

    pub fn as_attester_mut(&mut self) -> Option<&mut AttesterFlow> {
        match self {
            Self::System(_) => None,
            Self::Attester(f) => Some(f),
        }
    }
}

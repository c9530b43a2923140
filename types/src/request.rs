//! The request descriptor: one verification request and its current status.

use crate::error::TypeError;
use crate::ids::RequestId;
use crate::kind::{KindFamily, RequestKind};
use crate::status::RequestStatus;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Display priority for attester-reviewed requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Fields that only attester-reviewed requests carry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttesterDetails {
    /// Documents the subject must upload, in display order. Never empty.
    pub required_documents: Vec<String>,
    pub priority: Priority,
}

/// One verification request as issued by a requesting party.
///
/// The descriptor is the source of truth for `status`; flows reference it by
/// id and write status changes back through [`RequestDescriptor::advance_status`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub id: RequestId,
    pub kind: RequestKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub requesting_party: String,
    pub expires_at: Timestamp,
    pub status: RequestStatus,
    /// Awarded only when the verification succeeds.
    pub trust_score_delta: u32,
    /// Advisory text, e.g. "2-3 business days".
    #[serde(default)]
    pub estimated_duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attester_details: Option<AttesterDetails>,
}

impl RequestDescriptor {
    /// A pending system-verified request.
    pub fn system(
        id: impl Into<RequestId>,
        kind: RequestKind,
        title: impl Into<String>,
        requesting_party: impl Into<String>,
        expires_at: Timestamp,
        trust_score_delta: u32,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: String::new(),
            requesting_party: requesting_party.into(),
            expires_at,
            status: RequestStatus::Pending,
            trust_score_delta,
            estimated_duration: String::new(),
            attester_details: None,
        }
    }

    /// A pending attester-verified request.
    pub fn attester(
        id: impl Into<RequestId>,
        kind: RequestKind,
        title: impl Into<String>,
        requesting_party: impl Into<String>,
        expires_at: Timestamp,
        trust_score_delta: u32,
        details: AttesterDetails,
    ) -> Self {
        Self {
            attester_details: Some(details),
            ..Self::system(id, kind, title, requesting_party, expires_at, trust_score_delta)
        }
    }

    pub fn family(&self) -> KindFamily {
        self.kind.family()
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.has_passed(now)
    }

    pub fn priority(&self) -> Option<Priority> {
        self.attester_details.as_ref().map(|d| d.priority)
    }

    /// Check the structural invariants a well-formed descriptor must hold.
    pub fn validate(&self) -> Result<(), TypeError> {
        let family = self.family();
        if !self.status.allowed_for(family) {
            return Err(TypeError::StatusNotAllowed {
                status: self.status,
                family,
            });
        }
        match (family, &self.attester_details) {
            (KindFamily::System, None) => Ok(()),
            (KindFamily::System, Some(_)) => Err(TypeError::KindDetailsMismatch(self.id.clone())),
            (KindFamily::Attester, None) => Err(TypeError::KindDetailsMismatch(self.id.clone())),
            (KindFamily::Attester, Some(details)) if details.required_documents.is_empty() => {
                Err(TypeError::NoRequiredDocuments(self.id.clone()))
            }
            (KindFamily::Attester, Some(_)) => Ok(()),
        }
    }

    /// Move the status forward along the kind's transition graph.
    pub fn advance_status(&mut self, next: RequestStatus) -> Result<(), TypeError> {
        self.status.check_transition(next, self.family())?;
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employment() -> RequestDescriptor {
        RequestDescriptor::attester(
            "req-1",
            RequestKind::Employment,
            "Employment history",
            "Acme Ltd",
            Timestamp::new(1_000),
            20,
            AttesterDetails {
                required_documents: vec!["Offer letter".into()],
                priority: Priority::High,
            },
        )
    }

    #[test]
    fn attester_request_without_documents_is_invalid() {
        let mut req = employment();
        req.attester_details = Some(AttesterDetails {
            required_documents: vec![],
            priority: Priority::Low,
        });
        assert!(matches!(req.validate(), Err(TypeError::NoRequiredDocuments(_))));
    }

    #[test]
    fn system_request_with_attester_details_is_invalid() {
        let mut req = RequestDescriptor::system(
            "req-2",
            RequestKind::BankNumber,
            "BVN",
            "Bank",
            Timestamp::new(10),
            15,
        );
        assert!(req.validate().is_ok());
        req.attester_details = employment().attester_details;
        assert!(matches!(req.validate(), Err(TypeError::KindDetailsMismatch(_))));
    }

    #[test]
    fn status_advances_and_never_regresses() {
        let mut req = employment();
        req.advance_status(RequestStatus::Assigned).unwrap();
        req.advance_status(RequestStatus::InReview).unwrap();
        assert!(req.advance_status(RequestStatus::Assigned).is_err());
        assert_eq!(req.status, RequestStatus::InReview);
    }

    #[test]
    fn serializes_status_in_kebab_case() {
        let mut req = employment();
        req.status = RequestStatus::RequiresInfo;
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"requires-info\""));
        let back: RequestDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}

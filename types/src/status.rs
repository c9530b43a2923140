//! Request status and its forward-only transition graph.
//!
//! System kinds:   `Pending -> InProgress -> {Completed, Failed}`
//! Attester kinds: `Pending -> Assigned -> InReview -> {RequiresInfo, Completed, Failed}`

use crate::error::TypeError;
use crate::kind::KindFamily;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The recorded status of a verification request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    /// Created, nobody has started it yet.
    Pending,
    /// A system check is running.
    InProgress,
    /// An attester has been bound to the request.
    Assigned,
    /// Evidence submitted; the attester is reviewing.
    InReview,
    /// The attester asked for more information.
    RequiresInfo,
    Completed,
    Failed,
}

impl RequestStatus {
    /// Whether this status exists for the given family.
    pub fn allowed_for(&self, family: KindFamily) -> bool {
        match family {
            KindFamily::System => matches!(
                self,
                Self::Pending | Self::InProgress | Self::Completed | Self::Failed
            ),
            KindFamily::Attester => !matches!(self, Self::InProgress),
        }
    }

    /// Whether `next` is a legal forward step from this status.
    pub fn can_advance_to(&self, next: RequestStatus, family: KindFamily) -> bool {
        use RequestStatus::*;
        match family {
            KindFamily::System => matches!(
                (self, next),
                (Pending, InProgress) | (InProgress, Completed) | (InProgress, Failed)
            ),
            KindFamily::Attester => matches!(
                (self, next),
                (Pending, Assigned)
                    | (Assigned, InReview)
                    | (InReview, RequiresInfo)
                    | (InReview, Completed)
                    | (InReview, Failed)
            ),
        }
    }

    /// Check a transition, returning the error a caller should surface.
    pub fn check_transition(
        &self,
        next: RequestStatus,
        family: KindFamily,
    ) -> Result<(), TypeError> {
        if self.can_advance_to(next, family) {
            Ok(())
        } else {
            Err(TypeError::InvalidStatusTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// No further transitions leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::RequiresInfo)
    }

    /// Someone has started working on the request but it is not finished.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::InProgress | Self::Assigned | Self::InReview | Self::RequiresInfo
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Assigned => "assigned",
            Self::InReview => "in-review",
            Self::RequiresInfo => "requires-info",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestStatus::*;

    #[test]
    fn system_graph_rejects_attester_states() {
        assert!(Pending.can_advance_to(InProgress, KindFamily::System));
        assert!(!Pending.can_advance_to(Assigned, KindFamily::System));
        assert!(!InProgress.allowed_for(KindFamily::Attester));
        assert!(!RequiresInfo.allowed_for(KindFamily::System));
    }

    #[test]
    fn attester_graph_walks_forward_only() {
        let family = KindFamily::Attester;
        assert!(Pending.can_advance_to(Assigned, family));
        assert!(Assigned.can_advance_to(InReview, family));
        assert!(InReview.can_advance_to(RequiresInfo, family));
        assert!(!InReview.can_advance_to(Assigned, family));
        assert!(!Completed.can_advance_to(Pending, family));
    }

    #[test]
    fn no_status_skips_a_step() {
        assert!(!Pending.can_advance_to(Completed, KindFamily::System));
        assert!(!Pending.can_advance_to(InReview, KindFamily::Attester));
    }

    #[test]
    fn rejected_transition_names_both_ends() {
        let err = Completed
            .check_transition(Pending, KindFamily::System)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid status transition: completed -> pending"
        );
    }
}

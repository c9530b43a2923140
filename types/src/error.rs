//! Errors raised by the shared value types.

use crate::ids::RequestId;
use crate::kind::KindFamily;
use crate::status::RequestStatus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TypeError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("status {status} does not exist for {family:?} requests")]
    StatusNotAllowed {
        status: RequestStatus,
        family: KindFamily,
    },

    #[error("request {0} has attester details that do not match its kind")]
    KindDetailsMismatch(RequestId),

    #[error("request {0} does not name any required documents")]
    NoRequiredDocuments(RequestId),

    #[error("attester rating {0} is outside 0.0..=5.0")]
    InvalidRating(f32),
}

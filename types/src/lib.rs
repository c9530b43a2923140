//! Fundamental types for verification workflows.
//!
//! This crate defines the value types shared across every other crate in the
//! workspace: identifiers, timestamps, request kinds and statuses, request
//! descriptors, attesters, evidence, chat messages, outcomes and parameters.

pub mod attester;
pub mod error;
pub mod evidence;
pub mod ids;
pub mod kind;
pub mod message;
pub mod outcome;
pub mod params;
pub mod request;
pub mod status;
pub mod time;

pub use attester::Attester;
pub use error::TypeError;
pub use evidence::{EvidenceItem, EvidenceRef};
pub use ids::{AttesterId, EvidenceId, FlowId, MessageId, RequestId, SubjectId};
pub use kind::{KindFamily, RequestKind};
pub use message::{ChatMessage, Sender};
pub use outcome::{Outcome, OutcomeSet};
pub use params::{ExpiryPolicy, FlowParams};
pub use request::{AttesterDetails, Priority, RequestDescriptor};
pub use status::RequestStatus;
pub use time::{Clock, SystemClock, Timestamp};

//! Async shell around the flow orchestrator.
//!
//! The [`VerificationDesk`] serves one subject: it fetches their requests,
//! opens flows, ticks each flow's deadline once a second, talks to the
//! verification backend with bounded retries, and reports outcomes back to
//! the request source when a flow finishes.
//!
//! Every external system sits behind a trait in [`collaborators`] so tests
//! can run the whole desk against deterministic stand-ins.

pub mod close;
pub mod collaborators;
pub mod config;
pub mod desk;
pub mod error;
pub mod retry;
pub mod ticker;

pub use close::CloseSignal;
pub use collaborators::{
    CollaboratorError, Collaborators, EvidenceStore, MessagingChannel, RequestSource,
    ProviderResolver, VerificationProvider,
};
pub use config::{DeskConfig, RetryConfig};
pub use desk::VerificationDesk;
pub use error::SessionError;
pub use retry::{with_retry, RetryPolicy};
pub use ticker::DeadlineTicker;

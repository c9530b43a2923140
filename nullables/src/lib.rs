//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of a flow (clock, randomness, the request
//! source, evidence storage, chat, the verification backend) sits behind a
//! trait. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected failures
//! - Record every call for assertions
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod messaging;
pub mod random;
pub mod resolver;
pub mod source;
pub mod storage;
pub mod verifier;

pub use clock::NullClock;
pub use messaging::NullMessaging;
pub use random::{ScriptedRandom, SeededRandom};
pub use resolver::FixedResolver;
pub use source::{MarkedOutcome, NullRequestSource};
pub use storage::NullEvidenceStore;
pub use verifier::ScriptedProvider;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use veriflow_session::CollaboratorError;

/// A panicking test must not cascade into every later lock.
pub(crate) fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Errors queued to be returned by the next calls, one per call.
#[derive(Default)]
pub(crate) struct FailureQueue(Mutex<VecDeque<CollaboratorError>>);

impl FailureQueue {
    pub(crate) fn push(&self, error: CollaboratorError) {
        locked(&self.0).push_back(error);
    }

    pub(crate) fn next(&self) -> Result<(), CollaboratorError> {
        match locked(&self.0).pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

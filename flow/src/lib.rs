//! Verification flow state machines.
//!
//! A flow walks one subject through one verification request:
//! 1. **System checks** (`details -> consent -> processing -> result`): resolved
//!    automatically by an external provider.
//! 2. **Attester reviews** (`details -> attester-selection -> document-upload ->
//!    communication -> review -> result`): resolved by a human attester.
//!
//! Steps only move forward or back one at a time, validation failures leave
//! the flow where it was, and every status change is written back to the
//! request descriptor the flow references.
//!
//! The terminal outcome comes from a pluggable [`OutcomeResolver`]. The
//! [`WeightedResolver`] shipped here is a stand-in that draws outcomes at
//! random; production wiring replaces it with a real provider.

pub mod attester;
pub mod deadline;
pub mod error;
pub mod instance;
pub mod orchestrator;
pub mod outcomes;
pub mod resolver;
pub mod selection;
pub mod step;
pub mod system;

pub use attester::AttesterFlow;
pub use deadline::Countdown;
pub use error::{FlowError, ResolveError};
pub use instance::FlowInstance;
pub use orchestrator::{FlowEvent, FlowOrchestrator, ResolutionTicket};
pub use outcomes::{terminal_status, trust_delta_for, FlowReport, Resolution};
pub use resolver::{OutcomeResolver, RandomSource, ThreadRandom, WeightedResolver};
pub use selection::AttesterRoster;
pub use step::{AttesterStep, Step, SystemStep};
pub use system::SystemFlow;

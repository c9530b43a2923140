use crate::collaborators::CollaboratorError;
use thiserror::Error;
use veriflow_flow::FlowError;
use veriflow_types::FlowId;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The flow was closed while the operation was waiting.
    #[error("{0} was closed")]
    Closed(FlowId),

    /// A submit or finish is already running for the flow.
    #[error("{0} has an operation in flight")]
    Busy(FlowId),
}

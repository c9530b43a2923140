//! Uploaded evidence.

use crate::ids::EvidenceId;
use serde::{Deserialize, Serialize};

/// A file the subject attached during document upload.
///
/// The flow owns the bytes until the evidence is submitted; afterwards only
/// the storage reference is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvidenceItem {
    pub id: EvidenceId,
    pub name: String,
    pub size: u64,
    pub content: Vec<u8>,
}

impl EvidenceItem {
    pub fn new(id: impl Into<EvidenceId>, name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: content.len() as u64,
            content,
        }
    }

    /// A reference to this item without its bytes.
    pub fn reference(&self) -> EvidenceRef {
        EvidenceRef {
            id: self.id.clone(),
            name: self.name.clone(),
            size: self.size,
            location: None,
        }
    }
}

/// What a resolver or the storage collaborator sees of an evidence item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub id: EvidenceId,
    pub name: String,
    pub size: u64,
    /// Storage location once uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

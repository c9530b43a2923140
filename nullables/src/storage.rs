//! Nullable evidence store — keeps uploads in memory.

use crate::{locked, FailureQueue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use veriflow_session::{CollaboratorError, EvidenceStore};
use veriflow_types::{EvidenceId, EvidenceItem, EvidenceRef};

#[derive(Default)]
pub struct NullEvidenceStore {
    uploads: Mutex<Vec<EvidenceId>>,
    failures: FailureQueue,
    item_failures: Mutex<HashMap<EvidenceId, CollaboratorError>>,
}

impl NullEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next upload fail with `error`. Queued errors are used in order.
    pub fn fail_next(&self, error: CollaboratorError) {
        self.failures.push(error);
    }

    /// Make the next upload of one particular item fail with `error`.
    pub fn fail_item(&self, id: impl Into<EvidenceId>, error: CollaboratorError) {
        locked(&self.item_failures).insert(id.into(), error);
    }

    /// Ids of every successful upload, in order.
    pub fn uploads(&self) -> Vec<EvidenceId> {
        locked(&self.uploads).clone()
    }

    pub fn upload_count(&self, id: &EvidenceId) -> usize {
        locked(&self.uploads).iter().filter(|u| *u == id).count()
    }
}

#[async_trait]
impl EvidenceStore for NullEvidenceStore {
    async fn upload(&self, item: &EvidenceItem) -> Result<EvidenceRef, CollaboratorError> {
        self.failures.next()?;
        if let Some(error) = locked(&self.item_failures).remove(&item.id) {
            return Err(error);
        }
        locked(&self.uploads).push(item.id.clone());
        let mut reference = item.reference();
        reference.location = Some(format!("null://{}", item.id));
        Ok(reference)
    }
}

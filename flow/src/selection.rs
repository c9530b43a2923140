//! Attester roster and candidate ordering.

use veriflow_types::{Attester, AttesterId, RequestKind};

/// The attesters a subject may choose from.
#[derive(Clone, Debug, Default)]
pub struct AttesterRoster {
    attesters: Vec<Attester>,
}

impl AttesterRoster {
    pub fn new(attesters: Vec<Attester>) -> Self {
        Self { attesters }
    }

    pub fn get(&self, id: &AttesterId) -> Option<&Attester> {
        self.attesters.iter().find(|a| &a.id == id)
    }

    pub fn len(&self) -> usize {
        self.attesters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attesters.is_empty()
    }

    /// Candidates for a request kind, best rated first.
    ///
    /// Attesters whose specialization matches the kind label (case-insensitive)
    /// are offered; if none match, the whole roster is. Ties keep roster order,
    /// so the listing is stable for the same input.
    pub fn candidates_for(&self, kind: &RequestKind) -> Vec<&Attester> {
        let label = kind.label();
        let mut matching: Vec<&Attester> = self
            .attesters
            .iter()
            .filter(|a| a.specialization.eq_ignore_ascii_case(label))
            .collect();
        if matching.is_empty() {
            matching = self.attesters.iter().collect();
        }
        matching.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        matching
    }
}

//! Terminal verification outcomes.

use crate::kind::KindFamily;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The terminal result of one verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    /// Attester asked for more information. Never produced for system kinds.
    RequiresInfo,
    Failed,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::RequiresInfo => "requires-info",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The outcomes a resolver may produce for one kind family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutcomeSet(&'static [Outcome]);

impl OutcomeSet {
    pub const SYSTEM: Self = Self(&[Outcome::Success, Outcome::Failed]);
    pub const ATTESTER: Self = Self(&[Outcome::Success, Outcome::RequiresInfo, Outcome::Failed]);

    pub fn for_family(family: KindFamily) -> Self {
        match family {
            KindFamily::System => Self::SYSTEM,
            KindFamily::Attester => Self::ATTESTER,
        }
    }

    pub fn contains(&self, outcome: Outcome) -> bool {
        self.0.contains(&outcome)
    }

    pub fn outcomes(&self) -> &'static [Outcome] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_kinds_are_two_valued() {
        let set = OutcomeSet::for_family(KindFamily::System);
        assert_eq!(set.outcomes().len(), 2);
        assert!(!set.contains(Outcome::RequiresInfo));
    }

    #[test]
    fn attester_kinds_are_three_valued() {
        let set = OutcomeSet::for_family(KindFamily::Attester);
        assert!(set.contains(Outcome::RequiresInfo));
        assert_eq!(set.outcomes().len(), 3);
    }
}

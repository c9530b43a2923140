//! Flow steps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A strictly ordered sequence of named steps.
pub trait Step: Copy + Eq + fmt::Debug + 'static {
    /// Every step in order; the last one is terminal.
    const SEQUENCE: &'static [Self];

    fn name(self) -> &'static str;

    fn position(self) -> usize {
        Self::SEQUENCE
            .iter()
            .position(|s| *s == self)
            .unwrap_or(0)
    }

    fn next(self) -> Option<Self> {
        Self::SEQUENCE.get(self.position() + 1).copied()
    }

    fn prev(self) -> Option<Self> {
        self.position()
            .checked_sub(1)
            .and_then(|i| Self::SEQUENCE.get(i).copied())
    }

    fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

/// Steps of an automatically resolved check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemStep {
    Details,
    Consent,
    Processing,
    Result,
}

impl Step for SystemStep {
    const SEQUENCE: &'static [Self] = &[
        Self::Details,
        Self::Consent,
        Self::Processing,
        Self::Result,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Details => "details",
            Self::Consent => "consent",
            Self::Processing => "processing",
            Self::Result => "result",
        }
    }
}

/// Steps of an attester review.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttesterStep {
    Details,
    AttesterSelection,
    DocumentUpload,
    Communication,
    Review,
    Result,
}

impl Step for AttesterStep {
    const SEQUENCE: &'static [Self] = &[
        Self::Details,
        Self::AttesterSelection,
        Self::DocumentUpload,
        Self::Communication,
        Self::Review,
        Self::Result,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Details => "details",
            Self::AttesterSelection => "attester-selection",
            Self::DocumentUpload => "document-upload",
            Self::Communication => "communication",
            Self::Review => "review",
            Self::Result => "result",
        }
    }
}

impl fmt::Display for SystemStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for AttesterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_sequence_walks_in_order() {
        assert_eq!(SystemStep::Details.next(), Some(SystemStep::Consent));
        assert_eq!(SystemStep::Consent.prev(), Some(SystemStep::Details));
        assert_eq!(SystemStep::Details.prev(), None);
        assert!(SystemStep::Result.is_terminal());
        assert!(!SystemStep::Processing.is_terminal());
    }

    #[test]
    fn attester_sequence_has_six_steps() {
        assert_eq!(AttesterStep::SEQUENCE.len(), 6);
        assert_eq!(AttesterStep::Communication.next(), Some(AttesterStep::Review));
        assert_eq!(AttesterStep::Review.position(), 4);
        assert_eq!(AttesterStep::AttesterSelection.to_string(), "attester-selection");
    }
}

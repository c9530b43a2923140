//! Verification request kinds.
//!
//! The kind decides who resolves a request: system kinds are checked
//! automatically against an external provider, attester kinds are reviewed by
//! a human bound to the request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which resolution family a request kind belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KindFamily {
    /// Resolved automatically, no human in the loop.
    System,
    /// Resolved by a selected attester.
    Attester,
}

/// What a verification request checks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    /// Bank verification number lookup.
    BankNumber,
    /// National identity number lookup.
    NationalId,
    /// Credit bureau check.
    CreditCheck,
    /// Phone number ownership check.
    PhoneNumber,
    /// Employment history confirmed by an employer contact.
    Employment,
    /// Education records confirmed by an institution.
    Education,
    /// Character or professional reference.
    Reference,
    /// Business registration and ownership.
    Business,
    /// Anything else a requesting party defines; always human-reviewed.
    Custom(String),
}

impl RequestKind {
    pub fn family(&self) -> KindFamily {
        match self {
            Self::BankNumber | Self::NationalId | Self::CreditCheck | Self::PhoneNumber => {
                KindFamily::System
            }
            Self::Employment
            | Self::Education
            | Self::Reference
            | Self::Business
            | Self::Custom(_) => KindFamily::Attester,
        }
    }

    /// Short display label.
    pub fn label(&self) -> &str {
        match self {
            Self::BankNumber => "BVN",
            Self::NationalId => "NIN",
            Self::CreditCheck => "Credit check",
            Self::PhoneNumber => "Phone number",
            Self::Employment => "Employment",
            Self::Education => "Education",
            Self::Reference => "Reference",
            Self::Business => "Business",
            Self::Custom(label) => label,
        }
    }

    pub fn is_system(&self) -> bool {
        self.family() == KindFamily::System
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//! Flow parameters: resolver weighting and expiry handling.
//!
//! Weights are basis points (10_000 = 100%).

use serde::{Deserialize, Serialize};

/// How a passed deadline affects an open flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryPolicy {
    /// The countdown shows `EXPIRED` but every step stays usable.
    #[default]
    Advisory,
    /// Consent and evidence submission are refused once expired.
    Enforce,
}

/// Tunables shared by every flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    // ── Placeholder resolver weighting ───────────────────────────────────
    /// Chance a system check succeeds. Everything else fails.
    pub system_success_bps: u32,

    /// Chance an attester review succeeds.
    pub attester_success_bps: u32,

    /// Chance an attester asks for more information. The remainder after
    /// success and requires-info is failure.
    pub attester_requires_info_bps: u32,

    // ── Deadlines ────────────────────────────────────────────────────────
    pub expiry_policy: ExpiryPolicy,
}

impl FlowParams {
    pub const FULL_BPS: u32 = 10_000;

    /// Attester failure weight (whatever success and requires-info leave).
    pub fn attester_failed_bps(&self) -> u32 {
        Self::FULL_BPS
            .saturating_sub(self.attester_success_bps)
            .saturating_sub(self.attester_requires_info_bps)
    }

    /// Whether the weights describe valid probability distributions.
    pub fn weights_are_valid(&self) -> bool {
        self.system_success_bps <= Self::FULL_BPS
            && self
                .attester_success_bps
                .saturating_add(self.attester_requires_info_bps)
                <= Self::FULL_BPS
    }
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            system_success_bps: 9_000,
            attester_success_bps: 8_500,
            attester_requires_info_bps: 750,
            expiry_policy: ExpiryPolicy::Advisory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_attester_weights_split_the_remainder_evenly() {
        let params = FlowParams::default();
        assert!(params.weights_are_valid());
        assert_eq!(params.attester_failed_bps(), 750);
    }

    #[test]
    fn overfull_weights_are_invalid() {
        let params = FlowParams {
            attester_success_bps: 9_500,
            attester_requires_info_bps: 1_000,
            ..FlowParams::default()
        };
        assert!(!params.weights_are_valid());
        assert_eq!(params.attester_failed_bps(), 0);
    }
}

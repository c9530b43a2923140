//! Outcome resolution.
//!
//! A resolver decides how a verification ends. The resolver is injected into
//! flows; nothing in the state machines draws outcomes itself.

use crate::error::ResolveError;
use rand::Rng;
use veriflow_types::{EvidenceRef, FlowParams, KindFamily, Outcome, RequestDescriptor};

/// Decides the terminal outcome of a verification.
///
/// Implementations must only return outcomes from
/// [`veriflow_types::OutcomeSet::for_family`] of the request's kind; flows
/// treat anything else as a failed resolution.
pub trait OutcomeResolver: Send + Sync {
    fn resolve(
        &self,
        request: &RequestDescriptor,
        evidence: &[EvidenceRef],
    ) -> Result<Outcome, ResolveError>;

    /// Human-readable name of this resolver.
    fn name(&self) -> &str;
}

/// Uniform draws in basis points, `0..10_000`.
pub trait RandomSource: Send + Sync {
    fn next_bps(&self) -> u32;
}

/// Draws from the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_bps(&self) -> u32 {
        rand::thread_rng().gen_range(0..FlowParams::FULL_BPS)
    }
}

/// Placeholder resolver drawing outcomes at the configured weights.
///
/// Stands in for a real verification provider; the weights have no meaning
/// beyond reproducing the observed distribution.
pub struct WeightedResolver<R = ThreadRandom> {
    params: FlowParams,
    random: R,
}

impl WeightedResolver<ThreadRandom> {
    pub fn new(params: FlowParams) -> Self {
        Self::with_random(params, ThreadRandom)
    }
}

impl<R: RandomSource> WeightedResolver<R> {
    pub fn with_random(params: FlowParams, random: R) -> Self {
        Self { params, random }
    }

    /// Map one draw to an outcome for the given family.
    pub fn outcome_for(&self, family: KindFamily, draw: u32) -> Outcome {
        match family {
            KindFamily::System => {
                if draw < self.params.system_success_bps {
                    Outcome::Success
                } else {
                    Outcome::Failed
                }
            }
            KindFamily::Attester => {
                let success = self.params.attester_success_bps;
                let requires_info = success.saturating_add(self.params.attester_requires_info_bps);
                if draw < success {
                    Outcome::Success
                } else if draw < requires_info {
                    Outcome::RequiresInfo
                } else {
                    Outcome::Failed
                }
            }
        }
    }
}

impl<R: RandomSource> OutcomeResolver for WeightedResolver<R> {
    fn resolve(
        &self,
        request: &RequestDescriptor,
        _evidence: &[EvidenceRef],
    ) -> Result<Outcome, ResolveError> {
        let draw = self.random.next_bps();
        Ok(self.outcome_for(request.family(), draw))
    }

    fn name(&self) -> &str {
        "weighted-placeholder"
    }
}

//! Attester reference data.

use crate::error::TypeError;
use crate::ids::AttesterId;
use serde::{Deserialize, Serialize};

/// A human reviewer available for attester-verified requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attester {
    pub id: AttesterId,
    pub name: String,
    /// 0.0 to 5.0.
    pub rating: f32,
    pub specialization: String,
    /// Advisory, e.g. "within 24 hours".
    pub average_response_time: String,
}

impl Attester {
    pub const MAX_RATING: f32 = 5.0;

    pub fn new(
        id: impl Into<AttesterId>,
        name: impl Into<String>,
        rating: f32,
        specialization: impl Into<String>,
        average_response_time: impl Into<String>,
    ) -> Result<Self, TypeError> {
        if !(0.0..=Self::MAX_RATING).contains(&rating) {
            return Err(TypeError::InvalidRating(rating));
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            rating,
            specialization: specialization.into(),
            average_response_time: average_response_time.into(),
        })
    }
}

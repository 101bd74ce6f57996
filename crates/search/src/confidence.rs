use crate::error::{Result, SearchError};
use mark_protocol::ConfidenceTier;
use serde::{Deserialize, Serialize};

/// Distance thresholds that map the best candidate distance to a [`ConfidenceTier`].
///
/// Thresholds are exclusive upper bounds and must be strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    high_below: f32,
    moderate_below: f32,
    low_below: f32,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            high_below: 0.9,
            moderate_below: 1.2,
            low_below: 1.5,
        }
    }
}

impl ConfidencePolicy {
    pub fn new(high_below: f32, moderate_below: f32, low_below: f32) -> Result<Self> {
        let policy = Self {
            high_below,
            moderate_below,
            low_below,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        let values = [self.high_below, self.moderate_below, self.low_below];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SearchError::InvalidConfig(
                "confidence thresholds must be finite".to_string(),
            ));
        }
        if !(self.high_below < self.moderate_below && self.moderate_below < self.low_below) {
            return Err(SearchError::InvalidConfig(format!(
                "confidence thresholds must be strictly increasing (got {}, {}, {})",
                self.high_below, self.moderate_below, self.low_below
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn high_below(&self) -> f32 {
        self.high_below
    }

    #[must_use]
    pub const fn moderate_below(&self) -> f32 {
        self.moderate_below
    }

    #[must_use]
    pub const fn low_below(&self) -> f32 {
        self.low_below
    }

    /// NaN maps to [`ConfidenceTier::Insufficient`].
    #[must_use]
    pub fn tier_for(&self, distance: f32) -> ConfidenceTier {
        if distance.is_nan() {
            ConfidenceTier::Insufficient
        } else if distance < self.high_below {
            ConfidenceTier::High
        } else if distance < self.moderate_below {
            ConfidenceTier::Moderate
        } else if distance < self.low_below {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::Insufficient
        }
    }

    /// Tier of the closest distance; no distances means Insufficient.
    #[must_use]
    pub fn tier_for_best(&self, distances: impl IntoIterator<Item = f32>) -> ConfidenceTier {
        distances
            .into_iter()
            .filter(|d| !d.is_nan())
            .min_by(f32::total_cmp)
            .map_or(ConfidenceTier::Insufficient, |best| self.tier_for(best))
    }
}

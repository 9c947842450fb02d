//! Proportional falloff curves

use serde::{Deserialize, Serialize};

/// Shape of the influence decay around the scaled control points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FalloffCurve {
    /// Influence drops linearly to zero at the radius
    Linear,
    /// Hermite easing, flat at both ends
    #[default]
    Smooth,
}

impl FalloffCurve {
    /// Influence weight in `[0, 1]` at `distance` from the source
    ///
    /// Returns exactly 1 at distance zero and exactly 0 at or beyond `radius`.
    pub fn weight(self, distance: f32, radius: f32) -> f32 {
        if radius <= 0.0 || distance >= radius {
            return 0.0;
        }
        let t = 1.0 - (distance / radius).max(0.0);
        match self {
            FalloffCurve::Linear => t,
            FalloffCurve::Smooth => t * t * (3.0 - 2.0 * t),
        }
    }
}

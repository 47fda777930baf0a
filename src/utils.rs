//! Shared angle math helpers.
//!
//! Headings follow the odometer convention used throughout the crate:
//! radians measured from the +y axis, increasing toward +x, kept in [0, 2π).

use std::f32::consts::{PI, TAU};

/// Normalize a heading to [0, 2π).
#[inline]
pub fn normalize_heading(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a < 0.0 {
        a += TAU;
    }
    a
}

/// Minimal signed turn from `current` to `target`, normalized to (−π, π].
///
/// An exact half-turn maps to +π, so the rotation direction for a 180°
/// request is deterministic (always the positive direction).
#[inline]
pub fn min_turn_angle(target: f32, current: f32) -> f32 {
    let mut delta = (target - current) % TAU;
    if delta > PI {
        delta -= TAU;
    }
    if delta <= -PI {
        delta += TAU;
    }
    delta
}

/// Signed heading change from `prev` to `now`, assuming less than a half
/// turn happened between the two samples. Used to accumulate total rotation
/// across wraparounds.
#[inline]
pub fn heading_delta(prev: f32, now: f32) -> f32 {
    min_turn_angle(now, prev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_wraps_into_range() {
        assert_relative_eq!(normalize_heading(TAU + 0.5), 0.5, epsilon = 1e-6);
        assert_relative_eq!(normalize_heading(-0.5), TAU - 0.5, epsilon = 1e-6);
        assert_relative_eq!(normalize_heading(3.0 * TAU), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn min_turn_picks_short_way() {
        // Heading 350°, target 10°: expect +20°, not −340°.
        let current = 350.0_f32.to_radians();
        let target = 10.0_f32.to_radians();
        assert_relative_eq!(
            min_turn_angle(target, current),
            20.0_f32.to_radians(),
            epsilon = 1e-5
        );
    }

    #[test]
    fn min_turn_half_turn_is_positive() {
        // Exactly ±π must resolve to +π so the turn direction is stable.
        assert_relative_eq!(min_turn_angle(PI, 0.0), PI, epsilon = 1e-6);
        assert_relative_eq!(min_turn_angle(0.0, PI), PI, epsilon = 1e-6);
    }

    #[test]
    fn heading_delta_crosses_wraparound() {
        let prev = 0.1_f32;
        let now = TAU - 0.1;
        assert_relative_eq!(heading_delta(prev, now), -0.2, epsilon = 1e-5);
    }
}

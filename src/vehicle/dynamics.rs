use crate::math::{heading_of, lerp_angle, Vector2d};
use cgmath::InnerSpace;

/// Fraction of the remaining turn applied each step.
const HEADING_BLEND: f64 = 0.15;

/// Turns `heading` part of the way toward the direction `dir`.
/// A zero `dir` leaves the heading unchanged.
pub fn steer(heading: f64, dir: Vector2d) -> f64 {
    if dir.magnitude2() == 0.0 {
        return heading;
    }
    lerp_angle(heading, heading_of(dir), HEADING_BLEND)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn converges_without_snapping() {
        let dir = Vector2d::new(0.0, 1.0);
        let mut heading = 0.0;
        heading = steer(heading, dir);
        assert_approx_eq!(heading, 0.15 * FRAC_PI_2);
        for _ in 0..100 {
            heading = steer(heading, dir);
        }
        assert_approx_eq!(heading, FRAC_PI_2, 1e-6);
    }

    #[test]
    fn zero_direction_is_ignored() {
        assert_approx_eq!(steer(1.0, Vector2d::new(0.0, 0.0)), 1.0);
    }
}

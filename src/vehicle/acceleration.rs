use crate::Parameters;

/// Distance kept in hand when braking for an intersection, in units.
const BRAKING_MARGIN: f64 = 6.0;

/// Decelerations are floored at this value to keep braking distances finite.
const MIN_DECEL: f64 = 0.01;

/// The longitudinal model of a vehicle: when it brakes and how fast it speeds up.
#[derive(Clone, Debug)]
pub struct AccelerationModel {
    reaction_time: f64,
    max_acc: f64,
    max_dec: f64,
    target_speed: f64,
    /// How long a stop condition has held, in s.
    reaction_timer: f64,
}

impl AccelerationModel {
    /// Creates a new acceleration model.
    pub fn new(params: &Parameters) -> Self {
        let mut model = AccelerationModel {
            reaction_time: 0.0,
            max_acc: 0.0,
            max_dec: 0.0,
            target_speed: 0.0,
            reaction_timer: 0.0,
        };
        model.set_params(params);
        model
    }

    /// Replaces the driver parameters. Takes effect on the next update.
    pub fn set_params(&mut self, params: &Parameters) {
        self.reaction_time = f64::max(params.reaction_time, 0.0);
        self.max_acc = f64::max(params.acceleration, 0.0);
        self.max_dec = f64::max(params.deceleration, MIN_DECEL);
        self.target_speed = f64::max(params.target_speed, 0.0);
    }

    /// The desired cruising speed.
    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    /// The reaction time in s.
    pub fn reaction_time(&self) -> f64 {
        self.reaction_time
    }

    /// How long the current stop condition has held, in s.
    #[cfg(test)]
    pub fn reaction_timer(&self) -> f64 {
        self.reaction_timer
    }

    /// The distance needed to stop from `vel`, plus a safety margin.
    pub fn braking_distance(&self, vel: f64) -> f64 {
        vel.powi(2) / (2.0 * self.max_dec) + BRAKING_MARGIN
    }

    /// Computes the vehicle's speed after `dt` seconds.
    ///
    /// While `stop` holds the vehicle keeps its speed until the reaction time
    /// has elapsed, then decelerates. Otherwise it accelerates toward the target speed.
    /// The result is always within `[0, target_speed]`.
    ///
    /// # Parameters
    /// * `vel` - The current speed
    /// * `stop` - Whether any stop condition holds
    /// * `dt` - The time step in seconds
    pub fn next_speed(&mut self, vel: f64, stop: bool, dt: f64) -> f64 {
        let vel = if stop {
            self.reaction_timer += dt;
            if self.reaction_timer >= self.reaction_time {
                vel - self.max_dec * dt
            } else {
                vel
            }
        } else {
            self.reaction_timer = 0.0;
            vel + self.max_acc * dt
        };
        vel.clamp(0.0, self.target_speed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn model() -> AccelerationModel {
        AccelerationModel::new(&Parameters {
            reaction_time: 0.6,
            acceleration: 2.5,
            deceleration: 4.0,
            target_speed: 18.0,
        })
    }

    #[test]
    fn braking_distance() {
        let acc = model();
        assert_approx_eq!(acc.braking_distance(0.0), 6.0);
        assert_approx_eq!(acc.braking_distance(8.0), 14.0);
        assert_approx_eq!(acc.braking_distance(18.0), 46.5);
    }

    #[test]
    fn accelerates_up_to_target() {
        let mut acc = model();
        assert_approx_eq!(acc.next_speed(0.0, false, 0.1), 0.25);
        assert_approx_eq!(acc.next_speed(17.9, false, 0.1), 18.0);
        assert_approx_eq!(acc.next_speed(18.0, false, 0.1), 18.0);
    }

    #[test]
    fn brakes_after_reaction_time() {
        let mut acc = model();
        let mut vel = 10.0;
        // 0.5 s of reaction: no change in speed
        for _ in 0..5 {
            vel = acc.next_speed(vel, true, 0.1);
            assert_approx_eq!(vel, 10.0);
        }
        // Then the brakes engage
        vel = acc.next_speed(vel, true, 0.1);
        vel = acc.next_speed(vel, true, 0.1);
        assert!(vel < 10.0);
        assert!(acc.reaction_timer() >= acc.reaction_time());

        // Clearing the stop condition resets the timer
        vel = acc.next_speed(vel, false, 0.1);
        assert_approx_eq!(acc.reaction_timer(), 0.0);
        assert!(vel > 9.0);
    }

    #[test]
    fn never_reverses() {
        let mut acc = AccelerationModel::new(&Parameters {
            reaction_time: 0.0,
            ..Parameters::default()
        });
        assert_approx_eq!(acc.next_speed(0.1, true, 0.05), 0.0);
        assert_approx_eq!(acc.next_speed(0.0, true, 0.05), 0.0);
    }

    #[test]
    fn lowered_target_caps_speed() {
        let mut acc = model();
        acc.set_params(&Parameters {
            target_speed: 5.0,
            ..Parameters::default()
        });
        assert_approx_eq!(acc.next_speed(18.0, false, 0.05), 5.0);
        assert_approx_eq!(acc.next_speed(18.0, true, 0.05), 5.0);
    }
}

//! Tunable simulation parameters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Driver parameters shared by every vehicle in the simulation.
///
/// Changing them through [Simulation::set_parameters](crate::Simulation::set_parameters)
/// applies to existing vehicles on the very next step.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Parameters {
    /// Delay between a stop condition arising and the vehicle braking, in s.
    pub reaction_time: f64,
    /// Acceleration magnitude in units/s<sup>2</sup>.
    pub acceleration: f64,
    /// Deceleration magnitude in units/s<sup>2</sup>.
    pub deceleration: f64,
    /// Desired cruising speed in units/s.
    pub target_speed: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            reaction_time: 0.6,
            acceleration: 2.5,
            deceleration: 4.0,
            target_speed: 18.0,
        }
    }
}

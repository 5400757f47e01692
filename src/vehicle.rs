use self::acceleration::AccelerationModel;
use self::dynamics::steer;
use crate::arbitration::{Approach, ApproachIndex, Arbiter, OccupancyTable};
use crate::debug::debug_line;
use crate::math::{direction, heading_of, project_local, rot90, Point2d};
use crate::{Error, IntersectionId, Parameters, Path, RoadNetwork, VehicleId, YieldPolicy};
use cgmath::prelude::*;

mod acceleration;
mod dynamics;

/// A vehicle is considered to have reached an intersection within this distance, in units.
const ARRIVAL_THRESHOLD: f64 = 4.0;

/// Vehicles slowing for an intersection do not brake below this speed, in units/s.
const CRAWL_SPEED: f64 = 3.0;

/// The smallest gap kept to the vehicle ahead, in units.
const MIN_GAP: f64 = 6.0;

/// Added to the reaction distance when following another vehicle, in units.
const FOLLOW_BUFFER: f64 = 4.0;

/// Vehicles further than this from the centre line are not followed, in units.
const LANE_HALF_WIDTH: f64 = 4.0;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID.
    id: VehicleId,
    /// The intersections the vehicle will visit.
    path: Path,
    /// The index of the path segment the vehicle is on.
    segment: usize,
    /// The position in world space.
    pos: Point2d,
    /// The direction the vehicle is facing, in radians.
    heading: f64,
    /// The speed in units/s.
    vel: f64,
    /// The acceleration model.
    acc: AccelerationModel,
    /// The junction this vehicle currently occupies.
    occupying: Option<IntersectionId>,
    /// Whether the vehicle decided to yield on its latest update.
    yielding: bool,
}

/// What a vehicle perceives at the start of its update.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Observation {
    /// The vehicle's approach to the end of its current segment.
    approach: Approach,
    /// Whether the intersection ahead is a junction which needs arbitration.
    is_junction: bool,
    /// Whether the vehicle must give way at the junction.
    must_yield: bool,
    /// Whether the vehicle ahead is too close.
    too_close: bool,
    /// Whether another vehicle is ahead on the same road.
    has_leader: bool,
    /// The position of the intersection after the one ahead, if there is one.
    next_pos: Option<Point2d>,
}

impl Vehicle {
    /// Creates a new vehicle.
    pub(crate) fn new(
        id: VehicleId,
        path: Path,
        pos: Point2d,
        heading: f64,
        params: &Parameters,
    ) -> Self {
        Self {
            id,
            path,
            segment: 0,
            pos,
            heading,
            vel: 0.0,
            acc: AccelerationModel::new(params),
            occupying: None,
            yielding: false,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The path the vehicle is following.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The index of the path segment the vehicle is on.
    pub fn segment_index(&self) -> usize {
        self.segment
    }

    /// The start and end intersections of the segment the vehicle is on,
    /// or `None` once it has arrived.
    pub fn current_segment(&self) -> Option<(IntersectionId, IntersectionId)> {
        self.path.segment(self.segment)
    }

    /// The coordinates of the vehicle in world space.
    pub fn position(&self) -> Point2d {
        self.pos
    }

    /// The direction the vehicle is facing, in radians.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// The vehicle's speed in units/s.
    pub fn speed(&self) -> f64 {
        self.vel
    }

    /// The vehicle's desired cruising speed in units/s.
    pub fn target_speed(&self) -> f64 {
        self.acc.target_speed()
    }

    /// The junction the vehicle currently occupies.
    pub fn occupying(&self) -> Option<IntersectionId> {
        self.occupying
    }

    /// Whether the vehicle decided to give way on its latest update.
    pub fn is_yielding(&self) -> bool {
        self.yielding
    }

    /// Whether the vehicle has reached the end of its path.
    pub fn has_arrived(&self) -> bool {
        self.segment >= self.path.num_segments()
    }

    /// Replaces the driver parameters.
    pub(crate) fn set_params(&mut self, params: &Parameters) {
        self.acc.set_params(params);
    }

    /// Takes the junction the vehicle occupies, if any, so it can be released.
    pub(crate) fn take_occupied(&mut self) -> Option<IntersectionId> {
        self.occupying.take()
    }

    /// Gathers what the vehicle needs to know to move this step.
    ///
    /// Returns `Ok(None)` if the vehicle has already arrived, or an error
    /// if its remaining path refers to an intersection which no longer exists.
    pub(crate) fn observe(&self, arbiter: &Arbiter) -> Result<Option<Observation>, Error> {
        let Some((from, to)) = self.current_segment() else {
            return Ok(None);
        };
        let network = arbiter.network;
        if let Some(id) = self.path[self.segment..]
            .iter()
            .find(|id| !network.contains(**id))
        {
            return Err(Error::MissingGraphNode(*id));
        }
        let pos_of = |id: IntersectionId| {
            network
                .intersection(id)
                .map(|n| n.position())
                .ok_or(Error::MissingGraphNode(id))
        };

        let junction_pos = pos_of(to)?;
        let approach = Approach {
            from,
            junction: to,
            junction_pos,
            dir: direction(pos_of(from)?, junction_pos),
            distance: self.pos.distance(junction_pos),
        };
        let is_junction = network.intersection(to).map_or(false, |n| n.is_junction());
        let must_yield = is_junction && arbiter.must_yield(self, &approach);
        let next_pos = match self.path.get(self.segment + 2) {
            Some(id) => Some(pos_of(*id)?),
            None => None,
        };

        let leader = self.leader(arbiter, &approach);

        Ok(Some(Observation {
            approach,
            is_junction,
            must_yield,
            too_close: leader.map_or(false, |(gap, vel)| self.too_close(gap, vel)),
            has_leader: leader.is_some(),
            next_pos,
        }))
    }

    /// Finds the nearest vehicle ahead on the same road, returning the gap to it and its speed.
    fn leader(&self, arbiter: &Arbiter, approach: &Approach) -> Option<(f64, f64)> {
        arbiter
            .approaches
            .vehicles(approach.junction)
            .iter()
            .filter(|id| **id != self.id)
            .filter_map(|id| arbiter.vehicles.get(*id))
            .filter(|other| other.current_segment() == Some((approach.from, approach.junction)))
            .map(|other| {
                let local = project_local(other.pos, self.pos, rot90(approach.dir), approach.dir);
                (local, other.vel)
            })
            .filter(|(local, _)| local.y > 0.0 && local.x.abs() < LANE_HALF_WIDTH)
            .min_by(|a, b| a.0.y.total_cmp(&b.0.y))
            .map(|(local, vel)| (local.y, vel))
    }

    /// Whether the vehicle needs to brake for a leader `gap` units ahead travelling at `vel`.
    fn too_close(&self, gap: f64, vel: f64) -> bool {
        let follow_gap = f64::max(MIN_GAP, self.vel * self.acc.reaction_time() + FOLLOW_BUFFER);
        gap < MIN_GAP || (gap < follow_gap && vel <= self.vel)
    }

    /// Moves the vehicle along its path, claiming and releasing junctions on the way.
    ///
    /// A vehicle only moves past the stop line of a junction it holds. It holds at
    /// most one junction, so claiming the next one releases the previous one even if
    /// the vehicle is still within its clearance distance. On roads shorter than the
    /// claim and clearance distances combined, the earlier junction is therefore
    /// freed before the vehicle has fully left it.
    ///
    /// # Parameters
    /// * `obs` - The result of [Self::observe] for this step
    /// * `dt` - The time step in seconds
    pub(crate) fn advance(
        &mut self,
        obs: &Observation,
        dt: f64,
        policy: &YieldPolicy,
        network: &RoadNetwork,
        occupancy: &mut OccupancyTable,
        approaches: &mut ApproachIndex,
    ) {
        let approach = &obs.approach;

        self.heading = steer(self.heading, approach.dir);

        // Only the front vehicle on a road may claim the junction
        if obs.is_junction
            && !obs.must_yield
            && !obs.has_leader
            && approach.distance < policy.claim_distance
            && occupancy.holder(approach.junction).is_none()
        {
            if let Some(prev) = self.occupying.take() {
                occupancy.release(prev, self.id);
            }
            if occupancy.try_claim(approach.junction, self.id) {
                self.occupying = Some(approach.junction);
                debug_line("claim", self.pos, approach.junction_pos);
            }
        }

        // Without the claim, the vehicle must come to rest at the stop line
        let gated = obs.is_junction && self.occupying != Some(approach.junction);
        let stop_dist = if gated {
            approach.distance - policy.stop_line_distance
        } else {
            approach.distance
        };

        // Slow down for the intersection, but roll through it rather than stall short of it
        let braking =
            stop_dist < self.acc.braking_distance(self.vel) && self.vel > CRAWL_SPEED;
        let stop = braking || obs.must_yield || obs.too_close;

        self.vel = self.acc.next_speed(self.vel, stop, dt);
        let mut travel = self.vel * dt;
        if gated && travel > f64::max(stop_dist, 0.0) {
            travel = f64::max(stop_dist, 0.0);
            self.vel = 0.0;
        }
        self.pos += approach.dir * travel;

        if let Some(junction) = self.occupying {
            let cleared = network
                .intersection(junction)
                .map_or(true, |n| n.position().distance(self.pos) > policy.clearance_distance);
            if cleared {
                occupancy.release(junction, self.id);
                self.occupying = None;
            }
        }

        if approach.distance < ARRIVAL_THRESHOLD && !gated {
            approaches.remove(approach.junction, self.id);
            self.segment += 1;
            if let Some((_, next)) = self.current_segment() {
                approaches.insert(next, self.id);
            }
            if let Some(next_pos) = obs.next_pos {
                self.heading = heading_of(next_pos - self.pos);
            }
        }

        self.yielding = obs.must_yield;
    }
}

//! Right of way and mutual exclusion at junctions.

use crate::debug::debug_line;
use crate::math::{direction, rot90, Point2d, Vector2d};
use crate::{IntersectionId, RoadNetwork, Vehicle, VehicleId, VehicleSet};
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use smallvec::SmallVec;
use std::f64::consts::FRAC_PI_4;

/// Speeds below this are rounded up when estimating arrival times, in units/s.
const MIN_ESTIMATE_SPEED: f64 = 1.0;

/// The tunable parts of junction arbitration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct YieldPolicy {
    /// Half-angle of the cone, centred on "arriving from my right",
    /// within which another vehicle's approach counts as being on the right. In radians.
    pub yield_cone: f64,
    /// A vehicle on the right is yielded to unless this vehicle would arrive
    /// at least this many seconds before it.
    pub time_gap_tolerance: f64,
    /// Vehicles claim a junction once they are this close to its centre.
    pub claim_distance: f64,
    /// Vehicles that do not hold a junction stop this far from its centre.
    /// Must be less than `claim_distance`, or a stopped vehicle can never claim.
    pub stop_line_distance: f64,
    /// Vehicles release a junction once they are this far past its centre.
    pub clearance_distance: f64,
}

impl Default for YieldPolicy {
    fn default() -> Self {
        Self {
            yield_cone: FRAC_PI_4,
            time_gap_tolerance: 1.2,
            claim_distance: 12.0,
            stop_line_distance: 8.0,
            clearance_distance: 14.0,
        }
    }
}

/// Records which vehicle, if any, currently occupies each junction.
///
/// Each junction maps to at most one vehicle; a junction moves from free to held
/// by [try_claim](Self::try_claim) and back to free by [release](Self::release).
#[derive(Clone, Debug, Default)]
pub struct OccupancyTable {
    holders: SecondaryMap<IntersectionId, VehicleId>,
}

impl OccupancyTable {
    /// The vehicle currently occupying the junction.
    pub fn holder(&self, junction: IntersectionId) -> Option<VehicleId> {
        self.holders.get(junction).copied()
    }

    /// Claims the junction for the vehicle if it is free.
    /// Returns `true` if the vehicle now holds the junction.
    pub fn try_claim(&mut self, junction: IntersectionId, vehicle: VehicleId) -> bool {
        match self.holder(junction) {
            Some(holder) => holder == vehicle,
            None => {
                log::trace!("{:?} claimed {:?}", vehicle, junction);
                self.holders.insert(junction, vehicle);
                self.holders.contains_key(junction)
            }
        }
    }

    /// Frees the junction if it is held by the vehicle.
    /// Returns `true` if the junction was released.
    pub fn release(&mut self, junction: IntersectionId, vehicle: VehicleId) -> bool {
        if self.holder(junction) == Some(vehicle) {
            log::trace!("{:?} released {:?}", vehicle, junction);
            self.holders.remove(junction);
            true
        } else {
            false
        }
    }

    /// Returns an iterator over the held junctions and their holders.
    pub fn iter(&self) -> impl Iterator<Item = (IntersectionId, VehicleId)> + '_ {
        self.holders.iter().map(|(j, v)| (j, *v))
    }

    /// Forgets a junction that has been removed from the network.
    pub(crate) fn remove_junction(&mut self, junction: IntersectionId) {
        self.holders.remove(junction);
    }

    /// Frees every junction.
    pub(crate) fn clear(&mut self) {
        self.holders.clear();
    }
}

/// Indexes vehicles by the intersection at the end of their current segment.
#[derive(Clone, Debug, Default)]
pub(crate) struct ApproachIndex {
    approaching: SecondaryMap<IntersectionId, SmallVec<[VehicleId; 8]>>,
}

impl ApproachIndex {
    /// Records that the vehicle is heading to the intersection.
    pub fn insert(&mut self, junction: IntersectionId, vehicle: VehicleId) {
        if let Some(entry) = self.approaching.entry(junction) {
            entry.or_default().push(vehicle);
        }
    }

    /// Records that the vehicle is no longer heading to the intersection.
    pub fn remove(&mut self, junction: IntersectionId, vehicle: VehicleId) {
        if let Some(vehicles) = self.approaching.get_mut(junction) {
            if let Some(idx) = vehicles.iter().position(|v| *v == vehicle) {
                vehicles.remove(idx);
            }
        }
    }

    /// The vehicles heading to the intersection.
    pub fn vehicles(&self, junction: IntersectionId) -> &[VehicleId] {
        self.approaching
            .get(junction)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    pub fn remove_junction(&mut self, junction: IntersectionId) {
        self.approaching.remove(junction);
    }

    pub fn clear(&mut self) {
        self.approaching.clear();
    }
}

/// A vehicle's approach towards the end of its current segment.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Approach {
    /// The intersection at the start of the segment.
    pub from: IntersectionId,
    /// The intersection being approached.
    pub junction: IntersectionId,
    /// The position of the intersection being approached.
    pub junction_pos: Point2d,
    /// Unit vector along the segment.
    pub dir: Vector2d,
    /// Distance from the vehicle to the centre of the intersection.
    pub distance: f64,
}

/// Read-only view of the shared state consulted while deciding how a vehicle moves.
pub(crate) struct Arbiter<'a> {
    pub policy: &'a YieldPolicy,
    pub network: &'a RoadNetwork,
    pub vehicles: &'a VehicleSet,
    pub occupancy: &'a OccupancyTable,
    pub approaches: &'a ApproachIndex,
}

impl Arbiter<'_> {
    /// Determines whether the vehicle must yield before entering the junction.
    ///
    /// An occupant never yields at its own junction. Everyone else yields to an
    /// occupant unconditionally, and to a vehicle on their right when the
    /// junction is free and the two would arrive at comparable times.
    pub fn must_yield(&self, vehicle: &Vehicle, approach: &Approach) -> bool {
        let must_yield = match self.occupancy.holder(approach.junction) {
            Some(holder) => holder != vehicle.id(),
            None => self.yields_to_right(vehicle, approach),
        };
        if must_yield {
            debug_line("yield", vehicle.position(), approach.junction_pos);
        }
        must_yield
    }

    /// Looks for a proceeding vehicle on the right which would reach the
    /// junction at around the same time.
    fn yields_to_right(&self, vehicle: &Vehicle, approach: &Approach) -> bool {
        let from_right = -rot90(approach.dir);
        let min_dot = self.policy.yield_cone.cos();
        let my_time = approach.distance / f64::max(vehicle.speed(), MIN_ESTIMATE_SPEED);

        self.conflicting(vehicle, approach.junction).any(|other| {
            let Some((from, _)) = other.current_segment() else {
                return false;
            };
            let Some(from_pos) = self.network.intersection(from).map(|n| n.position()) else {
                return false;
            };
            let other_dir = direction(from_pos, approach.junction_pos);
            if from_right.dot(other_dir) <= min_dot {
                return false;
            }
            let their_dist = other.position().distance(approach.junction_pos);
            let their_time = their_dist / f64::max(other.speed(), MIN_ESTIMATE_SPEED);
            my_time - their_time > -self.policy.time_gap_tolerance
        })
    }

    /// The other vehicles heading into the junction that have not themselves
    /// decided to yield.
    fn conflicting<'s>(
        &'s self,
        vehicle: &'s Vehicle,
        junction: IntersectionId,
    ) -> impl Iterator<Item = &'s Vehicle> + 's {
        self.approaches
            .vehicles(junction)
            .iter()
            .filter(move |id| **id != vehicle.id())
            .filter_map(move |id| self.vehicles.get(*id))
            .filter(move |other| {
                !other.has_arrived()
                    && !other.is_yielding()
                    && other.current_segment().map(|(_, to)| to) == Some(junction)
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Parameters, Path};
    use slotmap::SlotMap;

    #[test]
    fn single_holder_per_junction() {
        let mut junctions = SlotMap::<IntersectionId, ()>::with_key();
        let mut vehicles = SlotMap::<VehicleId, ()>::with_key();
        let j = junctions.insert(());
        let a = vehicles.insert(());
        let b = vehicles.insert(());

        let mut table = OccupancyTable::default();
        assert_eq!(table.holder(j), None);
        assert!(table.try_claim(j, a));
        assert!(!table.try_claim(j, b));
        assert!(table.try_claim(j, a));
        assert_eq!(table.holder(j), Some(a));

        assert!(!table.release(j, b));
        assert_eq!(table.holder(j), Some(a));
        assert!(table.release(j, a));
        assert_eq!(table.holder(j), None);
        assert!(table.try_claim(j, b));
        assert_eq!(table.iter().collect::<Vec<_>>(), vec![(j, b)]);
    }

    #[test]
    fn approach_index_tracks_vehicles() {
        let mut junctions = SlotMap::<IntersectionId, ()>::with_key();
        let mut vehicles = SlotMap::<VehicleId, ()>::with_key();
        let j = junctions.insert(());
        let k = junctions.insert(());
        let a = vehicles.insert(());
        let b = vehicles.insert(());

        let mut index = ApproachIndex::default();
        index.insert(j, a);
        index.insert(j, b);
        assert_eq!(index.vehicles(j), &[a, b]);
        assert!(index.vehicles(k).is_empty());

        index.remove(j, a);
        index.insert(k, a);
        assert_eq!(index.vehicles(j), &[b]);
        assert_eq!(index.vehicles(k), &[a]);

        index.remove_junction(j);
        assert!(index.vehicles(j).is_empty());
    }

    /// Two vehicles approach the centre of a cross, one from the west and
    /// one from the south, both 100 units away.
    fn crossing() -> (RoadNetwork, VehicleSet, ApproachIndex, [Approach; 2]) {
        let mut network = RoadNetwork::new();
        let centre = network.add_intersection(Point2d::new(100.0, 100.0));
        let west = network.add_intersection(Point2d::new(0.0, 100.0));
        let south = network.add_intersection(Point2d::new(100.0, 200.0));
        network.connect(west, centre);
        network.connect(south, centre);

        let params = Parameters::default();
        let mut vehicles = VehicleSet::default();
        let mut approaches = ApproachIndex::default();
        let mut result = vec![];
        for from in [west, south] {
            let pos = network.intersection(from).unwrap().position();
            let path = Path::new(vec![from, centre]);
            let id = vehicles.insert_with_key(|id| Vehicle::new(id, path, pos, 0.0, &params));
            approaches.insert(centre, id);
            result.push(Approach {
                from,
                junction: centre,
                junction_pos: Point2d::new(100.0, 100.0),
                dir: direction(pos, Point2d::new(100.0, 100.0)),
                distance: 100.0,
            });
        }
        (network, vehicles, approaches, [result[0], result[1]])
    }

    #[test]
    fn vehicle_on_the_right_has_priority() {
        let (network, vehicles, approaches, [west, south]) = crossing();
        let occupancy = OccupancyTable::default();
        let arbiter = Arbiter {
            policy: &YieldPolicy::default(),
            network: &network,
            vehicles: &vehicles,
            occupancy: &occupancy,
            approaches: &approaches,
        };
        let ids = vehicles.keys().collect::<Vec<_>>();

        // Heading east, the vehicle coming up from the south is on the right
        assert!(arbiter.must_yield(&vehicles[ids[0]], &west));
        assert!(!arbiter.must_yield(&vehicles[ids[1]], &south));
    }

    #[test]
    fn occupant_overrides_right_of_way() {
        let (network, vehicles, approaches, [west, south]) = crossing();
        let ids = vehicles.keys().collect::<Vec<_>>();
        let mut occupancy = OccupancyTable::default();
        assert!(occupancy.try_claim(west.junction, ids[0]));

        let arbiter = Arbiter {
            policy: &YieldPolicy::default(),
            network: &network,
            vehicles: &vehicles,
            occupancy: &occupancy,
            approaches: &approaches,
        };
        assert!(!arbiter.must_yield(&vehicles[ids[0]], &west));
        assert!(arbiter.must_yield(&vehicles[ids[1]], &south));
    }

    #[test]
    fn far_vehicle_on_the_right_is_ignored() {
        let (network, vehicles, approaches, [west, _]) = crossing();
        let occupancy = OccupancyTable::default();
        let arbiter = Arbiter {
            policy: &YieldPolicy::default(),
            network: &network,
            vehicles: &vehicles,
            occupancy: &occupancy,
            approaches: &approaches,
        };
        let ids = vehicles.keys().collect::<Vec<_>>();

        // Arriving well ahead of the vehicle on the right
        let close = Approach {
            distance: 10.0,
            ..west
        };
        assert!(!arbiter.must_yield(&vehicles[ids[0]], &close));
    }
}

use crate::math::Point2d;
use crate::{IntersectionId, IntersectionSet, RoadId, RoadSet};
use cgmath::MetricSpace;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Intersections within this distance of a point are considered "at" that point.
const PICK_RADIUS: f64 = 12.0;

/// The cosmetic width of a road.
const ROAD_WIDTH: f64 = 10.0;

/// A node in the road network.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Intersection {
    /// The intersection's ID.
    id: IntersectionId,
    /// The position of the intersection's centre.
    pos: Point2d,
    /// The directly connected intersections.
    connected: SmallVec<[IntersectionId; 4]>,
    /// The roads leaving this intersection.
    roads_out: SmallVec<[RoadId; 4]>,
    /// How traffic entering the intersection is controlled.
    control: TrafficControl,
}

/// How traffic entering an intersection is controlled.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrafficControl {
    /// Vehicles arbitrate amongst themselves.
    #[default]
    Uncontrolled,
    /// The intersection follows a signal plan.
    Signalised(SignalPlan),
}

/// A traffic signal plan. Signals are not modelled yet, so no plan can be constructed.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SignalPlan {}

/// A single-lane directed road between two intersections.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Road {
    /// The road's ID.
    id: RoadId,
    /// The intersection the road starts at.
    src: IntersectionId,
    /// The intersection the road ends at.
    dst: IntersectionId,
    /// The length of the road when it was created.
    length: f64,
    /// The number of lanes.
    lanes: u8,
    /// The width of the road, used only for drawing.
    width: f64,
}

/// The graph of intersections and roads.
#[derive(Clone, Default)]
pub struct RoadNetwork {
    intersections: IntersectionSet,
    roads: RoadSet,
}

impl Intersection {
    /// Gets the intersection's ID.
    pub fn id(&self) -> IntersectionId {
        self.id
    }

    /// The position of the intersection's centre.
    pub fn position(&self) -> Point2d {
        self.pos
    }

    /// The IDs of the directly connected intersections.
    pub fn connected(&self) -> &[IntersectionId] {
        &self.connected
    }

    /// The IDs of the roads leaving this intersection.
    pub fn roads_out(&self) -> &[RoadId] {
        &self.roads_out
    }

    /// How traffic entering the intersection is controlled.
    pub fn control(&self) -> &TrafficControl {
        &self.control
    }

    /// Whether vehicles passing through need to arbitrate for right of way.
    /// Dead ends have a single connection and never conflict.
    pub fn is_junction(&self) -> bool {
        self.connected.len() > 1
    }
}

impl Road {
    /// Gets the road's ID.
    pub fn id(&self) -> RoadId {
        self.id
    }

    /// The intersection the road starts at.
    pub fn src(&self) -> IntersectionId {
        self.src
    }

    /// The intersection the road ends at.
    pub fn dst(&self) -> IntersectionId {
        self.dst
    }

    /// The length of the road, measured when the road was created.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The number of lanes, which is always 1.
    pub fn lanes(&self) -> u8 {
        self.lanes
    }

    /// The drawn width of the road.
    pub fn width(&self) -> f64 {
        self.width
    }
}

impl RoadNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an intersection at the given position.
    pub fn add_intersection(&mut self, pos: Point2d) -> IntersectionId {
        self.intersections.insert_with_key(|id| Intersection {
            id,
            pos,
            connected: SmallVec::new(),
            roads_out: SmallVec::new(),
            control: TrafficControl::Uncontrolled,
        })
    }

    /// Connects two intersections with a pair of roads, one in each direction.
    ///
    /// Does nothing if `a == b` or either intersection does not exist.
    /// Connecting the same pair twice creates duplicate roads.
    pub fn connect(&mut self, a: IntersectionId, b: IntersectionId) {
        if a == b || !self.intersections.contains_key(a) || !self.intersections.contains_key(b) {
            return;
        }
        let length = self.intersections[a]
            .pos
            .distance(self.intersections[b].pos);
        for (src, dst) in [(a, b), (b, a)] {
            let road = self.roads.insert_with_key(|id| Road {
                id,
                src,
                dst,
                length,
                lanes: 1,
                width: ROAD_WIDTH,
            });
            let node = &mut self.intersections[src];
            node.connected.push(dst);
            node.roads_out.push(road);
        }
    }

    /// Moves an intersection. The lengths of attached roads are not updated.
    pub fn move_intersection(&mut self, id: IntersectionId, pos: Point2d) {
        if let Some(node) = self.intersections.get_mut(id) {
            node.pos = pos;
        }
    }

    /// Removes an intersection along with every road that touches it.
    /// Returns `false` if the intersection did not exist.
    pub fn remove_intersection(&mut self, id: IntersectionId) -> bool {
        let Some(node) = self.intersections.remove(id) else {
            return false;
        };
        for other in node.connected {
            if let Some(other) = self.intersections.get_mut(other) {
                other.connected.retain(|n| *n != id);
                let roads = &self.roads;
                other.roads_out.retain(|r| roads[*r].dst != id);
            }
        }
        self.roads.retain(|_, road| road.src != id && road.dst != id);
        true
    }

    /// Finds an intersection within the pick radius of the given point.
    pub fn intersection_at(&self, point: Point2d) -> Option<IntersectionId> {
        self.intersections
            .values()
            .find(|node| node.pos.distance(point) < PICK_RADIUS)
            .map(|node| node.id)
    }

    /// Finds the road leading from `src` to `dst`, if there is one.
    pub fn road_between(&self, src: IntersectionId, dst: IntersectionId) -> Option<RoadId> {
        self.intersections
            .get(src)?
            .roads_out
            .iter()
            .copied()
            .find(|road| self.roads[*road].dst == dst)
    }

    /// Whether a road leads from `src` to `dst`.
    pub fn is_connected(&self, src: IntersectionId, dst: IntersectionId) -> bool {
        self.road_between(src, dst).is_some()
    }

    /// Gets the intersection with the given ID.
    pub fn intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.intersections.get(id)
    }

    /// Gets the road with the given ID.
    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(id)
    }

    /// Whether the intersection exists.
    pub fn contains(&self, id: IntersectionId) -> bool {
        self.intersections.contains_key(id)
    }

    /// Returns an iterator over all the intersections.
    pub fn iter_intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.values()
    }

    /// Returns an iterator over all the roads.
    pub fn iter_roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    /// The number of intersections.
    pub fn num_intersections(&self) -> usize {
        self.intersections.len()
    }

    /// Removes every intersection and road.
    pub fn clear(&mut self) {
        self.intersections.clear();
        self.roads.clear();
    }
}

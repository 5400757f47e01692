//! Shortest-path routing between intersections.

use crate::math::Point2d;
use crate::{Error, IntersectionId, RoadNetwork};
use cgmath::MetricSpace;
use itertools::Itertools;
use std::ops::Deref;
use std::rc::Rc;

/// Path costs are evaluated in these fractions of a unit, so they can be totally ordered.
const COST_SCALE: f64 = 1_000_000.0;

/// An immutable sequence of intersections for a vehicle to visit.
///
/// Clones share the same underlying sequence, so later edits to the network
/// never alter a path that has already been handed to a vehicle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path(Rc<[IntersectionId]>);

impl Path {
    /// Creates a path from a sequence of intersections.
    pub fn new(nodes: impl Into<Rc<[IntersectionId]>>) -> Self {
        Self(nodes.into())
    }

    /// The first intersection on the path.
    pub fn origin(&self) -> Option<IntersectionId> {
        self.0.first().copied()
    }

    /// The last intersection on the path.
    pub fn destination(&self) -> Option<IntersectionId> {
        self.0.last().copied()
    }

    /// The number of segments (roads) on the path.
    pub fn num_segments(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// The start and end intersections of a segment.
    pub fn segment(&self, idx: usize) -> Option<(IntersectionId, IntersectionId)> {
        Some((*self.0.get(idx)?, *self.0.get(idx + 1)?))
    }

    /// The total length of the path, measured between the current intersection positions.
    /// Returns `None` if the path refers to a missing intersection.
    pub fn length(&self, network: &RoadNetwork) -> Option<f64> {
        self.0
            .iter()
            .map(|id| network.intersection(*id).map(|n| n.position()))
            .collect::<Option<Vec<_>>>()
            .map(|points| points.iter().tuple_windows().map(|(a, b)| a.distance(*b)).sum())
    }

    /// Checks that the path has at least one segment and that every segment follows a road.
    pub(crate) fn validate(&self, network: &RoadNetwork) -> Result<(), Error> {
        if let Some(id) = self.0.iter().find(|id| !network.contains(**id)) {
            return Err(Error::MissingGraphNode(*id));
        }
        let connected = self
            .0
            .iter()
            .tuple_windows()
            .all(|(a, b)| network.is_connected(*a, *b));
        if self.0.len() < 2 || !connected {
            return Err(Error::InvalidPath);
        }
        Ok(())
    }
}

impl Deref for Path {
    type Target = [IntersectionId];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Finds the shortest path between two intersections using A*.
///
/// Edges cost the straight-line distance between their end points, which is also
/// the heuristic. Edge costs are rounded up and heuristic values rounded down when
/// converted to fixed point, so the heuristic never overestimates and the result
/// is optimal up to the rounding of each edge.
pub fn find_path(
    network: &RoadNetwork,
    start: IntersectionId,
    goal: IntersectionId,
) -> Result<Path, Error> {
    for id in [start, goal] {
        if !network.contains(id) {
            return Err(Error::MissingGraphNode(id));
        }
    }
    if start == goal {
        return Err(Error::DegenerateRequest(start));
    }

    let pos = |id: IntersectionId| -> Point2d {
        network
            .intersection(id)
            .map(|n| n.position())
            .unwrap_or_else(|| Point2d::new(0.0, 0.0))
    };
    let goal_pos = pos(goal);

    let result = pathfinding::directed::astar::astar(
        &start,
        |id| {
            let from = pos(*id);
            network
                .intersection(*id)
                .map(|n| n.connected())
                .unwrap_or_default()
                .iter()
                .map(move |next| (*next, (from.distance(pos(*next)) * COST_SCALE).ceil() as u64))
                .collect::<Vec<_>>()
        },
        |id| (pos(*id).distance(goal_pos) * COST_SCALE).floor() as u64,
        |id| *id == goal,
    );

    match result {
        Some((nodes, _)) => Ok(Path::new(nodes)),
        None => Err(Error::RouteNotFound {
            from: start,
            to: goal,
        }),
    }
}

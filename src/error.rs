use crate::IntersectionId;
use std::fmt;

/// Errors reported when routing or spawning vehicles.
///
/// None of these are fatal to a running simulation: spawning skips the
/// affected vehicle and the tick driver drops vehicles whose paths have gone stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// No sequence of connected intersections joins the two intersections.
    RouteNotFound {
        from: IntersectionId,
        to: IntersectionId,
    },
    /// The origin and destination are the same intersection.
    DegenerateRequest(IntersectionId),
    /// The intersection does not exist in the network.
    MissingGraphNode(IntersectionId),
    /// The path is too short or two consecutive nodes are not connected by a road.
    InvalidPath,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RouteNotFound { from, to } => {
                write!(f, "no route from {:?} to {:?}", from, to)
            }
            Error::DegenerateRequest(id) => {
                write!(f, "origin and destination are both {:?}", id)
            }
            Error::MissingGraphNode(id) => write!(f, "intersection {:?} does not exist", id),
            Error::InvalidPath => write!(f, "path does not follow connected roads"),
        }
    }
}

impl std::error::Error for Error {}

pub use arbitration::{OccupancyTable, YieldPolicy};
pub use cgmath;
pub use error::Error;
pub use network::{Intersection, Road, RoadNetwork, SignalPlan, TrafficControl};
pub use params::Parameters;
pub use router::{find_path, Path};
pub use simulation::Simulation;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use vehicle::Vehicle;

mod arbitration;
mod debug;
mod error;
pub mod math;
mod network;
mod params;
mod router;
mod simulation;
mod vehicle;

new_key_type! {
    /// Unique ID of an [Intersection].
    pub struct IntersectionId;
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type IntersectionSet = SlotMap<IntersectionId, Intersection>;
type RoadSet = SlotMap<RoadId, Road>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;

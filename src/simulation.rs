use crate::arbitration::{ApproachIndex, Arbiter, OccupancyTable, YieldPolicy};
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::math::{heading_of, Point2d};
use crate::router::{find_path, Path};
use crate::vehicle::Vehicle;
use crate::{
    Error, Intersection, IntersectionId, Parameters, Road, RoadId, RoadNetwork, VehicleId,
    VehicleSet,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// The largest time step simulated at once, in s.
const MAX_STEP: f64 = 0.05;

/// How many destinations to try before giving up on spawning a vehicle.
const MAX_SPAWN_ATTEMPTS: usize = 10;

/// A traffic simulation.
pub struct Simulation {
    /// The road network.
    network: RoadNetwork,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// Which vehicle occupies each junction.
    occupancy: OccupancyTable,
    /// The vehicles heading to each intersection.
    approaches: ApproachIndex,
    /// Driver parameters applied to every vehicle.
    params: Parameters,
    /// How vehicles arbitrate at junctions.
    policy: YieldPolicy,
    /// Intersections that randomly spawned vehicles start from.
    spawn_origins: Vec<IntersectionId>,
    /// Random number generator used for spawning.
    rng: StdRng,
    /// The current frame of simulation.
    frame: usize,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::with_rng(Parameters::default(), YieldPolicy::default(), StdRng::from_entropy())
    }
}

impl Simulation {
    /// Creates a new simulation.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a new simulation whose random spawning is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_config(Parameters::default(), YieldPolicy::default(), seed)
    }

    /// Creates a new simulation with the given parameters and random seed.
    pub fn with_config(params: Parameters, policy: YieldPolicy, seed: u64) -> Self {
        Self::with_rng(params, policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: Parameters, policy: YieldPolicy, rng: StdRng) -> Self {
        Self {
            network: RoadNetwork::new(),
            vehicles: VehicleSet::default(),
            occupancy: OccupancyTable::default(),
            approaches: ApproachIndex::default(),
            params,
            policy,
            spawn_origins: vec![],
            rng,
            frame: 0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// Adds an intersection to the network.
    pub fn add_intersection(&mut self, pos: Point2d) -> IntersectionId {
        self.network.add_intersection(pos)
    }

    /// Connects two intersections with a pair of roads. Does nothing if `a == b`.
    pub fn connect(&mut self, a: IntersectionId, b: IntersectionId) {
        self.network.connect(a, b);
    }

    /// Moves an intersection, e.g. while it is being dragged in an editor.
    pub fn move_intersection(&mut self, id: IntersectionId, pos: Point2d) {
        self.network.move_intersection(id, pos);
    }

    /// Removes an intersection and its roads.
    /// Vehicles whose paths pass through it are dropped on the next step.
    pub fn remove_intersection(&mut self, id: IntersectionId) {
        if self.network.remove_intersection(id) {
            self.occupancy.remove_junction(id);
            self.approaches.remove_junction(id);
            self.spawn_origins.retain(|origin| *origin != id);
        }
    }

    /// Finds an intersection near the given point.
    pub fn intersection_at(&self, point: Point2d) -> Option<IntersectionId> {
        self.network.intersection_at(point)
    }

    /// Restricts randomly spawned vehicles to start at these intersections.
    /// An empty list allows any intersection.
    pub fn set_spawn_origins(&mut self, origins: &[IntersectionId]) {
        self.spawn_origins = origins.to_vec();
    }

    /// Removes the whole map along with all vehicles.
    pub fn reset(&mut self) {
        self.clear_vehicles();
        self.network.clear();
        self.spawn_origins.clear();
    }

    /// Removes all vehicles, keeping the map.
    pub fn clear_vehicles(&mut self) {
        self.vehicles.clear();
        self.occupancy.clear();
        self.approaches.clear();
    }

    /// Replaces the map with a four-way junction whose north, west and south arms
    /// are used as spawn origins.
    pub fn load_sample_map(&mut self) {
        self.reset();
        let centre = self.add_intersection(Point2d::new(480.0, 360.0));
        let north = self.add_intersection(Point2d::new(480.0, 120.0));
        let south = self.add_intersection(Point2d::new(480.0, 620.0));
        let west = self.add_intersection(Point2d::new(180.0, 360.0));
        let east = self.add_intersection(Point2d::new(780.0, 360.0));
        for arm in [north, south, west, east] {
            self.connect(arm, centre);
        }
        self.set_spawn_origins(&[north, west, south]);
    }

    /// Adds a vehicle which will follow the given path.
    pub fn spawn_vehicle(&mut self, path: Path) -> Result<VehicleId, Error> {
        path.validate(&self.network)?;
        let (start, next) = path.segment(0).ok_or(Error::InvalidPath)?;
        let pos_of = |id| {
            self.network
                .intersection(id)
                .map(|n| n.position())
                .ok_or(Error::MissingGraphNode(id))
        };
        let pos = pos_of(start)?;
        let heading = heading_of(pos_of(next)? - pos);

        let params = &self.params;
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, path, pos, heading, params));
        self.approaches.insert(next, id);
        Ok(id)
    }

    /// Adds a vehicle which will follow the shortest path between two intersections.
    pub fn spawn_route(
        &mut self,
        start: IntersectionId,
        goal: IntersectionId,
    ) -> Result<VehicleId, Error> {
        let path = find_path(&self.network, start, goal)?;
        self.spawn_vehicle(path)
    }

    /// Spawns up to `count` vehicles between random intersections, starting from
    /// the spawn origins if any are set. Vehicles for which no route can be found
    /// are skipped. Returns the number of vehicles spawned.
    pub fn spawn_vehicles(&mut self, count: usize) -> usize {
        let nodes = self
            .network
            .iter_intersections()
            .map(|n| n.id())
            .collect::<Vec<_>>();
        if nodes.len() < 2 {
            return 0;
        }
        let origins = self
            .spawn_origins
            .iter()
            .copied()
            .filter(|id| self.network.contains(*id))
            .collect::<Vec<_>>();
        let origins = if origins.is_empty() { &nodes } else { &origins };

        let mut spawned = 0;
        for _ in 0..count {
            let Some(&start) = origins.choose(&mut self.rng) else {
                break;
            };
            for _ in 0..MAX_SPAWN_ATTEMPTS {
                let Some(&goal) = nodes.choose(&mut self.rng) else {
                    break;
                };
                match self.spawn_route(start, goal) {
                    Ok(_) => {
                        spawned += 1;
                        break;
                    }
                    Err(err) => log::debug!("Retrying spawn: {}", err),
                }
            }
        }
        if spawned < count {
            log::debug!("Spawned {} of {} vehicles", spawned, count);
        }
        spawned
    }

    /// Removes a vehicle from the simulation, releasing any junction it occupies.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        if let Some(mut vehicle) = self.vehicles.remove(id) {
            if let Some(junction) = vehicle.take_occupied() {
                self.occupancy.release(junction, id);
            }
            if let Some((_, to)) = vehicle.current_segment() {
                self.approaches.remove(to, id);
            }
            debug_assert!(self.occupancy.iter().all(|(_, holder)| holder != id));
        }
    }

    /// Gets the current driver parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Replaces the driver parameters of every current and future vehicle.
    pub fn set_parameters(&mut self, params: Parameters) {
        self.params = params;
        for vehicle in self.vehicles.values_mut() {
            vehicle.set_params(&params);
        }
    }

    /// Gets the junction arbitration policy.
    pub fn yield_policy(&self) -> &YieldPolicy {
        &self.policy
    }

    /// Replaces the junction arbitration policy.
    pub fn set_yield_policy(&mut self, policy: YieldPolicy) {
        self.policy = policy;
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Steps longer than 50 ms are shortened to 50 ms; a step of zero does nothing.
    pub fn step(&mut self, dt: f64) {
        if !(dt > 0.0) {
            return;
        }
        let dt = f64::min(dt, MAX_STEP);

        let ids = self.vehicles.keys().collect::<Vec<_>>();
        let mut exited = vec![];

        for id in ids {
            let arbiter = Arbiter {
                policy: &self.policy,
                network: &self.network,
                vehicles: &self.vehicles,
                occupancy: &self.occupancy,
                approaches: &self.approaches,
            };
            let observation = self.vehicles[id].observe(&arbiter);
            match observation {
                Ok(Some(obs)) => {
                    let vehicle = &mut self.vehicles[id];
                    vehicle.advance(
                        &obs,
                        dt,
                        &self.policy,
                        &self.network,
                        &mut self.occupancy,
                        &mut self.approaches,
                    );
                    if vehicle.has_arrived() {
                        exited.push(id);
                    }
                }
                Ok(None) => exited.push(id),
                Err(err) => {
                    log::warn!("Dropping vehicle {:?}: {}", id, err);
                    exited.push(id);
                }
            }
        }

        for id in exited {
            self.remove_vehicle(id);
        }
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Returns an iterator over all the intersections.
    pub fn iter_intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.network.iter_intersections()
    }

    /// Returns an iterator over all the roads.
    pub fn iter_roads(&self) -> impl Iterator<Item = &Road> {
        self.network.iter_roads()
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// The number of vehicles in the simulation.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// Gets a reference to the intersection with the given ID.
    pub fn get_intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.network.intersection(id)
    }

    /// Gets a reference to the road with the given ID.
    pub fn get_road(&self, id: RoadId) -> Option<&Road> {
        self.network.road(id)
    }

    /// Gets the road network.
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// The vehicle occupying the junction, if any.
    pub fn occupant(&self, junction: IntersectionId) -> Option<VehicleId> {
        self.occupancy.holder(junction)
    }

    /// Gets the junction occupancy table.
    pub fn occupancy(&self) -> &OccupancyTable {
        &self.occupancy
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sample_map_layout() {
        let mut sim = Simulation::with_seed(1);
        sim.load_sample_map();
        assert_eq!(sim.iter_intersections().count(), 5);
        assert_eq!(sim.iter_roads().count(), 8);
        let centre = sim.intersection_at(Point2d::new(480.0, 360.0)).unwrap();
        assert_eq!(sim.get_intersection(centre).unwrap().connected().len(), 4);
        assert_eq!(sim.spawn_origins.len(), 3);
    }

    #[test]
    fn spawns_from_origins() {
        let mut sim = Simulation::with_seed(7);
        sim.load_sample_map();
        let origins = sim.spawn_origins.clone();
        assert_eq!(sim.spawn_vehicles(50), 50);
        for vehicle in sim.iter_vehicles() {
            assert!(origins.contains(&vehicle.path().origin().unwrap()));
            assert_ne!(vehicle.path().origin(), vehicle.path().destination());
            assert_eq!(vehicle.speed(), 0.0);
        }
    }

    #[test]
    fn spawning_needs_two_intersections() {
        let mut sim = Simulation::with_seed(3);
        assert_eq!(sim.spawn_vehicles(5), 0);
        sim.add_intersection(Point2d::new(0.0, 0.0));
        assert_eq!(sim.spawn_vehicles(5), 0);
    }

    #[test]
    fn unreachable_destinations_are_skipped() {
        let mut sim = Simulation::with_seed(11);
        let a = sim.add_intersection(Point2d::new(0.0, 0.0));
        sim.add_intersection(Point2d::new(100.0, 0.0));
        sim.set_spawn_origins(&[a]);
        assert_eq!(sim.spawn_vehicles(10), 0);
        assert_eq!(sim.vehicle_count(), 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut sim = Simulation::with_seed(5);
        sim.load_sample_map();
        sim.spawn_vehicles(10);
        for _ in 0..200 {
            sim.step(0.05);
        }
        sim.reset();
        assert_eq!(sim.vehicle_count(), 0);
        assert_eq!(sim.iter_intersections().count(), 0);
        assert_eq!(sim.occupancy().iter().count(), 0);
        assert!(sim.spawn_origins.is_empty());
    }

    #[test]
    fn long_steps_are_clamped() {
        let mut sim = Simulation::with_seed(2);
        let a = sim.add_intersection(Point2d::new(0.0, 0.0));
        let b = sim.add_intersection(Point2d::new(1000.0, 0.0));
        sim.connect(a, b);
        let id = sim.spawn_route(a, b).unwrap();
        sim.step(10.0);
        let vehicle = sim.get_vehicle(id).unwrap();
        assert!((vehicle.speed() - 2.5 * MAX_STEP).abs() < 1e-9);
        assert!(vehicle.position().x < 1.0);
    }
}

use junction_sim::Simulation;
use std::time::Instant;

fn main() {
    env_logger::init();

    let mut sim = Simulation::with_seed(0);
    sim.load_sample_map();
    let spawned = sim.spawn_vehicles(500);
    println!("Spawned {} vehicles, simulating...", spawned);

    const NUM_FRAMES: u32 = 200;
    while sim.vehicle_count() > 0 {
        let start = Instant::now();
        for _ in 0..NUM_FRAMES {
            sim.step(0.05);
        }
        let frame = start.elapsed() / NUM_FRAMES;
        println!(
            "Frame {}: avg. {:?} per step, {} vehicles remaining",
            sim.frame(),
            frame,
            sim.vehicle_count(),
        );
        if sim.frame() > 100_000 {
            break;
        }
    }
}

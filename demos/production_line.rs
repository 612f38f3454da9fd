use prodline::{
    EventKind, MachineSpec, Simulation, SimulationConfig, SimulationEvent, END_NODE_ID,
    START_NODE_ID,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger without timestamps for cleaner output
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .init();

    println!("Starting Production Line Simulation");

    let config = SimulationConfig::new()
        .with_generation_interval(Duration::from_millis(300))
        .with_snapshot_interval(Duration::from_millis(500))
        .with_total_to_generate(8)
        .with_random_seed(Some(42));

    println!("Configuration:");
    println!(
        "  Generation interval: {:?}, products: {}",
        config.generation_interval, config.total_to_generate
    );
    println!(
        "  Snapshot interval: {:?}, history: {}",
        config.snapshot_interval, config.max_snapshots
    );
    println!();

    let sim = Simulation::new(config)?;
    sim.subscribe(Arc::new(|event: &SimulationEvent| match &event.kind {
        EventKind::ProductCompleted { product_id, .. } => {
            println!("  {} left the line", product_id)
        }
        EventKind::MachineBreakdown {
            machine_id,
            repair_ms,
        } => println!("  {} broke down ({} ms repair)", machine_id, repair_ms),
        _ => {}
    }));

    // Start -> intake -> cutter -> buffer -> {polisher, packer} -> End
    let intake = sim.add_queue(150.0, 250.0, 5)?.id;
    let cutter = sim
        .add_machine_with(MachineSpec::new(300.0, 250.0, 200, 400).with_reliability(0.9))
        .await?
        .id;
    let buffer = sim.add_queue(450.0, 250.0, 2)?.id;
    let polisher = sim.add_machine(600.0, 150.0, 500, 800).await?.id;
    let packer = sim.add_machine(600.0, 350.0, 500, 800).await?.id;

    sim.add_connection(START_NODE_ID, &intake)?;
    sim.add_connection(&intake, &cutter)?;
    sim.add_connection(&cutter, &buffer)?;
    sim.add_connection(&buffer, &polisher)?;
    sim.add_connection(&buffer, &packer)?;
    sim.add_connection(&polisher, END_NODE_ID)?;
    sim.add_connection(&packer, END_NODE_ID)?;

    println!("Running...");
    sim.start().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    sim.pause().await;
    println!(
        "Paused with {} snapshots (replay boundary {})",
        sim.snapshot_count(),
        sim.replay_boundary()
    );
    sim.resume().await;

    while sim.product_info().completed < sim.product_info().total_to_generate {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    sim.stop().await;

    let stats = sim.statistics();
    println!();
    println!("=== Results ===");
    println!("  Completed: {}", stats.total_completed);
    println!("  Throughput: {:.2} products/s", stats.throughput);
    println!("  Average processing time: {:.0} ms", stats.average_processing_time);
    for (machine_id, utilization) in &stats.machine_utilization {
        println!("  {} utilization: {:.0}%", machine_id, utilization * 100.0);
    }
    println!("  Snapshots stored: {}", sim.snapshot_count());

    Ok(())
}

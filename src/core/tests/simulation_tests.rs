// Tests for the Simulation controller lifecycle, snapshots and restore
#[cfg(test)]
mod tests {
    use crate::core::config::SimulationConfig;
    use crate::core::errors::{SimulationError, SnapshotError};
    use crate::core::event_bus::EventLog;
    use crate::core::execution::Simulation;
    use crate::core::model::{LifecycleState, MachineSpec};
    use crate::core::types::{NodeId, Position, END_NODE_ID, START_NODE_ID};
    use std::sync::Arc;
    use std::time::Duration;

    fn config(total: u64) -> SimulationConfig {
        SimulationConfig::new()
            .with_generation_interval(Duration::from_millis(10))
            .with_snapshot_interval(Duration::from_millis(100))
            .with_idle_poll_interval(Duration::from_millis(10))
            .with_flash_duration(Duration::from_millis(20))
            .with_total_to_generate(total)
            .with_default_reliability(1.0)
            .with_random_seed(Some(42))
    }

    /// Start -> Q -> M -> End
    async fn single_stage(sim: &Simulation, capacity: usize) -> (NodeId, NodeId) {
        let queue = sim.add_queue(100.0, 100.0, capacity).unwrap().id;
        let machine = sim.add_machine(200.0, 100.0, 100, 100).await.unwrap().id;
        sim.add_connection(START_NODE_ID, &queue).unwrap();
        sim.add_connection(&queue, &machine).unwrap();
        sim.add_connection(&machine, END_NODE_ID).unwrap();
        (queue, machine)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let sim = Simulation::new(config(5)).unwrap();
        let log = Arc::new(EventLog::new());
        sim.subscribe(log.clone());
        single_stage(&sim, 10).await;
        sim.add_machine(0.0, 0.0, 50, 60).await.unwrap();

        sim.start().await;
        sim.start().await;

        assert_eq!(sim.lifecycle(), LifecycleState::Running);
        assert_eq!(sim.worker_ids().await.len(), 2);
        assert_eq!(log.count("SIMULATION_STARTED"), 1);
        sim.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_line_and_records_boundary() {
        let sim = Simulation::new(config(50)).unwrap();
        single_stage(&sim, 10).await;

        sim.start().await;
        advance(350).await;
        sim.pause().await;

        assert_eq!(sim.lifecycle(), LifecycleState::Paused);
        assert_eq!(sim.replay_boundary(), 3);
        assert!(sim.worker_ids().await.is_empty());

        let frozen = sim.current_state();
        advance(1_000).await;
        let later = sim.current_state();
        assert_eq!(later.start, frozen.start);
        assert_eq!(later.end, frozen.end);
        assert_eq!(later.queues, frozen.queues);
        assert_eq!(sim.snapshot_count(), 3);
        assert_eq!(sim.replay_to_boundary().len(), 3);

        sim.pause().await;
        assert_eq!(sim.replay_boundary(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_continues_without_clearing_history() {
        let sim = Simulation::new(config(3)).unwrap();
        let log = Arc::new(EventLog::new());
        sim.subscribe(log.clone());
        single_stage(&sim, 10).await;

        sim.start().await;
        advance(150).await;
        sim.pause().await;
        let before = sim.snapshot_count();

        sim.resume().await;
        sim.resume().await;
        advance(1_000).await;

        assert!(sim.snapshot_count() > before);
        assert_eq!(sim.product_info().completed, 3);
        assert_eq!(log.count("SIMULATION_RESUMED"), 1);
        sim.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_clears_snapshots() {
        let sim = Simulation::new(config(3)).unwrap();
        single_stage(&sim, 10).await;

        sim.start().await;
        advance(250).await;
        sim.stop().await;
        assert_eq!(sim.snapshot_count(), 2);

        sim.start().await;
        assert_eq!(sim.snapshot_count(), 0);
        assert_eq!(sim.replay_boundary(), 0);
        sim.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_to_empty_line() {
        let sim = Simulation::new(config(5)).unwrap();
        let log = Arc::new(EventLog::new());
        sim.subscribe(log.clone());
        single_stage(&sim, 10).await;

        sim.start().await;
        advance(300).await;
        sim.reset().await;

        let state = sim.current_state();
        assert_eq!(sim.lifecycle(), LifecycleState::Stopped);
        assert!(state.queues.is_empty());
        assert!(state.machines.is_empty());
        assert!(state.connections.is_empty());
        assert_eq!(state.start.generated_count, 0);
        assert_eq!(state.end.completed_count, 0);
        assert_eq!(sim.snapshot_count(), 0);
        assert_eq!(log.count("SIMULATION_RESET"), 1);

        let (queue, _) = single_stage(&sim, 10).await;
        sim.start().await;
        advance(5).await;
        sim.pause().await;
        let state = sim.current_state();
        let first = state.queue(&queue).unwrap().products.first().cloned();
        let held = state.machines[0].current_product.clone();
        let id = first.or(held).map(|p| p.id);
        assert_eq!(id.as_deref(), Some("P1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_pauses_and_replaces_live_state() {
        let sim = Simulation::new(config(20)).unwrap();
        single_stage(&sim, 10).await;

        sim.start().await;
        advance(250).await;
        let snapshot = sim.all_snapshots()[0].clone();

        let restored = sim.restore_snapshot(0).await.unwrap();
        assert_eq!(sim.lifecycle(), LifecycleState::Paused);
        assert_eq!(restored.start.generated_count, snapshot.state().start.generated_count);
        assert_eq!(restored.queues, snapshot.state().queues);
        assert_eq!(restored.machines, snapshot.state().machines);
        assert_eq!(restored.connections, snapshot.state().connections);

        sim.resume().await;
        advance(500).await;
        sim.pause().await;
        assert!(sim.current_state().verify().is_ok());
        assert_eq!(sim.all_snapshots()[0], snapshot);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_unknown_index_keeps_running() {
        let sim = Simulation::new(config(5)).unwrap();
        single_stage(&sim, 10).await;
        sim.start().await;

        let err = sim.restore_snapshot(7).await.unwrap_err();
        assert_eq!(
            err,
            SimulationError::Snapshot(SnapshotError::NotFound { index: 7, len: 0 })
        );
        assert!(err.is_client_error());
        assert_eq!(sim.lifecycle(), LifecycleState::Running);
        sim.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_machines_added_and_removed_while_running() {
        let sim = Simulation::new(config(5)).unwrap();
        single_stage(&sim, 10).await;
        sim.start().await;

        let spec = MachineSpec::new(0.0, 0.0, 10, 20).with_reliability(0.5);
        let added = sim.add_machine_with(spec).await.unwrap();
        assert_eq!(added.reliability, 0.5);
        assert!(sim.worker_ids().await.contains(&added.id));

        sim.remove_machine(&added.id).await.unwrap();
        assert!(!sim.worker_ids().await.contains(&added.id));
        assert!(sim.current_state().machine(&added.id).is_none());
        sim.stop().await;
    }

    #[tokio::test]
    async fn test_default_nodes_use_configured_values() {
        let config = SimulationConfig::new().with_default_reliability(0.8);
        let sim = Simulation::new(config).unwrap();

        let machine = sim.add_default_machine(5.0, 6.0).await.unwrap();
        assert_eq!((machine.min_service_time, machine.max_service_time), (2000, 4000));
        assert_eq!(machine.reliability, 0.8);
        assert_eq!(machine.position, Position::new(5.0, 6.0));

        let queue = sim.add_default_queue(1.0, 2.0).unwrap();
        assert_eq!(queue.capacity, 100);
        assert_eq!(sim.current_state().queues.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_production_target_and_rate() {
        let sim = Simulation::new(config(5)).unwrap();
        single_stage(&sim, 10).await;

        assert!(sim.set_total_to_generate(10_001).is_err());
        sim.set_total_to_generate(2).unwrap();
        assert!(sim
            .set_generation_interval(Duration::ZERO)
            .await
            .is_err());

        sim.start().await;
        sim.set_generation_interval(Duration::from_millis(5)).await.unwrap();
        advance(600).await;

        let info = sim.product_info();
        assert_eq!(info.total_to_generate, 2);
        assert_eq!(info.generated, 2);
        assert_eq!(info.completed, 2);
        assert_eq!(info.remaining, 0);
        assert!(sim.set_total_to_generate(1).is_err());
        assert_eq!(sim.config().generation_interval, Duration::from_millis(5));
        sim.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_statistics_after_run() {
        let sim = Simulation::new(config(3)).unwrap();
        let (_, machine) = single_stage(&sim, 10).await;

        sim.start().await;
        advance(1_000).await;
        sim.pause().await;

        let stats = sim.statistics();
        assert_eq!(stats.total_completed, 3);
        assert_eq!(stats.total_products_processed, 3);
        assert_eq!(stats.machine_processed_count[&machine], 3);
        assert!(stats.average_processing_time >= 100.0);
        assert!(stats.machine_utilization[&machine] > 0.0);
        assert!(stats.machine_utilization[&machine] <= 1.0);
        assert!(stats.throughput > 0.0);
        assert!(stats.simulation_start_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_position_and_on_demand_snapshot() {
        let sim = Simulation::new(config(5)).unwrap();
        let (queue, _) = single_stage(&sim, 10).await;

        sim.update_position(START_NODE_ID, 1.0, 2.0).unwrap();
        sim.update_position(&queue, 3.0, 4.0).unwrap();
        assert!(sim.update_position("Q99", 0.0, 0.0).is_err());

        assert_eq!(sim.capture_snapshot().unwrap(), 1);
        let state = sim.all_snapshots()[0].state().clone();
        assert_eq!(state.start.position.x, 1.0);
        assert_eq!(state.queue(&queue).unwrap().position.y, 4.0);

        sim.clear_snapshots();
        assert_eq!(sim.snapshot_count(), 0);
    }
}

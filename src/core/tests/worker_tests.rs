// Tests for MachineWorker state transitions against a live line
#[cfg(test)]
mod tests {
    use crate::core::config::BackpressurePolicy;
    use crate::core::event_bus::{EventBus, EventLog};
    use crate::core::execution::task::{seeded_rng, TaskHandle};
    use crate::core::execution::worker::{MachineWorker, WorkerTiming};
    use crate::core::line::Line;
    use crate::core::model::{MachineSpec, MachineStatus, Product, ProductStatus, IDLE_COLOR};
    use crate::core::types::{NodeId, Position, END_NODE_ID};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        line: Arc<Line>,
        log: Arc<EventLog>,
        input: NodeId,
        machine: NodeId,
        output: Option<NodeId>,
    }

    /// Q_in -> M -> (Q_out | End)
    fn fixture(spec: MachineSpec, output_capacity: Option<usize>) -> Fixture {
        let line = Arc::new(Line::new(100));
        let (input, machine, output) = {
            let mut topology = line.topology_mut();
            let input = topology.add_queue(Position::default(), 10).unwrap().id;
            let machine = topology.add_machine(&spec).unwrap().id;
            topology.add_connection(&input, &machine).unwrap();
            let output = match output_capacity {
                Some(capacity) => {
                    let output = topology.add_queue(Position::default(), capacity).unwrap().id;
                    topology.add_connection(&machine, &output).unwrap();
                    Some(output)
                }
                None => {
                    topology.add_connection(&machine, END_NODE_ID).unwrap();
                    None
                }
            };
            (input, machine, output)
        };
        Fixture {
            line,
            log: Arc::new(EventLog::new()),
            input,
            machine,
            output,
        }
    }

    fn spawn(fixture: &Fixture, backpressure: BackpressurePolicy) -> TaskHandle {
        let bus = Arc::new(EventBus::new());
        bus.subscribe(fixture.log.clone());
        let worker = MachineWorker::new(
            fixture.machine.clone(),
            Arc::clone(&fixture.line),
            bus,
            WorkerTiming {
                idle_poll: Duration::from_millis(10),
                flash: Duration::from_millis(20),
                backpressure,
            },
            seeded_rng(Some(3), &fixture.machine),
        );
        TaskHandle::spawn("worker", move |cancel| worker.run(cancel))
    }

    fn feed(fixture: &Fixture, queue: &str, id: &str, priority: i32) {
        assert!(fixture
            .line
            .topology()
            .buffer(queue)
            .unwrap()
            .enqueue(Product::new(id, "#fff", priority)));
    }

    fn queue_len(fixture: &Fixture, queue: &str) -> usize {
        fixture.line.topology().buffer(queue).unwrap().len()
    }

    fn status(fixture: &Fixture) -> MachineStatus {
        fixture.line.topology().machine(&fixture.machine).unwrap().lock().status
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_product_to_output_queue() {
        let fixture = fixture(MachineSpec::new(0.0, 0.0, 100, 100), Some(5));
        feed(&fixture, &fixture.input, "P1", 1);
        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);

        advance(50).await;
        assert_eq!(status(&fixture), MachineStatus::Processing);
        let state = fixture.line.capture();
        assert_eq!(state.products_in_system(), 1);
        assert_eq!(state.machine(&fixture.machine).unwrap().current_color, "#fff");

        advance(60).await;
        let output = fixture.output.clone().unwrap();
        assert_eq!(queue_len(&fixture, &output), 1);
        assert_eq!(status(&fixture), MachineStatus::Flashing);

        advance(50).await;
        assert_eq!(status(&fixture), MachineStatus::Idle);
        let state = fixture.line.capture();
        let machine = state.machine(&fixture.machine).unwrap();
        assert_eq!(machine.processed_count, 1);
        assert!(machine.total_processing_time >= 100);
        assert_eq!(machine.current_color, IDLE_COLOR);
        assert_eq!(state.queue(&output).unwrap().products[0].status, ProductStatus::Waiting);

        assert_eq!(fixture.log.count("MACHINE_PROCESSING"), 1);
        assert_eq!(fixture.log.count("PRODUCT_MOVED"), 1);
        assert_eq!(fixture.log.count("MACHINE_FLASH"), 1);
        assert_eq!(fixture.log.count("MACHINE_IDLE"), 1);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_machine_completes_product() {
        let fixture = fixture(MachineSpec::new(0.0, 0.0, 100, 100), None);
        feed(&fixture, &fixture.input, "P1", 1);
        feed(&fixture, &fixture.input, "P2", 1);
        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);

        advance(400).await;
        let state = fixture.line.capture();
        assert_eq!(state.end.completed_count, 2);
        assert_eq!(state.products_in_system(), 0);
        assert_eq!(fixture.log.count("PRODUCT_COMPLETED"), 2);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_output_requeues_to_input() {
        let fixture = fixture(MachineSpec::new(0.0, 0.0, 100, 100), Some(1));
        let output = fixture.output.clone().unwrap();
        feed(&fixture, &output, "X", 1);
        feed(&fixture, &fixture.input, "P1", 1);
        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);

        for _ in 0..6 {
            advance(55).await;
            let state = fixture.line.capture();
            assert_eq!(state.products_in_system(), 2);
            assert_eq!(state.queue(&output).unwrap().products.len(), 1);
        }

        assert!(fixture.log.count("PRODUCT_REQUEUED") >= 1);
        let state = fixture.line.capture();
        assert_eq!(state.machine(&fixture.machine).unwrap().processed_count, 0);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_and_retry_keeps_product_until_room() {
        let fixture = fixture(MachineSpec::new(0.0, 0.0, 100, 100), Some(1));
        let output = fixture.output.clone().unwrap();
        feed(&fixture, &output, "X", 1);
        feed(&fixture, &fixture.input, "P1", 1);
        let handle = spawn(&fixture, BackpressurePolicy::HoldAndRetry);

        advance(150).await;
        {
            let state = fixture.line.capture();
            let machine = state.machine(&fixture.machine).unwrap();
            assert_eq!(machine.current_product.as_ref().unwrap().id, "P1");
            assert_eq!(queue_len(&fixture, &fixture.input), 0);
        }

        let drained = fixture.line.topology().buffer(&output).unwrap().dequeue();
        assert_eq!(drained.unwrap().id, "X");

        advance(20).await;
        let state = fixture.line.capture();
        assert_eq!(state.queue(&output).unwrap().products[0].id, "P1");
        assert_eq!(state.machine(&fixture.machine).unwrap().processed_count, 1);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_breakdown_extends_busy_period() {
        let spec = MachineSpec::new(0.0, 0.0, 100, 100).with_reliability(0.0);
        let fixture = fixture(spec, None);
        feed(&fixture, &fixture.input, "P1", 1);
        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);

        advance(100).await;
        assert_eq!(status(&fixture), MachineStatus::Maintenance);
        let breakdowns: Vec<u64> = fixture
            .log
            .events()
            .into_iter()
            .filter_map(|e| match e.kind {
                crate::core::event::EventKind::MachineBreakdown { repair_ms, .. } => Some(repair_ms),
                _ => None,
            })
            .collect();
        assert_eq!(breakdowns, vec![200]);

        advance(150).await;
        assert_eq!(status(&fixture), MachineStatus::Processing);
        assert_eq!(fixture.line.end().lock().completed_count, 0);

        advance(100).await;
        assert_eq!(fixture.line.end().lock().completed_count, 1);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_breakdown_announces_every_transition() {
        let spec = MachineSpec::new(0.0, 0.0, 100, 100).with_reliability(0.0);
        let fixture = fixture(spec, None);
        feed(&fixture, &fixture.input, "P1", 1);
        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);

        advance(350).await;
        let names: Vec<&str> = fixture
            .log
            .events()
            .iter()
            .map(|e| e.event_type())
            .collect();
        assert_eq!(
            names,
            vec![
                "MACHINE_PROCESSING",
                "MACHINE_BREAKDOWN",
                "MACHINE_PROCESSING",
                "PRODUCT_COMPLETED",
                "MACHINE_FLASH",
                "MACHINE_IDLE",
            ]
        );
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_served_product_is_not_served_again_after_restart() {
        let fixture = fixture(MachineSpec::new(0.0, 0.0, 100, 100), Some(1));
        let output = fixture.output.clone().unwrap();
        feed(&fixture, &output, "X", 1);
        feed(&fixture, &fixture.input, "P1", 1);

        let handle = spawn(&fixture, BackpressurePolicy::HoldAndRetry);
        advance(150).await;
        handle.shutdown(Duration::from_secs(1)).await;
        let served_ms = {
            let state = fixture.line.capture();
            let machine = state.machine(&fixture.machine).unwrap();
            assert_eq!(machine.current_product.as_ref().unwrap().id, "P1");
            machine.service_elapsed.unwrap()
        };
        assert!((100..150).contains(&served_ms));

        let drained = fixture.line.topology().buffer(&output).unwrap().dequeue();
        assert_eq!(drained.unwrap().id, "X");

        let handle = spawn(&fixture, BackpressurePolicy::HoldAndRetry);
        advance(20).await;
        let state = fixture.line.capture();
        assert_eq!(state.queue(&output).unwrap().products[0].id, "P1");
        let machine = state.machine(&fixture.machine).unwrap();
        assert_eq!(machine.processed_count, 1);
        assert_eq!(machine.total_processing_time, served_ms);
        assert!(machine.service_elapsed.is_none());
        assert_eq!(fixture.log.count("MACHINE_PROCESSING"), 1);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_serves_highest_priority_first() {
        let fixture = fixture(MachineSpec::new(0.0, 0.0, 100, 100), Some(5));
        feed(&fixture, &fixture.input, "LOW", 1);
        feed(&fixture, &fixture.input, "HIGH", 5);
        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);

        advance(50).await;
        let state = fixture.line.capture();
        let held = state.machine(&fixture.machine).unwrap().current_product.clone();
        assert_eq!(held.unwrap().id, "HIGH");
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_product_on_machine_and_resumes() {
        let fixture = fixture(MachineSpec::new(0.0, 0.0, 100, 100), None);
        feed(&fixture, &fixture.input, "P1", 1);

        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);
        advance(50).await;
        handle.shutdown(Duration::from_secs(1)).await;

        let state = fixture.line.capture();
        assert_eq!(state.products_in_system(), 1);
        assert!(state.machine(&fixture.machine).unwrap().current_product.is_some());

        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);
        advance(150).await;
        assert_eq!(fixture.line.end().lock().completed_count, 1);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_exits_when_machine_removed() {
        let fixture = fixture(MachineSpec::new(0.0, 0.0, 100, 100), None);
        let handle = spawn(&fixture, BackpressurePolicy::RequeueToInput);

        advance(15).await;
        fixture.line.topology_mut().remove_machine(&fixture.machine).unwrap();
        advance(30).await;
        assert!(handle.is_finished());
    }
}

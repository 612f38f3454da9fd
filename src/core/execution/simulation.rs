use super::generator::{ProductGenerator, ProductSequence};
use super::snapshotter::run_snapshot_ticker;
use super::task::{seeded_rng, TaskHandle};
use super::worker::{MachineWorker, WorkerTiming};
use crate::core::config::{SimulationConfig, MAX_TOTAL_TO_GENERATE};
use crate::core::connections::{ConnectionRule, ConnectionValidator};
use crate::core::errors::SimulationError;
use crate::core::event::EventKind;
use crate::core::event_bus::{EventBus, SimulationObserver, SubscriptionId};
use crate::core::line::Line;
use crate::core::model::{
    Connection, LifecycleState, Machine, MachineSpec, ProductionQueue, SimulationState,
};
use crate::core::snapshot::{Snapshot, SnapshotManager};
use crate::core::statistics::SimulationStatistics;
use crate::core::types::{now_millis, Millis, NodeId, Position, END_NODE_ID, START_NODE_ID};
use log::info;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Production counters of the Start and End nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub total_to_generate: u64,
    pub generated: u64,
    pub completed: u64,
    pub remaining: u64,
}

/// Background tasks of a running simulation
#[derive(Debug, Default)]
struct TaskSet {
    workers: BTreeMap<NodeId, TaskHandle>,
    generator: Option<TaskHandle>,
    snapshotter: Option<TaskHandle>,
}

impl TaskSet {
    fn drain(&mut self) -> Vec<TaskHandle> {
        let mut handles: Vec<TaskHandle> = std::mem::take(&mut self.workers).into_values().collect();
        handles.extend(self.generator.take());
        handles.extend(self.snapshotter.take());
        handles
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        for handle in self.workers.values() {
            handle.cancel();
        }
        for handle in self.generator.iter().chain(self.snapshotter.iter()) {
            handle.cancel();
        }
    }
}

/// Running time with paused intervals excluded
#[derive(Debug, Default)]
struct RunClock {
    started_at: Option<Millis>,
    accumulated: Duration,
    resumed: Option<Instant>,
}

impl RunClock {
    fn start(&mut self) {
        self.started_at = Some(now_millis());
        self.accumulated = Duration::ZERO;
        self.resumed = Some(Instant::now());
    }

    fn resume(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(now_millis());
        }
        if self.resumed.is_none() {
            self.resumed = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(resumed) = self.resumed.take() {
            self.accumulated += resumed.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.resumed.map(|r| r.elapsed()).unwrap_or_default()
    }
}

/// Owns one production line and the tasks that run it.
///
/// Lifecycle operations are serialised through an async mutex over the task set, so a
/// concurrent `start` and `pause` never interleave and each machine has at most one worker.
/// Topology edits that do not affect tasks are synchronous.
pub struct Simulation {
    config: RwLock<SimulationConfig>,
    line: Arc<Line>,
    bus: Arc<EventBus>,
    snapshots: Arc<SnapshotManager>,
    sequence: Arc<ProductSequence>,
    tasks: tokio::sync::Mutex<TaskSet>,
    replay_boundary: AtomicUsize,
    clock: Mutex<RunClock>,
}

impl Simulation {
    /// Create a new, stopped simulation with an empty line
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            line: Arc::new(Line::new(config.total_to_generate)),
            bus: Arc::new(EventBus::new()),
            snapshots: Arc::new(SnapshotManager::new(config.max_snapshots)),
            sequence: Arc::new(ProductSequence::new()),
            tasks: tokio::sync::Mutex::new(TaskSet::default()),
            replay_boundary: AtomicUsize::new(0),
            clock: Mutex::new(RunClock::default()),
            config: RwLock::new(config),
        })
    }

    pub fn config(&self) -> SimulationConfig {
        self.config.read().clone()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.line.lifecycle()
    }

    pub fn is_running(&self) -> bool {
        self.line.is_running()
    }

    // ---- lifecycle ----

    /// Begin a fresh run over the current line. Clears the snapshot history.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if self.line.is_running() {
            return;
        }

        self.snapshots.clear();
        self.replay_boundary.store(0, Ordering::SeqCst);
        self.clock.lock().start();
        self.line.set_lifecycle(LifecycleState::Running);
        self.spawn_all(&mut tasks);

        info!("[Simulation] Started");
        self.bus.publish(EventKind::SimulationStarted);
    }

    /// Stop every task, keeping all products where they are
    pub async fn pause(&self) {
        let mut tasks = self.tasks.lock().await;
        self.pause_locked(&mut tasks).await;
    }

    async fn pause_locked(&self, tasks: &mut TaskSet) {
        if !self.line.is_running() {
            return;
        }

        self.line.set_lifecycle(LifecycleState::Paused);
        self.shutdown_all(tasks).await;
        self.clock.lock().pause();
        let boundary = self.snapshots.len();
        self.replay_boundary.store(boundary, Ordering::SeqCst);

        info!("[Simulation] Paused, replay boundary {}", boundary);
        self.bus.publish(EventKind::SimulationPaused {
            replay_boundary: boundary,
        });
    }

    /// Continue from the current state without clearing history
    pub async fn resume(&self) {
        let mut tasks = self.tasks.lock().await;
        if self.line.is_running() {
            return;
        }

        self.clock.lock().resume();
        self.line.set_lifecycle(LifecycleState::Running);
        self.spawn_all(&mut tasks);

        info!("[Simulation] Resumed");
        self.bus.publish(EventKind::SimulationResumed);
    }

    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        self.stop_locked(&mut tasks).await;
    }

    async fn stop_locked(&self, tasks: &mut TaskSet) {
        if self.line.lifecycle() == LifecycleState::Stopped {
            return;
        }

        self.line.set_lifecycle(LifecycleState::Stopped);
        self.shutdown_all(tasks).await;
        self.clock.lock().pause();

        info!("[Simulation] Stopped");
        self.bus.publish(EventKind::SimulationStopped);
    }

    /// Stop and return to an empty line with fresh Start/End nodes
    pub async fn reset(&self) {
        let mut tasks = self.tasks.lock().await;
        self.stop_locked(&mut tasks).await;

        let total = self.config.read().total_to_generate;
        self.line.reset(total);
        self.snapshots.clear();
        self.sequence.reset(0);
        self.replay_boundary.store(0, Ordering::SeqCst);
        *self.clock.lock() = RunClock::default();

        info!("[Simulation] Reset");
        self.bus.publish(EventKind::SimulationReset);
    }

    fn spawn_all(&self, tasks: &mut TaskSet) {
        let config = self.config.read().clone();

        for machine_id in self.line.topology().machine_ids() {
            self.spawn_worker(tasks, machine_id, &config);
        }
        self.spawn_generator(tasks, &config);

        let line = Arc::clone(&self.line);
        let snapshots = Arc::clone(&self.snapshots);
        let bus = Arc::clone(&self.bus);
        let interval = config.snapshot_interval;
        tasks.snapshotter = Some(TaskHandle::spawn("snapshots", move |cancel| {
            run_snapshot_ticker(line, snapshots, bus, interval, cancel)
        }));
    }

    fn spawn_worker(&self, tasks: &mut TaskSet, machine_id: NodeId, config: &SimulationConfig) {
        if let Some(existing) = tasks.workers.get(&machine_id) {
            if !existing.is_finished() {
                return;
            }
        }

        let worker = MachineWorker::new(
            machine_id.clone(),
            Arc::clone(&self.line),
            Arc::clone(&self.bus),
            WorkerTiming::from_config(config),
            seeded_rng(config.random_seed, &machine_id),
        );
        let handle = TaskHandle::spawn(format!("machine-{}", machine_id), move |cancel| {
            worker.run(cancel)
        });
        tasks.workers.insert(machine_id, handle);
    }

    fn spawn_generator(&self, tasks: &mut TaskSet, config: &SimulationConfig) {
        let generator = ProductGenerator::new(
            Arc::clone(&self.line),
            Arc::clone(&self.bus),
            Arc::clone(&self.sequence),
            config,
            seeded_rng(config.random_seed, "generator"),
        );
        let interval = config.generation_interval;
        tasks.generator = Some(TaskHandle::spawn("generator", move |cancel| {
            generator.run(interval, cancel)
        }));
    }

    async fn shutdown_all(&self, tasks: &mut TaskSet) {
        let timeout = self.config.read().shutdown_timeout;
        let handles = tasks.drain();
        for handle in &handles {
            handle.cancel();
        }
        for handle in handles {
            handle.shutdown(timeout).await;
        }
    }

    /// Ids of machines with a live worker task
    pub async fn worker_ids(&self) -> Vec<NodeId> {
        let tasks = self.tasks.lock().await;
        tasks
            .workers
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect()
    }

    // ---- topology ----

    /// Add a machine with the configured default reliability
    pub async fn add_machine(
        &self,
        x: f64,
        y: f64,
        min_service_time: u64,
        max_service_time: u64,
    ) -> Result<Machine, SimulationError> {
        let reliability = self.config.read().default_reliability;
        let spec = MachineSpec::new(x, y, min_service_time, max_service_time).with_reliability(reliability);
        self.add_machine_with(spec).await
    }

    /// Add a machine with the configured default service time and reliability
    pub async fn add_default_machine(&self, x: f64, y: f64) -> Result<Machine, SimulationError> {
        let (min, max) = self.config.read().default_service_time;
        self.add_machine(x, y, min, max).await
    }

    /// Add a machine; a running simulation starts its worker immediately
    pub async fn add_machine_with(&self, spec: MachineSpec) -> Result<Machine, SimulationError> {
        let mut tasks = self.tasks.lock().await;
        let machine = self.line.topology_mut().add_machine(&spec)?;
        info!(
            "[Machine:{}] Added ({}..{} ms, reliability {})",
            machine.id, machine.min_service_time, machine.max_service_time, machine.reliability
        );

        if self.line.is_running() {
            let config = self.config.read().clone();
            self.spawn_worker(&mut tasks, machine.id.clone(), &config);
        }
        Ok(machine)
    }

    /// Stop the machine's worker and remove it with its connections.
    /// A product held by the machine leaves the line with it.
    pub async fn remove_machine(&self, id: &str) -> Result<Machine, SimulationError> {
        let mut tasks = self.tasks.lock().await;
        if let Some(handle) = tasks.workers.remove(id) {
            let timeout = self.config.read().shutdown_timeout;
            handle.shutdown(timeout).await;
        }
        let machine = self.line.topology_mut().remove_machine(id)?;
        info!("[Machine:{}] Removed", id);
        Ok(machine)
    }

    pub fn add_queue(&self, x: f64, y: f64, capacity: usize) -> Result<ProductionQueue, SimulationError> {
        let queue = self
            .line
            .topology_mut()
            .add_queue(Position::new(x, y), capacity)?;
        info!("[Buffer:{}] Added (capacity {})", queue.id, queue.capacity);
        Ok(queue)
    }

    /// Add a queue with the configured default capacity
    pub fn add_default_queue(&self, x: f64, y: f64) -> Result<ProductionQueue, SimulationError> {
        let capacity = self.config.read().default_queue_capacity;
        self.add_queue(x, y, capacity)
    }

    /// Remove a queue; products still inside it leave the line
    pub fn remove_queue(&self, id: &str) -> Result<ProductionQueue, SimulationError> {
        let queue = self.line.topology_mut().remove_queue(id)?;
        info!("[Buffer:{}] Removed", id);
        Ok(queue)
    }

    pub fn add_connection(&self, from: &str, to: &str) -> Result<Connection, SimulationError> {
        Ok(self.line.topology_mut().add_connection(from, to)?)
    }

    pub fn remove_connection(&self, from: &str, to: &str) -> Result<Connection, SimulationError> {
        Ok(self.line.topology_mut().remove_connection(from, to)?)
    }

    /// Whether `from -> to` would be admitted right now
    pub fn validate_connection(&self, from: &str, to: &str) -> bool {
        self.line.topology().validate(from, to)
    }

    /// Like `validate_connection`, with the rejection reason
    pub fn check_connection(&self, from: &str, to: &str) -> Result<(), SimulationError> {
        self.line.topology().check_connection(from, to)?;
        Ok(())
    }

    pub fn connection_rules(&self) -> Vec<ConnectionRule> {
        ConnectionValidator::rules()
    }

    pub fn update_position(&self, id: &str, x: f64, y: f64) -> Result<(), SimulationError> {
        let position = Position::new(x, y);
        match id {
            START_NODE_ID => self.line.start().lock().position = position,
            END_NODE_ID => self.line.end().lock().position = position,
            _ => self.line.topology().set_position(id, position)?,
        }
        Ok(())
    }

    // ---- production ----

    /// Change the production target. Cannot drop below what was already generated.
    pub fn set_total_to_generate(&self, total: u64) -> Result<(), SimulationError> {
        if total > MAX_TOTAL_TO_GENERATE {
            return Err(SimulationError::invalid(
                "total_to_generate",
                format!("must be at most {}", MAX_TOTAL_TO_GENERATE),
            ));
        }

        let mut start = self.line.start().lock();
        if total < start.generated_count {
            return Err(SimulationError::invalid(
                "total_to_generate",
                format!("{} products were already generated", start.generated_count),
            ));
        }
        start.total_to_generate = total;
        self.config.write().total_to_generate = total;
        info!("[Simulation] Production target set to {}", total);
        Ok(())
    }

    pub fn product_info(&self) -> ProductInfo {
        let (total_to_generate, generated, remaining) = {
            let start = self.line.start().lock();
            (start.total_to_generate, start.generated_count, start.remaining())
        };
        ProductInfo {
            total_to_generate,
            generated,
            completed: self.line.end().lock().completed_count,
            remaining,
        }
    }

    /// Change the generator period, restarting the generator if running
    pub async fn set_generation_interval(&self, interval: Duration) -> Result<(), SimulationError> {
        if interval.is_zero() {
            return Err(SimulationError::invalid(
                "generation_interval",
                "must be greater than zero",
            ));
        }

        let mut tasks = self.tasks.lock().await;
        self.config.write().generation_interval = interval;
        if self.line.is_running() {
            if let Some(generator) = tasks.generator.take() {
                let timeout = self.config.read().shutdown_timeout;
                generator.shutdown(timeout).await;
            }
            let config = self.config.read().clone();
            self.spawn_generator(&mut tasks, &config);
        }
        info!("[Simulation] Generation interval set to {:?}", interval);
        Ok(())
    }

    // ---- state & snapshots ----

    pub fn current_state(&self) -> SimulationState {
        self.line.capture()
    }

    pub fn statistics(&self) -> SimulationStatistics {
        let state = self.line.capture();
        let clock = self.clock.lock();
        SimulationStatistics::from_state(&state, clock.elapsed(), clock.started_at)
    }

    pub fn all_snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.all()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Capture and store a snapshot now. Returns the number stored.
    pub fn capture_snapshot(&self) -> Result<usize, SimulationError> {
        let stored = self.snapshots.capture_from(&self.line)?;
        self.bus.publish(EventKind::SnapshotCaptured { stored });
        Ok(stored)
    }

    /// Replace the live line with snapshot `index`, pausing first if running.
    /// Returns the state now in effect.
    pub async fn restore_snapshot(&self, index: usize) -> Result<SimulationState, SimulationError> {
        let state = self.snapshots.restore(index)?;

        let mut tasks = self.tasks.lock().await;
        self.pause_locked(&mut tasks).await;

        self.line.restore(&state);
        let issued = self.sequence.issued().max(state.start.generated_count);
        self.sequence.reset(issued);

        info!("[Simulation] Restored snapshot {}", index);
        Ok(self.line.capture())
    }

    /// The first `limit` stored states in capture order, all of them when `limit` is 0
    pub fn replay_snapshots(&self, limit: usize) -> Vec<SimulationState> {
        self.snapshots.replay(limit)
    }

    /// Snapshot count recorded at the last pause
    pub fn replay_boundary(&self) -> usize {
        self.replay_boundary.load(Ordering::SeqCst)
    }

    pub fn replay_to_boundary(&self) -> Vec<SimulationState> {
        self.snapshots.replay(self.replay_boundary())
    }

    pub fn clear_snapshots(&self) {
        self.snapshots.clear();
        self.replay_boundary.store(0, Ordering::SeqCst);
    }

    // ---- events ----

    pub fn subscribe(&self, observer: Arc<dyn SimulationObserver>) -> SubscriptionId {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }
}

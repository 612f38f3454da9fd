use super::connections::Topology;
use super::model::{EndNode, LifecycleState, SimulationState, StartNode};
use super::types::now_millis;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The live, shared state of one production line.
///
/// Lock order, outermost first: topology, transfer gate, start, machine, buffer, end.
/// Any move of a product between two aggregates holds the gate for reading; capture holds it
/// for writing, so a captured state never shows a product in two places or in none.
#[derive(Debug)]
pub struct Line {
    topology: RwLock<Topology>,
    gate: RwLock<()>,
    start: Mutex<StartNode>,
    end: Mutex<EndNode>,
    lifecycle: Mutex<LifecycleState>,
}

impl Line {
    pub fn new(total_to_generate: u64) -> Self {
        Self {
            topology: RwLock::new(Topology::new()),
            gate: RwLock::new(()),
            start: Mutex::new(StartNode::new(total_to_generate)),
            end: Mutex::new(EndNode::new()),
            lifecycle: Mutex::new(LifecycleState::Stopped),
        }
    }

    pub fn topology(&self) -> RwLockReadGuard<'_, Topology> {
        self.topology.read()
    }

    pub fn topology_mut(&self) -> RwLockWriteGuard<'_, Topology> {
        self.topology.write()
    }

    /// Hold while moving a product between aggregates
    pub fn transfer(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read()
    }

    pub fn start(&self) -> &Mutex<StartNode> {
        &self.start
    }

    pub fn end(&self) -> &Mutex<EndNode> {
        &self.end
    }

    pub fn lifecycle(&self) -> LifecycleState {
        *self.lifecycle.lock()
    }

    pub fn set_lifecycle(&self, state: LifecycleState) {
        *self.lifecycle.lock() = state;
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == LifecycleState::Running
    }

    /// Deep copy of the whole line taken as one consistent cut
    pub fn capture(&self) -> SimulationState {
        let topology = self.topology.read();
        let _gate = self.gate.write();

        let start = self.start.lock().clone();
        let machines = topology.machines().map(|m| m.lock().clone()).collect();
        let queues = topology.buffers().map(|b| b.snapshot()).collect();
        let end = self.end.lock().clone();
        let lifecycle = self.lifecycle();

        SimulationState {
            timestamp: now_millis(),
            start,
            end,
            queues,
            machines,
            connections: topology.connections().to_vec(),
            is_running: lifecycle == LifecycleState::Running,
            is_paused: lifecycle == LifecycleState::Paused,
            next_node_seq: topology.next_node_seq(),
        }
    }

    /// Replace the graph and counters with a copy of `state`. The lifecycle is left alone.
    pub fn restore(&self, state: &SimulationState) {
        let mut topology = self.topology.write();
        let _gate = self.gate.write();
        *topology = Topology::from_state(state);
        *self.start.lock() = state.start.clone();
        *self.end.lock() = state.end.clone();
    }

    /// Back to an empty line with a fresh Start/End pair
    pub fn reset(&self, total_to_generate: u64) {
        self.restore(&SimulationState::empty(total_to_generate, now_millis()));
    }
}

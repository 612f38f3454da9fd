use super::machine::Machine;
use super::nodes::{Connection, EndNode, StartNode};
use super::product::Product;
use super::queue::ProductionQueue;
use crate::core::errors::SnapshotError;
use crate::core::types::{Millis, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Lifecycle of the whole simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Stopped,
    Running,
    Paused,
}

impl Default for LifecycleState {
    fn default() -> Self {
        LifecycleState::Stopped
    }
}

/// Every queue, machine, product and connection of the line at one instant.
///
/// All fields are owned values, so `clone()` yields a fully independent copy: two states
/// never share a mutable sub-object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub timestamp: Millis,
    pub start: StartNode,
    pub end: EndNode,
    /// Ordered by id
    pub queues: Vec<ProductionQueue>,
    /// Ordered by id
    pub machines: Vec<Machine>,
    pub connections: Vec<Connection>,
    pub is_running: bool,
    pub is_paused: bool,
    /// Id sequence of the topology, carried so a restored line keeps issuing fresh ids
    pub next_node_seq: u64,
}

impl SimulationState {
    /// The freshly initialised line: Start, End and nothing in between
    pub fn empty(total_to_generate: u64, timestamp: Millis) -> Self {
        Self {
            timestamp,
            start: StartNode::new(total_to_generate),
            end: EndNode::new(),
            queues: Vec::new(),
            machines: Vec::new(),
            connections: Vec::new(),
            is_running: false,
            is_paused: false,
            next_node_seq: 0,
        }
    }

    pub fn lifecycle(&self) -> LifecycleState {
        match (self.is_running, self.is_paused) {
            (true, _) => LifecycleState::Running,
            (false, true) => LifecycleState::Paused,
            (false, false) => LifecycleState::Stopped,
        }
    }

    pub fn queue(&self, id: &str) -> Option<&ProductionQueue> {
        self.queues.iter().find(|q| q.id == id)
    }

    pub fn queue_mut(&mut self, id: &str) -> Option<&mut ProductionQueue> {
        self.queues.iter_mut().find(|q| q.id == id)
    }

    pub fn machine(&self, id: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.id == id)
    }

    pub fn machine_mut(&mut self, id: &str) -> Option<&mut Machine> {
        self.machines.iter_mut().find(|m| m.id == id)
    }

    /// Every product still inside the line, queued or held by a machine
    pub fn products(&self) -> Vec<&Product> {
        self.queues
            .iter()
            .flat_map(|q| q.products.iter())
            .chain(self.machines.iter().filter_map(|m| m.current_product.as_ref()))
            .collect()
    }

    pub fn products_in_system(&self) -> usize {
        self.products().len()
    }

    /// Check the structural invariants a consistent capture must satisfy
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if self.start.generated_count > self.start.total_to_generate {
            return Err(SnapshotError::Inconsistent(format!(
                "generated {} of {}",
                self.start.generated_count, self.start.total_to_generate
            )));
        }

        for queue in &self.queues {
            if queue.products.len() > queue.capacity {
                return Err(SnapshotError::Inconsistent(format!(
                    "queue '{}' holds {} products with capacity {}",
                    queue.id,
                    queue.products.len(),
                    queue.capacity
                )));
            }
        }

        let mut seen = HashSet::new();
        for product in self.products() {
            if !seen.insert(product.id.as_str()) {
                return Err(SnapshotError::Inconsistent(format!(
                    "product '{}' appears twice",
                    product.id
                )));
            }
        }

        let mut queue_inputs = HashSet::new();
        let mut machine_outputs = HashSet::new();
        for connection in &self.connections {
            if connection.to_kind == NodeKind::Queue && !queue_inputs.insert(connection.to.as_str()) {
                return Err(SnapshotError::Inconsistent(format!(
                    "queue '{}' has more than one input",
                    connection.to
                )));
            }
            if connection.from_kind == NodeKind::Machine
                && !machine_outputs.insert(connection.from.as_str())
            {
                return Err(SnapshotError::Inconsistent(format!(
                    "machine '{}' has more than one output",
                    connection.from
                )));
            }
        }

        Ok(())
    }
}

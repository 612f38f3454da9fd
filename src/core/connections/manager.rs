use crate::core::buffer::Buffer;
use crate::core::connections::connection_validator::ConnectionValidator;
use crate::core::errors::{SimulationError, TopologyError};
use crate::core::model::{Connection, Machine, MachineSpec, ProductionQueue, SimulationState};
use crate::core::types::{NodeId, NodeKind, Position, END_NODE_ID, START_NODE_ID};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Live production graph: the machines and queues of the line and the edges between them.
///
/// Admitting an edge also updates the adjacency fields of both endpoints, so workers can
/// resolve their input and output buffers by id lookup.
#[derive(Debug, Default)]
pub struct Topology {
    machines: BTreeMap<NodeId, Arc<Mutex<Machine>>>,
    queues: BTreeMap<NodeId, Arc<Buffer>>,
    connections: Vec<Connection>,
    /// Queue fed by the Start node
    entry_queue_id: Option<NodeId>,
    next_node_seq: u64,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a live graph from a (restored) state. Every record is copied.
    pub fn from_state(state: &SimulationState) -> Self {
        let machines = state
            .machines
            .iter()
            .map(|m| (m.id.clone(), Arc::new(Mutex::new(m.clone()))))
            .collect();
        let queues = state
            .queues
            .iter()
            .map(|q| (q.id.clone(), Arc::new(Buffer::new(q.clone()))))
            .collect();
        let entry_queue_id = state
            .connections
            .iter()
            .find(|c| c.from_kind == NodeKind::Start)
            .map(|c| c.to.clone());

        Self {
            machines,
            queues,
            connections: state.connections.clone(),
            entry_queue_id,
            next_node_seq: state.next_node_seq,
        }
    }

    /// Resolve the kind of a node id: Start/End sentinels first, then live nodes
    pub fn node_kind(&self, id: &str) -> Option<NodeKind> {
        if id == START_NODE_ID {
            Some(NodeKind::Start)
        } else if id == END_NODE_ID {
            Some(NodeKind::End)
        } else if self.machines.contains_key(id) {
            Some(NodeKind::Machine)
        } else if self.queues.contains_key(id) {
            Some(NodeKind::Queue)
        } else {
            None
        }
    }

    fn require_kind(&self, id: &str) -> Result<NodeKind, TopologyError> {
        self.node_kind(id)
            .ok_or_else(|| TopologyError::UnknownNode(id.to_string()))
    }

    fn next_id(&mut self, prefix: &str) -> NodeId {
        let id = format!("{}{}", prefix, self.next_node_seq);
        self.next_node_seq += 1;
        id
    }

    pub fn next_node_seq(&self) -> u64 {
        self.next_node_seq
    }

    pub fn add_machine(&mut self, spec: &MachineSpec) -> Result<Machine, SimulationError> {
        if spec.min_service_time > spec.max_service_time {
            return Err(SimulationError::invalid(
                "service_time",
                format!(
                    "min {} exceeds max {}",
                    spec.min_service_time, spec.max_service_time
                ),
            ));
        }
        if !(0.0..=1.0).contains(&spec.reliability) {
            return Err(SimulationError::invalid("reliability", "must lie in [0, 1]"));
        }

        let id = self.next_id("M");
        let machine = Machine::new(id.clone(), spec);
        self.machines.insert(id, Arc::new(Mutex::new(machine.clone())));
        Ok(machine)
    }

    pub fn add_queue(&mut self, position: Position, capacity: usize) -> Result<ProductionQueue, SimulationError> {
        if capacity == 0 {
            return Err(SimulationError::invalid("capacity", "must be greater than zero"));
        }

        let id = self.next_id("Q");
        let queue = ProductionQueue::new(id.clone(), position, capacity);
        self.queues.insert(id, Arc::new(Buffer::new(queue.clone())));
        Ok(queue)
    }

    /// Remove a machine and every edge touching it
    pub fn remove_machine(&mut self, id: &str) -> Result<Machine, TopologyError> {
        if !self.machines.contains_key(id) {
            return Err(self.missing_or_reserved(id));
        }

        self.purge_connections(id);
        let machine = self
            .machines
            .remove(id)
            .ok_or_else(|| TopologyError::UnknownNode(id.to_string()))?;
        let machine = machine.lock().clone();
        if let Some(product) = &machine.current_product {
            warn!("[Machine:{}] Removed while holding {}", id, product.id);
        }
        Ok(machine)
    }

    /// Remove a queue, its products and every edge touching it
    pub fn remove_queue(&mut self, id: &str) -> Result<ProductionQueue, TopologyError> {
        if !self.queues.contains_key(id) {
            return Err(self.missing_or_reserved(id));
        }

        self.purge_connections(id);
        let buffer = self
            .queues
            .remove(id)
            .ok_or_else(|| TopologyError::UnknownNode(id.to_string()))?;
        let queue = buffer.snapshot();
        if !queue.is_empty() {
            warn!("[Buffer:{}] Removed with {} products inside", id, queue.len());
        }
        Ok(queue)
    }

    fn missing_or_reserved(&self, id: &str) -> TopologyError {
        if id == START_NODE_ID || id == END_NODE_ID {
            TopologyError::ReservedNode(id.to_string())
        } else {
            TopologyError::UnknownNode(id.to_string())
        }
    }

    fn purge_connections(&mut self, id: &str) {
        let dangling: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| c.touches(id))
            .cloned()
            .collect();
        for connection in dangling {
            self.detach(&connection);
        }
    }

    /// Check a prospective edge against every rule without mutating anything
    pub fn check_connection(&self, from: &str, to: &str) -> Result<(NodeKind, NodeKind), TopologyError> {
        let from_kind = self.require_kind(from)?;
        let to_kind = self.require_kind(to)?;
        ConnectionValidator::validate_kinds(from, from_kind, to, to_kind)?;
        ConnectionValidator::check_fan_limits(&self.connections, from, from_kind, to, to_kind)?;
        Ok((from_kind, to_kind))
    }

    pub fn validate(&self, from: &str, to: &str) -> bool {
        self.check_connection(from, to).is_ok()
    }

    pub fn add_connection(&mut self, from: &str, to: &str) -> Result<Connection, TopologyError> {
        let (from_kind, to_kind) = self.check_connection(from, to)?;
        let connection = Connection::new(from.to_string(), from_kind, to.to_string(), to_kind);

        match (from_kind, to_kind) {
            (NodeKind::Start, NodeKind::Queue) => {
                self.entry_queue_id = Some(to.to_string());
                self.with_queue(to, |q| q.input_machine_id = Some(from.to_string()));
            }
            (NodeKind::Queue, NodeKind::Machine) => {
                self.with_queue(from, |q| {
                    q.output_machine_ids.insert(to.to_string());
                });
                self.with_machine(to, |m| {
                    m.input_queue_ids.insert(from.to_string());
                });
            }
            (NodeKind::Machine, NodeKind::Queue) => {
                self.with_machine(from, |m| m.output_queue_id = Some(to.to_string()));
                self.with_queue(to, |q| q.input_machine_id = Some(from.to_string()));
            }
            // Machine -> End carries no adjacency: a machine without an output queue completes
            _ => {}
        }

        debug!("[Topology] Connected {} {} -> {} {}", from_kind, from, to_kind, to);
        self.connections.push(connection.clone());
        Ok(connection)
    }

    pub fn remove_connection(&mut self, from: &str, to: &str) -> Result<Connection, TopologyError> {
        let connection = self
            .connections
            .iter()
            .find(|c| c.from == from && c.to == to)
            .cloned()
            .ok_or_else(|| TopologyError::ConnectionNotFound {
                from: from.to_string(),
                to: to.to_string(),
            })?;
        self.detach(&connection);
        Ok(connection)
    }

    /// Drop an edge and undo the adjacency it established
    fn detach(&mut self, connection: &Connection) {
        let (from, to) = (connection.from.as_str(), connection.to.as_str());
        match (connection.from_kind, connection.to_kind) {
            (NodeKind::Start, NodeKind::Queue) => {
                if self.entry_queue_id.as_deref() == Some(to) {
                    self.entry_queue_id = None;
                }
                self.with_queue(to, |q| q.input_machine_id = None);
            }
            (NodeKind::Queue, NodeKind::Machine) => {
                self.with_queue(from, |q| {
                    q.output_machine_ids.remove(to);
                });
                self.with_machine(to, |m| {
                    m.input_queue_ids.remove(from);
                });
            }
            (NodeKind::Machine, NodeKind::Queue) => {
                self.with_machine(from, |m| m.output_queue_id = None);
                self.with_queue(to, |q| q.input_machine_id = None);
            }
            _ => {}
        }
        self.connections.retain(|c| c != connection);
    }

    fn with_queue(&self, id: &str, f: impl FnOnce(&mut ProductionQueue)) {
        if let Some(buffer) = self.queues.get(id) {
            buffer.update(f);
        }
    }

    fn with_machine(&self, id: &str, f: impl FnOnce(&mut Machine)) {
        if let Some(machine) = self.machines.get(id) {
            f(&mut machine.lock());
        }
    }

    /// Move any node, Start and End excluded (those live outside the graph)
    pub fn set_position(&self, id: &str, position: Position) -> Result<(), TopologyError> {
        match self.require_kind(id)? {
            NodeKind::Machine => self.with_machine(id, |m| m.position = position),
            NodeKind::Queue => self.with_queue(id, |q| q.position = position),
            NodeKind::Start | NodeKind::End => return Err(TopologyError::ReservedNode(id.to_string())),
        }
        Ok(())
    }

    pub fn machine(&self, id: &str) -> Option<Arc<Mutex<Machine>>> {
        self.machines.get(id).cloned()
    }

    pub fn buffer(&self, id: &str) -> Option<Arc<Buffer>> {
        self.queues.get(id).cloned()
    }

    /// The buffer the Start node feeds, if connected
    pub fn entry_buffer(&self) -> Option<Arc<Buffer>> {
        self.entry_queue_id.as_deref().and_then(|id| self.buffer(id))
    }

    pub fn machine_ids(&self) -> Vec<NodeId> {
        self.machines.keys().cloned().collect()
    }

    pub fn machines(&self) -> impl Iterator<Item = &Arc<Mutex<Machine>>> {
        self.machines.values()
    }

    pub fn buffers(&self) -> impl Iterator<Item = &Arc<Buffer>> {
        self.queues.values()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }
}

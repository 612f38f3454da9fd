use super::types::{NodeId, NodeKind};
use thiserror::Error;

/// Reasons a connection or topology edit is rejected. Nothing is mutated on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("a node cannot be connected to itself: {0}")]
    SelfLoop(NodeId),
    #[error("{from} -> {to} is not an allowed connection")]
    DisallowedKinds { from: NodeKind, to: NodeKind },
    #[error("machine '{machine}' already outputs to '{existing}'")]
    MachineOutputTaken { machine: NodeId, existing: NodeId },
    #[error("queue '{queue}' already receives from '{existing}'")]
    QueueInputTaken { queue: NodeId, existing: NodeId },
    #[error("start node already feeds queue '{existing}'")]
    StartOutputTaken { existing: NodeId },
    #[error("connection {from} -> {to} already exists")]
    DuplicateConnection { from: NodeId, to: NodeId },
    #[error("node not found: {0}")]
    UnknownNode(NodeId),
    #[error("connection {from} -> {to} not found")]
    ConnectionNotFound { from: NodeId, to: NodeId },
    #[error("node '{0}' is part of every line and cannot be removed")]
    ReservedNode(NodeId),
}

/// Errors raised by the snapshot history
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot {index} not found ({len} stored)")]
    NotFound { index: usize, len: usize },
    #[error("captured state failed its integrity check: {0}")]
    Inconsistent(String),
}

/// Errors surfaced by the simulation controller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl SimulationError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimulationError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether the fault lies with the caller's request rather than the engine
    pub fn is_client_error(&self) -> bool {
        match self {
            SimulationError::Topology(_) | SimulationError::InvalidParameter { .. } => true,
            SimulationError::Snapshot(SnapshotError::NotFound { .. }) => true,
            SimulationError::Snapshot(SnapshotError::Inconsistent(_)) => false,
        }
    }
}

use crate::core::types::{NodeId, NodeKind, Position, END_NODE_ID, START_NODE_ID};
use serde::{Deserialize, Serialize};

/// Generation point of the line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartNode {
    pub id: NodeId,
    pub position: Position,
    pub total_to_generate: u64,
    /// Never exceeds `total_to_generate`
    pub generated_count: u64,
}

impl StartNode {
    pub fn new(total_to_generate: u64) -> Self {
        Self {
            id: START_NODE_ID.to_string(),
            position: Position::new(50.0, 250.0),
            total_to_generate,
            generated_count: 0,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total_to_generate.saturating_sub(self.generated_count)
    }

    pub fn is_exhausted(&self) -> bool {
        self.generated_count >= self.total_to_generate
    }
}

/// Completion point of the line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndNode {
    pub id: NodeId,
    pub position: Position,
    pub completed_count: u64,
}

impl EndNode {
    pub fn new() -> Self {
        Self {
            id: END_NODE_ID.to_string(),
            position: Position::new(950.0, 250.0),
            completed_count: 0,
        }
    }
}

impl Default for EndNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Directed edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
    pub from_kind: NodeKind,
    pub to_kind: NodeKind,
}

impl Connection {
    pub fn new(from: NodeId, from_kind: NodeKind, to: NodeId, to_kind: NodeKind) -> Self {
        Self {
            from,
            to,
            from_kind,
            to_kind,
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.from == id || self.to == id
    }
}

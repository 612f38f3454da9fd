use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of any node in the production line (Start, End, queue or machine)
pub type NodeId = String;

/// Identifier of a product flowing through the line
pub type ProductId = String;

/// Wall-clock timestamp in milliseconds since the Unix epoch
pub type Millis = u64;

/// Reserved id of the single Start node
pub const START_NODE_ID: &str = "start";

/// Reserved id of the single End node
pub const END_NODE_ID: &str = "end";

/// Kind of a node in the production graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Generation point, feeds exactly one queue
    Start,
    /// Completion point
    End,
    /// Bounded buffer between stages
    Queue,
    /// Processing station
    Machine,
}

impl NodeKind {
    /// Lower-case name used in log lines and rejection reasons
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Queue => "queue",
            NodeKind::Machine => "machine",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Canvas position of a node. Has no effect on the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Current wall-clock time in milliseconds
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

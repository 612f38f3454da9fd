use crate::core::errors::TopologyError;
use crate::core::model::Connection;
use crate::core::types::{NodeKind, START_NODE_ID};
use serde::Serialize;

/// Human-readable statement of one connection rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionRule {
    pub kind: NodeKind,
    pub inputs: &'static str,
    pub outputs: &'static str,
}

/// Centralized connection validation logic for the production graph
pub struct ConnectionValidator;

impl ConnectionValidator {
    /// Whether an edge between the two kinds is admissible at all
    pub fn is_allowed(from: NodeKind, to: NodeKind) -> bool {
        matches!(
            (from, to),
            (NodeKind::Start, NodeKind::Queue)
                | (NodeKind::Queue, NodeKind::Machine)
                | (NodeKind::Machine, NodeKind::Queue)
                | (NodeKind::Machine, NodeKind::End)
        )
    }

    /// Validate the endpoints of a prospective edge, ignoring existing edges
    pub fn validate_kinds(
        from: &str,
        from_kind: NodeKind,
        to: &str,
        to_kind: NodeKind,
    ) -> Result<(), TopologyError> {
        if from == to {
            return Err(TopologyError::SelfLoop(from.to_string()));
        }
        if !Self::is_allowed(from_kind, to_kind) {
            return Err(TopologyError::DisallowedKinds {
                from: from_kind,
                to: to_kind,
            });
        }
        Ok(())
    }

    /// Check the fan-in/fan-out limits against the edges already admitted.
    ///
    /// A machine has at most one outgoing edge, a queue at most one incoming edge, and
    /// Start feeds at most one queue. Everything else may fan freely.
    pub fn check_fan_limits(
        connections: &[Connection],
        from: &str,
        from_kind: NodeKind,
        to: &str,
        to_kind: NodeKind,
    ) -> Result<(), TopologyError> {
        if connections.iter().any(|c| c.from == from && c.to == to) {
            return Err(TopologyError::DuplicateConnection {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if from_kind == NodeKind::Machine {
            if let Some(existing) = connections.iter().find(|c| c.from == from) {
                return Err(TopologyError::MachineOutputTaken {
                    machine: from.to_string(),
                    existing: existing.to.clone(),
                });
            }
        }

        if from_kind == NodeKind::Start {
            if let Some(existing) = connections.iter().find(|c| c.from == START_NODE_ID) {
                return Err(TopologyError::StartOutputTaken {
                    existing: existing.to.clone(),
                });
            }
        }

        if to_kind == NodeKind::Queue {
            if let Some(existing) = connections.iter().find(|c| c.to == to) {
                return Err(TopologyError::QueueInputTaken {
                    queue: to.to_string(),
                    existing: existing.from.clone(),
                });
            }
        }

        Ok(())
    }

    /// The rule table as shown to users
    pub fn rules() -> Vec<ConnectionRule> {
        vec![
            ConnectionRule {
                kind: NodeKind::Start,
                inputs: "none",
                outputs: "one queue",
            },
            ConnectionRule {
                kind: NodeKind::Queue,
                inputs: "one machine or the start node",
                outputs: "many machines",
            },
            ConnectionRule {
                kind: NodeKind::Machine,
                inputs: "many queues",
                outputs: "one queue or the end node",
            },
            ConnectionRule {
                kind: NodeKind::End,
                inputs: "many machines",
                outputs: "none",
            },
        ]
    }
}

use super::types::{now_millis, Millis, NodeId, ProductId};
use serde::Serialize;
use uuid::Uuid;

pub type EventId = String;

/// What happened. Variants mirror the transitions of workers, the generator and the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    MachineIdle {
        machine_id: NodeId,
    },
    MachineProcessing {
        machine_id: NodeId,
        product_id: ProductId,
        color: String,
    },
    MachineBreakdown {
        machine_id: NodeId,
        repair_ms: u64,
    },
    MachineFlash {
        machine_id: NodeId,
    },
    ProductMoved {
        machine_id: NodeId,
        queue_id: NodeId,
        product_id: ProductId,
    },
    /// Output queue was full; the product went back to an input queue
    ProductRequeued {
        machine_id: NodeId,
        queue_id: NodeId,
        product_id: ProductId,
    },
    ProductCompleted {
        machine_id: NodeId,
        product_id: ProductId,
    },
    ProductGenerated {
        product_id: ProductId,
        queue_id: NodeId,
    },
    SimulationStarted,
    SimulationPaused {
        replay_boundary: usize,
    },
    SimulationResumed,
    SimulationStopped,
    SimulationReset,
    SnapshotCaptured {
        stored: usize,
    },
}

impl EventKind {
    /// Wire name of the variant, e.g. `MACHINE_IDLE`
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::MachineIdle { .. } => "MACHINE_IDLE",
            EventKind::MachineProcessing { .. } => "MACHINE_PROCESSING",
            EventKind::MachineBreakdown { .. } => "MACHINE_BREAKDOWN",
            EventKind::MachineFlash { .. } => "MACHINE_FLASH",
            EventKind::ProductMoved { .. } => "PRODUCT_MOVED",
            EventKind::ProductRequeued { .. } => "PRODUCT_REQUEUED",
            EventKind::ProductCompleted { .. } => "PRODUCT_COMPLETED",
            EventKind::ProductGenerated { .. } => "PRODUCT_GENERATED",
            EventKind::SimulationStarted => "SIMULATION_STARTED",
            EventKind::SimulationPaused { .. } => "SIMULATION_PAUSED",
            EventKind::SimulationResumed => "SIMULATION_RESUMED",
            EventKind::SimulationStopped => "SIMULATION_STOPPED",
            EventKind::SimulationReset => "SIMULATION_RESET",
            EventKind::SnapshotCaptured { .. } => "SNAPSHOT_CAPTURED",
        }
    }
}

/// A domain event as delivered to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationEvent {
    pub id: EventId,
    pub timestamp: Millis,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl SimulationEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            kind,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.name()
    }
}

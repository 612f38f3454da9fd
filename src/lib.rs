pub mod core;

// Re-export commonly used types
pub use crate::core::config::{BackpressurePolicy, SimulationConfig};
pub use crate::core::errors::{SimulationError, SnapshotError, TopologyError};
pub use crate::core::event::{EventKind, SimulationEvent};
pub use crate::core::event_bus::{EventLog, SimulationObserver, SubscriptionId};
pub use crate::core::execution::{ProductInfo, Simulation};
pub use crate::core::model::{
    Machine, MachineSpec, MachineStatus, Product, ProductStatus, ProductionQueue, SimulationState,
};
pub use crate::core::snapshot::Snapshot;
pub use crate::core::statistics::SimulationStatistics;
pub use crate::core::types::{NodeId, NodeKind, Position, END_NODE_ID, START_NODE_ID};

pub mod machine;
pub mod nodes;
pub mod product;
pub mod queue;
pub mod state;

// Re-export commonly used types
pub use machine::{Machine, MachineSpec, MachineStatus, IDLE_COLOR};
pub use nodes::{Connection, EndNode, StartNode};
pub use product::{Product, ProductStatus};
pub use queue::ProductionQueue;
pub use state::{LifecycleState, SimulationState};

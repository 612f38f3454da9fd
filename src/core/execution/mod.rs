pub mod generator;
pub mod simulation;
pub mod snapshotter;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use generator::{ProductGenerator, ProductSequence, TickOutcome};
pub use simulation::{ProductInfo, Simulation};
pub use task::TaskHandle;
pub use worker::{MachineWorker, WorkerTiming};

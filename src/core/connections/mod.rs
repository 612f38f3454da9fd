pub mod connection_validator;
pub mod manager;

pub use connection_validator::{ConnectionRule, ConnectionValidator};
pub use manager::Topology;

pub mod buffer;
pub mod config;
pub mod connections;
pub mod errors;
pub mod event;
pub mod event_bus;
pub mod execution;
pub mod line;
pub mod model;
pub mod snapshot;
pub mod statistics;
pub mod types;

#[cfg(test)]
mod tests;

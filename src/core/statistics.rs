use super::model::{ProductStatus, SimulationState};
use super::types::{Millis, NodeId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregate counters derived from one consistent state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStatistics {
    /// Units finished by any machine
    pub total_products_processed: u64,
    pub total_completed: u64,
    pub total_generated: u64,
    pub total_to_generate: u64,
    pub products_in_system: usize,
    /// Mean time a currently waiting product has spent in its queue (ms)
    pub average_wait_time: f64,
    /// Mean processing time per finished unit (ms)
    pub average_processing_time: f64,
    pub machine_processed_count: BTreeMap<NodeId, u64>,
    /// Busy share of the running time, 0..=1
    pub machine_utilization: BTreeMap<NodeId, f64>,
    /// Completed units per second of running time
    pub throughput: f64,
    pub running_time_ms: u64,
    pub simulation_start_time: Option<Millis>,
}

impl SimulationStatistics {
    pub fn from_state(
        state: &SimulationState,
        running_time: Duration,
        simulation_start_time: Option<Millis>,
    ) -> Self {
        let running_ms = running_time.as_millis() as u64;

        let total_products_processed: u64 = state.machines.iter().map(|m| m.processed_count).sum();
        let total_processing_time: u64 = state.machines.iter().map(|m| m.total_processing_time).sum();
        let average_processing_time = if total_products_processed == 0 {
            0.0
        } else {
            total_processing_time as f64 / total_products_processed as f64
        };

        let waiting: Vec<u64> = state
            .products()
            .into_iter()
            .filter(|p| p.status == ProductStatus::Waiting)
            .map(|p| p.waiting_for(state.timestamp))
            .collect();
        let average_wait_time = if waiting.is_empty() {
            0.0
        } else {
            waiting.iter().sum::<u64>() as f64 / waiting.len() as f64
        };

        let machine_processed_count = state
            .machines
            .iter()
            .map(|m| (m.id.clone(), m.processed_count))
            .collect();
        let machine_utilization = state
            .machines
            .iter()
            .map(|m| {
                let utilization = if running_ms == 0 {
                    0.0
                } else {
                    (m.total_processing_time as f64 / running_ms as f64).min(1.0)
                };
                (m.id.clone(), utilization)
            })
            .collect();

        let throughput = if running_ms == 0 {
            0.0
        } else {
            state.end.completed_count as f64 / running_time.as_secs_f64()
        };

        Self {
            total_products_processed,
            total_completed: state.end.completed_count,
            total_generated: state.start.generated_count,
            total_to_generate: state.start.total_to_generate,
            products_in_system: state.products_in_system(),
            average_wait_time,
            average_processing_time,
            machine_processed_count,
            machine_utilization,
            throughput,
            running_time_ms: running_ms,
            simulation_start_time,
        }
    }
}

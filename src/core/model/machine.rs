use super::product::Product;
use crate::core::types::{NodeId, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Colour shown for a machine that holds no product
pub const IDLE_COLOR: &str = "#94a3b8";

/// Worker state of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineStatus {
    Idle,
    Processing,
    /// Broken down, repairing before processing resumes
    Maintenance,
    /// Short pause after a product was handed off
    Flashing,
}

/// Parameters for creating a machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub position: Position,
    pub min_service_time: u64,
    pub max_service_time: u64,
    /// Probability of not breaking down per unit processed
    pub reliability: f64,
}

impl MachineSpec {
    pub fn new(x: f64, y: f64, min_service_time: u64, max_service_time: u64) -> Self {
        Self {
            position: Position::new(x, y),
            min_service_time,
            max_service_time,
            reliability: 1.0,
        }
    }

    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability;
        self
    }
}

/// A processing station and its running counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: NodeId,
    pub position: Position,
    /// Processing time bounds in milliseconds
    pub min_service_time: u64,
    pub max_service_time: u64,
    pub reliability: f64,
    pub status: MachineStatus,
    pub current_product: Option<Product>,
    /// Display colour: the held product's, grey when empty
    pub current_color: String,
    /// Set once the held product's service time has run; the product only awaits hand-off
    pub service_elapsed: Option<u64>,
    /// Queue the current product was taken from, used when it has to go back
    pub source_queue_id: Option<NodeId>,
    pub input_queue_ids: BTreeSet<NodeId>,
    pub output_queue_id: Option<NodeId>,
    pub processed_count: u64,
    /// Cumulative processing time in milliseconds, repairs excluded
    pub total_processing_time: u64,
}

impl Machine {
    pub fn new(id: NodeId, spec: &MachineSpec) -> Self {
        Self {
            id,
            position: spec.position,
            min_service_time: spec.min_service_time,
            max_service_time: spec.max_service_time,
            reliability: spec.reliability,
            status: MachineStatus::Idle,
            current_product: None,
            current_color: IDLE_COLOR.to_string(),
            service_elapsed: None,
            source_queue_id: None,
            input_queue_ids: BTreeSet::new(),
            output_queue_id: None,
            processed_count: 0,
            total_processing_time: 0,
        }
    }

    /// Take ownership of `product`, showing its colour
    pub fn hold(&mut self, product: Product) {
        self.current_color = product.color.clone();
        self.current_product = Some(product);
    }

    /// Give up the held product and any service progress on it
    pub fn release(&mut self) -> Option<Product> {
        self.current_color = IDLE_COLOR.to_string();
        self.service_elapsed = None;
        self.current_product.take()
    }
}

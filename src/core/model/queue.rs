use super::product::Product;
use crate::core::types::{NodeId, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Plain contents of a production queue. The live, lock-guarded form is `Buffer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionQueue {
    pub id: NodeId,
    pub position: Position,
    pub capacity: usize,
    /// Insertion order; dequeue picks by priority
    pub products: Vec<Product>,
    /// The single machine (or Start) feeding this queue
    pub input_machine_id: Option<NodeId>,
    pub output_machine_ids: BTreeSet<NodeId>,
}

impl ProductionQueue {
    pub fn new(id: NodeId, position: Position, capacity: usize) -> Self {
        Self {
            id,
            position,
            capacity,
            products: Vec::new(),
            input_machine_id: None,
            output_machine_ids: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.products.len() >= self.capacity
    }

    /// Index of the next product to serve: highest priority, earliest arrival on ties
    pub(crate) fn next_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, product) in self.products.iter().enumerate() {
            match best {
                Some(b) if self.products[b].priority >= product.priority => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}

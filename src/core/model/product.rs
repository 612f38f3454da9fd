use crate::core::types::{now_millis, Millis, ProductId};
use serde::{Deserialize, Serialize};

/// Lifecycle of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductStatus {
    /// Sitting in a queue
    Waiting,
    /// Held by a machine
    Processing,
    /// Left the line through the End node
    Completed,
}

/// A discrete unit flowing through the line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Display tag, no effect on routing
    pub color: String,
    /// Higher is served first
    pub priority: i32,
    pub product_type: String,
    pub created_at: Millis,
    /// Restamped every time the product is placed into a queue
    pub entered_queue_at: Millis,
    pub status: ProductStatus,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, color: impl Into<String>, priority: i32) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            color: color.into(),
            priority,
            product_type: "standard".to_string(),
            created_at: now,
            entered_queue_at: now,
            status: ProductStatus::Waiting,
        }
    }

    /// Milliseconds spent in the current queue as of `now`
    pub fn waiting_for(&self, now: Millis) -> Millis {
        now.saturating_sub(self.entered_queue_at)
    }
}

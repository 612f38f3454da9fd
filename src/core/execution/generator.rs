use crate::core::config::SimulationConfig;
use crate::core::event::EventKind;
use crate::core::event_bus::EventBus;
use crate::core::line::Line;
use crate::core::model::Product;
use crate::core::types::{NodeId, ProductId};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Monotonic source of product ids (`P1`, `P2`, ...)
#[derive(Debug, Default)]
pub struct ProductSequence(AtomicU64);

impl ProductSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> ProductId {
        format!("P{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The next id issued will be `P{issued + 1}`
    pub fn reset(&self, issued: u64) {
        self.0.store(issued, Ordering::SeqCst);
    }

    pub fn issued(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one generator tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Generated(ProductId),
    /// Production target reached
    Exhausted,
    /// Entry queue full; nothing was created
    Backpressure,
    NotRunning,
    /// Start is not connected to a queue
    Disconnected,
}

/// Periodic producer feeding the Start node's queue
pub struct ProductGenerator {
    line: Arc<Line>,
    bus: Arc<EventBus>,
    sequence: Arc<ProductSequence>,
    palette: Vec<String>,
    priority_range: RangeInclusive<i32>,
    rng: StdRng,
}

impl ProductGenerator {
    pub fn new(
        line: Arc<Line>,
        bus: Arc<EventBus>,
        sequence: Arc<ProductSequence>,
        config: &SimulationConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            line,
            bus,
            sequence,
            palette: config.palette.clone(),
            priority_range: config.priority_range.clone(),
            rng,
        }
    }

    /// Attempt to create exactly one product
    pub fn tick(&mut self) -> TickOutcome {
        if !self.line.is_running() {
            return TickOutcome::NotRunning;
        }

        match self.try_generate() {
            Ok((product_id, queue_id)) => {
                self.bus.publish(EventKind::ProductGenerated {
                    product_id: product_id.clone(),
                    queue_id,
                });
                TickOutcome::Generated(product_id)
            }
            Err(outcome) => outcome,
        }
    }

    fn try_generate(&mut self) -> Result<(ProductId, NodeId), TickOutcome> {
        let topology = self.line.topology();
        let Some(buffer) = topology.entry_buffer() else {
            return Err(TickOutcome::Disconnected);
        };
        let _gate = self.line.transfer();
        let mut start = self.line.start().lock();
        if start.is_exhausted() {
            return Err(TickOutcome::Exhausted);
        }

        let color = self
            .palette
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "#3b82f6".to_string());
        let priority = self.rng.gen_range(self.priority_range.clone());
        let sequence = &self.sequence;

        match buffer.enqueue_with(|| Product::new(sequence.next(), color, priority)) {
            Some(product_id) => {
                start.generated_count += 1;
                debug!(
                    "[Generator] Generated {} into {} ({}/{})",
                    product_id,
                    buffer.id(),
                    start.generated_count,
                    start.total_to_generate
                );
                Ok((product_id, buffer.id().to_string()))
            }
            None => {
                debug!("[Generator] Entry queue {} full, skipping tick", buffer.id());
                Err(TickOutcome::Backpressure)
            }
        }
    }

    /// Tick every `interval` until cancelled
    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        info!("[Generator] Started, interval {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.tick() == TickOutcome::Exhausted {
                        debug!("[Generator] Production target reached");
                    }
                }
            }
        }
        info!("[Generator] Stopped");
    }
}

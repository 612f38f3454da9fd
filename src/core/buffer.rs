use crate::core::model::{Product, ProductStatus, ProductionQueue};
use crate::core::types::{now_millis, NodeId, ProductId};
use log::debug;
use parking_lot::Mutex;

/// Bounded, priority-ordered product storage shared between tasks.
///
/// Every operation takes the buffer's own lock for its whole duration and never waits for
/// space or products: a full buffer rejects, an empty buffer yields `None`, and callers poll.
#[derive(Debug)]
pub struct Buffer {
    id: NodeId,
    inner: Mutex<ProductionQueue>,
}

impl Buffer {
    pub fn new(queue: ProductionQueue) -> Self {
        Self {
            id: queue.id.clone(),
            inner: Mutex::new(queue),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().is_full()
    }

    /// Insert `product`, returning `false` without mutation when the buffer is at capacity
    pub fn enqueue(&self, product: Product) -> bool {
        self.try_enqueue(product).is_ok()
    }

    /// Insert `product`, handing it back when the buffer is at capacity
    pub fn try_enqueue(&self, mut product: Product) -> Result<(), Product> {
        let mut queue = self.inner.lock();
        if queue.is_full() {
            debug!(
                "[Buffer:{}] Rejected {} - buffer full ({}/{})",
                self.id,
                product.id,
                queue.len(),
                queue.capacity
            );
            return Err(product);
        }

        product.entered_queue_at = now_millis();
        product.status = ProductStatus::Waiting;
        debug!(
            "[Buffer:{}] Added {} (count: {}/{})",
            self.id,
            product.id,
            queue.len() + 1,
            queue.capacity
        );
        queue.products.push(product);
        Ok(())
    }

    /// Build and insert a product only if there is room for it.
    ///
    /// `make` runs under the buffer lock, so nothing is created when the buffer is full.
    pub fn enqueue_with<F>(&self, make: F) -> Option<ProductId>
    where
        F: FnOnce() -> Product,
    {
        let mut queue = self.inner.lock();
        if queue.is_full() {
            return None;
        }

        let mut product = make();
        product.entered_queue_at = now_millis();
        product.status = ProductStatus::Waiting;
        let id = product.id.clone();
        queue.products.push(product);
        Some(id)
    }

    /// Remove the highest-priority product, earliest arrival first on ties
    pub fn dequeue(&self) -> Option<Product> {
        let mut queue = self.inner.lock();
        let idx = queue.next_index()?;
        let product = queue.products.remove(idx);
        debug!(
            "[Buffer:{}] Dispatched {} (remaining: {}/{})",
            self.id,
            product.id,
            queue.len(),
            queue.capacity
        );
        Some(product)
    }

    /// Deep copy of the buffer's contents taken under its lock
    pub fn snapshot(&self) -> ProductionQueue {
        self.inner.lock().clone()
    }

    /// Edit adjacency or position fields under the buffer lock
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ProductionQueue) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

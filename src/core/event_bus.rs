use super::event::{EventKind, SimulationEvent};
use log::warn;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receiver of simulation events
pub trait SimulationObserver: Send + Sync {
    /// Called synchronously on the publishing task; keep it short
    fn on_event(&self, event: &SimulationEvent);
}

impl<F> SimulationObserver for F
where
    F: Fn(&SimulationEvent) + Send + Sync,
{
    fn on_event(&self, event: &SimulationEvent) {
        self(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous best-effort fan-out of events to registered observers.
///
/// The subscriber list is copied under the lock and delivery happens after it is released,
/// so an observer may subscribe or unsubscribe from inside `on_event`. A panicking observer
/// is logged and skipped; the publisher never sees the failure.
#[derive(Default)]
pub struct EventBus {
    observers: Mutex<Vec<(SubscriptionId, Arc<dyn SimulationObserver>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn SimulationObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, observer));
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn publish(&self, kind: EventKind) {
        let event = SimulationEvent::new(kind);
        let observers: Vec<Arc<dyn SimulationObserver>> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer.on_event(&event))).is_err() {
                warn!("[EventBus] Observer panicked while handling {}", event.event_type());
            }
        }
    }
}

/// Observer that keeps every event it receives, in delivery order
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<SimulationEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SimulationObserver for EventLog {
    fn on_event(&self, event: &SimulationEvent) {
        self.events.lock().push(event.clone());
    }
}

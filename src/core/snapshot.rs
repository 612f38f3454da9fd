use super::errors::SnapshotError;
use super::line::Line;
use super::model::SimulationState;
use super::types::Millis;
use log::debug;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// An immutable, independent copy of the whole line at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    id: String,
    timestamp: Millis,
    state: SimulationState,
}

impl Snapshot {
    /// Copy `state` after checking it is internally consistent
    pub fn capture(state: &SimulationState) -> Result<Self, SnapshotError> {
        state.verify()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            timestamp: state.timestamp,
            state: state.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> Millis {
        self.timestamp
    }

    /// Read-only view; use `SnapshotManager::restore` for a mutable copy
    pub fn state(&self) -> &SimulationState {
        &self.state
    }
}

/// Bounded FIFO history of snapshots
#[derive(Debug)]
pub struct SnapshotManager {
    history: Mutex<VecDeque<Snapshot>>,
    max_snapshots: usize,
}

impl SnapshotManager {
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(max_snapshots)),
            max_snapshots: max_snapshots.max(1),
        }
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    /// Append, evicting the oldest entries past the bound. Returns the stored count.
    pub fn save(&self, snapshot: Snapshot) -> usize {
        let mut history = self.history.lock();
        history.push_back(snapshot);
        while history.len() > self.max_snapshots {
            history.pop_front();
        }
        history.len()
    }

    /// Capture the live line and store it
    pub fn capture_from(&self, line: &Line) -> Result<usize, SnapshotError> {
        let snapshot = Snapshot::capture(&line.capture())?;
        let stored = self.save(snapshot);
        debug!("[Snapshots] Captured snapshot, {} stored", stored);
        Ok(stored)
    }

    /// Fresh copy of the state stored at `index`
    pub fn restore(&self, index: usize) -> Result<SimulationState, SnapshotError> {
        let history = self.history.lock();
        history
            .get(index)
            .map(|snapshot| snapshot.state.clone())
            .ok_or(SnapshotError::NotFound {
                index,
                len: history.len(),
            })
    }

    /// The first `limit` states in capture order, or all of them when `limit` is 0
    pub fn replay(&self, limit: usize) -> Vec<SimulationState> {
        let history = self.history.lock();
        let take = if limit == 0 { history.len() } else { limit };
        history.iter().take(take).map(|s| s.state.clone()).collect()
    }

    pub fn all(&self) -> Vec<Snapshot> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.history.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    pub fn clear(&self) {
        self.history.lock().clear();
    }
}

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A spawned background loop together with the token that stops it
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawn `f` on the runtime, handing it a fresh cancellation token
    pub fn spawn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let cancel = CancellationToken::new();
        let join = tokio::spawn(f(cancel.clone()));
        debug!("[Task:{}] Spawned", name);
        Self { name, cancel, join }
    }

    /// Signal the task to stop without waiting for it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel and wait up to `timeout` for the task to exit, aborting it otherwise
    pub async fn shutdown(mut self, timeout: Duration) {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, &mut self.join).await {
            Ok(Ok(())) => debug!("[Task:{}] Stopped", self.name),
            Ok(Err(e)) => warn!("[Task:{}] Exited abnormally: {}", self.name, e),
            Err(_) => {
                warn!(
                    "[Task:{}] Did not stop within {:?}, aborting",
                    self.name, timeout
                );
                self.join.abort();
            }
        }
    }
}

/// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// RNG for one task: derived from `seed` and `salt` when seeded, from entropy otherwise
pub fn seeded_rng(seed: Option<u64>, salt: &str) -> StdRng {
    match seed {
        Some(seed) => {
            let mut hasher = DefaultHasher::new();
            seed.hash(&mut hasher);
            salt.hash(&mut hasher);
            StdRng::seed_from_u64(hasher.finish())
        }
        None => StdRng::from_entropy(),
    }
}

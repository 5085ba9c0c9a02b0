//! Registry of requests in flight

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::AbortHandle;

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    shut_down: bool,
    tasks: HashMap<u64, AbortHandle>,
}

/// Thread-safe set of abortable request tasks
///
/// Registration and shutdown take the same lock, so a request either lands
/// in the set before `shutdown_all` drains it or sees the shutdown flag and
/// is refused.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    state: Mutex<RegistryState>,
}

impl InFlightRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // State stays consistent across a panicking holder
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track `handle`; `None` if the registry was shut down, in which case
    /// the task has already been aborted
    pub fn register(self: &Arc<Self>, handle: AbortHandle) -> Option<InFlightGuard> {
        let mut state = self.lock();
        if state.shut_down {
            handle.abort();
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.tasks.insert(id, handle);
        Some(InFlightGuard {
            registry: Arc::clone(self),
            id,
        })
    }

    /// Abort everything tracked and refuse later registrations
    pub fn shutdown_all(&self) -> usize {
        let drained: Vec<AbortHandle> = {
            let mut state = self.lock();
            state.shut_down = true;
            state.tasks.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &drained {
            handle.abort();
        }
        drained.len()
    }

    /// Whether [`shutdown_all`](Self::shutdown_all) has run
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Number of requests currently tracked
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Whether nothing is in flight
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget `id` and abort its task if it was still tracked
    fn deregister(&self, id: u64) {
        let removed = self.lock().tasks.remove(&id);
        if let Some(handle) = removed {
            handle.abort();
        }
    }
}

/// Keeps one request registered; dropping it deregisters and aborts the task
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

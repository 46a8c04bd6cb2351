use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Ids whose delete request is still in flight.
///
/// A row being deleted shows as "deleting" in the list and refuses a second
/// delete until the first one has finished.
#[derive(Clone, Debug, Default)]
pub struct DeleteGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl DeleteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn ids(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `id` as being deleted.
    ///
    /// # Returns
    ///
    /// * `None` if a delete for `id` is already running
    pub fn begin(&self, id: &str) -> Option<DeleteTicket> {
        if !self.ids().insert(id.to_string()) {
            return None;
        }
        Some(DeleteTicket {
            guard: self.clone(),
            id: id.to_string(),
        })
    }

    pub fn is_deleting(&self, id: &str) -> bool {
        self.ids().contains(id)
    }
}

/// Clears the "deleting" flag of its id when dropped.
#[derive(Debug)]
pub struct DeleteTicket {
    guard: DeleteGuard,
    id: String,
}

impl Drop for DeleteTicket {
    fn drop(&mut self) {
        self.guard.ids().remove(&self.id);
    }
}

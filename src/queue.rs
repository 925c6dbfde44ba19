use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::AppEvent;

/// FIFO bus shared by the watcher threads (producers) and the main loop
/// (sole consumer). Cloning yields another handle to the same queue.
///
/// Drains never block: they take whatever is queued right now.
#[derive(Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<AppEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Safe to call from any thread.
    pub fn publish(&self, event: AppEvent) {
        tracing::trace!(?event, "publish");
        self.inner.lock().push_back(event);
    }

    /// Remove and return, in FIFO order, every queued event matching
    /// `predicate`. Non-matching events keep their relative order.
    pub fn drain_matching<F>(&self, mut predicate: F) -> Vec<AppEvent>
    where
        F: FnMut(&AppEvent) -> bool,
    {
        let mut queue = self.inner.lock();
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());
        for event in queue.drain(..) {
            if predicate(&event) {
                taken.push(event);
            } else {
                kept.push_back(event);
            }
        }
        *queue = kept;
        taken
    }

    /// Remove and return only the oldest event matching `predicate`.
    pub fn take_first<F>(&self, predicate: F) -> Option<AppEvent>
    where
        F: Fn(&AppEvent) -> bool,
    {
        let mut queue = self.inner.lock();
        let index = queue.iter().position(predicate)?;
        queue.remove(index)
    }

    /// Remove everything.
    pub fn drain_all(&self) -> Vec<AppEvent> {
        self.inner.lock().drain(..).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

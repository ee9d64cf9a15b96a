use std::sync::Arc;

use parking_lot::Mutex;

struct Slot<T> {
    generation: u64,
    value: Option<Arc<T>>,
}

/// Single-slot cell holding the newest published value. Publishing
/// overwrites, readers get the whole latest value or nothing.
pub struct LatestFrame<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for LatestFrame<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Default for LatestFrame<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestFrame<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                value: None,
            })),
        }
    }

    pub fn publish(&self, value: T) {
        let value = Arc::new(value);
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.value = Some(value);
    }

    /// The newest value and its generation, starting at 1 for the first publish.
    pub fn snapshot(&self) -> Option<(u64, Arc<T>)> {
        let slot = self.slot.lock();
        slot.value.as_ref().map(|value| (slot.generation, value.clone()))
    }

    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }
}

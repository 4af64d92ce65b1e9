use std::collections::VecDeque;

use crate::GenerationProgressEvent;

/// Number of events kept for the live log.
pub const HISTORY_CAPACITY: usize = 100;

/// Capped, ordered log of accepted events. Oldest entries are evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHistory {
    entries: VecDeque<GenerationProgressEvent>,
    capacity: usize,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl EventHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: GenerationProgressEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &GenerationProgressEvent> + '_ {
        self.entries.iter()
    }
}

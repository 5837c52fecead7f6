//! Bounded pose history with oldest-first eviction.

use std::collections::VecDeque;

use crate::error::ConfigError;

pub const DEFAULT_TRAIL_SIZE: usize = 1000;

/// Bounded flown-path history. Appends go to the back; once full, every
/// append evicts exactly one element from the front.
#[derive(Debug, Clone)]
pub struct TrailBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> TrailBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroTrailSize);
        }
        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Returns the evicted element, if any.
    pub fn append(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> TrailBuffer<T> {
    /// Copy of the contents in insertion order (oldest first).
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Default for TrailBuffer<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::with_capacity(DEFAULT_TRAIL_SIZE),
            capacity: DEFAULT_TRAIL_SIZE,
        }
    }
}

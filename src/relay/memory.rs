use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::common::types::Shared;

/// Remembers which attempt signature last worked for each upstream host.
///
/// Bounded by insertion order: once full, adding a new host evicts the host
/// that was inserted first. Overwriting an existing host keeps its slot.
#[derive(Clone)]
pub struct HostAttemptMemory {
    capacity: usize,
    state: Shared<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    preferred: HashMap<String, String>,
    order: VecDeque<String>,
}

impl HostAttemptMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    pub fn get(&self, host: &str) -> Option<String> {
        self.state.lock().preferred.get(host).cloned()
    }

    pub fn remember(&self, host: &str, signature: &str) {
        let mut state = self.state.lock();
        if let Some(existing) = state.preferred.get_mut(host) {
            *existing = signature.to_string();
            return;
        }

        state
            .preferred
            .insert(host.to_string(), signature.to_string());
        state.order.push_back(host.to_string());

        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.preferred.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().preferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.preferred.clear();
        state.order.clear();
    }
}

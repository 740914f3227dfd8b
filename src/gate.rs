//! Style-ready gate: queue draws that arrive before the surface can take them.
//!
//! One continuation per namespace. A later draw for the same namespace
//! replaces the queued one, so a burst of draws during style load replays as
//! a single draw of the latest input. The queue is drained before replay, so
//! a replay can never schedule itself again.

#[cfg(test)]
#[path = "gate_test.rs"]
mod gate_test;

use std::collections::BTreeMap;

use crate::layer_set::Namespace;

/// Whether anything is waiting for the style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Ready,
    Pending,
}

#[derive(Debug)]
pub struct ReadyGate<T> {
    queued: BTreeMap<Namespace, T>,
}

impl<T> Default for ReadyGate<T> {
    fn default() -> Self {
        Self { queued: BTreeMap::new() }
    }
}

impl<T> ReadyGate<T> {
    #[must_use]
    pub fn state(&self) -> GateState {
        if self.queued.is_empty() { GateState::Ready } else { GateState::Pending }
    }

    /// Queue `draw` for `namespace`. Returns whether it replaced an earlier one.
    ///
    /// A namespace's exclusive partner loses its queued draw.
    pub fn defer(&mut self, namespace: Namespace, draw: T) -> bool {
        if let Some(other) = namespace.exclusive_with() {
            self.queued.remove(&other);
        }
        self.queued.insert(namespace, draw).is_some()
    }

    /// Drop the queued draw for `namespace`, if any.
    pub fn cancel(&mut self, namespace: Namespace) -> bool {
        self.queued.remove(&namespace).is_some()
    }

    #[must_use]
    pub fn is_pending(&self, namespace: Namespace) -> bool {
        self.queued.contains_key(&namespace)
    }

    /// Take every queued draw, leaving the gate ready.
    pub fn drain(&mut self) -> Vec<(Namespace, T)> {
        std::mem::take(&mut self.queued).into_iter().collect()
    }
}

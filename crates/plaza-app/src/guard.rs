//! In-flight mutation guards.
//!
//! A second click on a control whose request has not returned yet is
//! ignored, so a double-click produces one request and one state change.

use std::{collections::HashSet, hash::Hash};

/// Set of targets with a mutation in flight.
#[derive(Debug, Clone)]
pub struct MutationGuard<K> {
    in_flight: HashSet<K>,
}

impl<K> Default for MutationGuard<K> {
    fn default() -> Self {
        Self { in_flight: HashSet::new() }
    }
}

impl<K: Eq + Hash> MutationGuard<K> {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. `false` if a mutation for it is already in flight.
    pub fn try_begin(&mut self, key: K) -> bool {
        self.in_flight.insert(key)
    }

    /// Release `key`.
    pub fn finish(&mut self, key: &K) {
        self.in_flight.remove(key);
    }

    /// Whether `key` has a mutation in flight.
    pub fn is_busy(&self, key: &K) -> bool {
        self.in_flight.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused() {
        let mut guard = MutationGuard::new();
        assert!(guard.try_begin(7));
        assert!(!guard.try_begin(7));
        assert!(guard.try_begin(8));
        guard.finish(&7);
        assert!(guard.try_begin(7));
    }
}

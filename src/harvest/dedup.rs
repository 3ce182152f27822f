//! Session-scoped fingerprint set.

use std::collections::HashSet;

/// Admits each fingerprint exactly once. Never evicts.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashSet<String>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a fingerprint is offered.
    pub fn admit(&mut self, fingerprint: &str) -> bool {
        if self.seen.contains(fingerprint) {
            return false;
        }
        self.seen.insert(fingerprint.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_once() {
        let mut store = DedupStore::new();
        assert!(store.admit("a"));
        assert!(!store.admit("a"));
        assert!(store.admit("b"));
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_repeated_batches_idempotent() {
        let mut store = DedupStore::new();
        let batch = ["x", "y", "z", "x"];
        let first: Vec<bool> = batch.iter().map(|f| store.admit(f)).collect();
        let second: Vec<bool> = batch.iter().map(|f| store.admit(f)).collect();
        assert_eq!(first, vec![true, true, true, false]);
        assert!(second.iter().all(|admitted| !admitted));
        assert_eq!(store.len(), 3);
    }
}

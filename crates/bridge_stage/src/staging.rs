//! Latest-value staging between the read thread and the main thread

use bridge_core::{AttrValue, FlatKey};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Most recent value per flat key, written by producers and drained
/// wholesale by the consumer.
///
/// A drain observes either all or none of one [`deposit_all`](Self::deposit_all).
pub struct StagingBuffer<V = AttrValue> {
    entries: Mutex<HashMap<FlatKey, V>>,
}

impl<V> StagingBuffer<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Merge one value, replacing any value held for the key
    pub fn deposit(&self, key: FlatKey, value: V) {
        self.entries.lock().insert(key, value);
    }

    /// Merge many values in one critical section
    pub fn deposit_all(&self, values: impl IntoIterator<Item = (FlatKey, V)>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let mut merged = 0;
        for (key, value) in values {
            entries.insert(key, value);
            merged += 1;
        }
        log::trace!("Staged {} values ({} new keys)", merged, entries.len() - before);
        merged
    }

    /// Take everything, leaving the buffer empty
    pub fn drain(&self) -> HashMap<FlatKey, V> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<V> Default for StagingBuffer<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_last_write_wins() {
        let buffer = StagingBuffer::new();
        buffer.deposit(FlatKey::from("a"), AttrValue::Number(1.0));
        buffer.deposit(FlatKey::from("a"), AttrValue::Number(2.0));
        let drained = buffer.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[&FlatKey::from("a")], AttrValue::Number(2.0));
    }

    #[test]
    fn test_drain_empties() {
        let buffer: StagingBuffer = StagingBuffer::new();
        buffer.deposit_all(vec![(FlatKey::from("a"), 1.0.into()), (FlatKey::from("b"), 2.0.into())]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.drain().len(), 2);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_deposit_all_is_atomic_to_drain() {
        let buffer: Arc<StagingBuffer<u64>> = Arc::new(StagingBuffer::new());
        let keys: Vec<FlatKey> = (0..16).map(|i| FlatKey::new(format!("k{}", i))).collect();

        let producer = {
            let buffer = Arc::clone(&buffer);
            let keys = keys.clone();
            thread::spawn(move || {
                for round in 1..=2000u64 {
                    buffer.deposit_all(keys.iter().cloned().map(|k| (k, round)));
                }
            })
        };

        let mut last_seen = 0;
        let mut drains = 0;
        while !producer.is_finished() || !buffer.is_empty() {
            let drained = buffer.drain();
            if drained.is_empty() {
                continue;
            }
            drains += 1;
            // Every key of one deposit lands together, never a partial round
            assert_eq!(drained.len(), keys.len());
            let round = drained[&keys[0]];
            assert!(drained.values().all(|v| *v == round));
            assert!(round > last_seen);
            last_seen = round;
        }
        producer.join().unwrap();
        assert!(drains > 0);
        assert_eq!(last_seen, 2000);
    }
}

use tracing::debug;

/// Capacity-bounded key/value table with least-recently-updated eviction.
///
/// Every write stamps the entry with a logical clock; inserting a new key
/// at capacity first evicts the entry with the smallest stamp. The entry
/// being written is never an eviction candidate. Entries keep insertion
/// order, so iteration order is stable until an eviction removes a slot.
///
/// Lookup is a linear scan; capacities are small.
pub struct BoundedTable<K, V> {
    entries: Vec<Entry<K, V>>,
    capacity: usize,
    clock: u64,
}

struct Entry<K, V> {
    key: K,
    value: V,
    updated_at: u64,
}

impl<K: PartialEq, V> BoundedTable<K, V> {
    /// Creates a table holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.min(1024)),
            capacity,
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a value, refreshing its last-updated stamp.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.iter_mut().find(|e| &e.key == key).map(|e| {
            e.updated_at = clock;
            &mut e.value
        })
    }

    /// Inserts or overwrites a value, evicting the least-recently-updated
    /// entry first when a new key would exceed capacity.
    pub fn insert(&mut self, key: K, value: V) {
        self.clock += 1;

        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.value = value;
            entry.updated_at = self.clock;
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        self.entries.push(Entry {
            key,
            value,
            updated_at: self.clock,
        });
    }

    /// Removes and returns the value for `key`, if present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.entries.iter().position(|e| &e.key == key)?;
        Some(self.entries.remove(idx).value)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    fn evict_oldest(&mut self) {
        let Some(idx) = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.updated_at)
            .map(|(idx, _)| idx)
        else {
            return;
        };

        self.entries.remove(idx);
        debug!("table at capacity, evicted least-recently-updated entry");
    }
}

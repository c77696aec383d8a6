//! Open-addressed hash table keyed by interned strings.
//!
//! Used by the compiler to deduplicate string constants and by the runtime for global variables.
//! Keys are [`Symbol`]s, so a probe compares handles and never string contents.
//!
//! Deleting leaves a tombstone behind so that probe chains running through the deleted slot stay
//! intact. Tombstones count towards the load factor and are dropped whenever the table grows.

use core::fmt;

use crate::world::Symbol;

const MIN_CAPACITY: usize = 8;

#[derive(Clone)]
enum Bucket<V> {
    Empty,
    Tombstone,
    Full(Symbol, V),
}

#[derive(Clone)]
pub struct Table<V> {
    buckets: Vec<Bucket<V>>,
    /// full buckets plus tombstones
    count: usize,
    live: usize,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            count: 0,
            live: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of buckets, always zero or a power of two.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Inserts or overwrites `key`, returning `true` if the key was not present before.
    pub fn set(&mut self, key: Symbol, value: V) -> bool {
        // grow once count + 1 exceeds 3/4 of the capacity
        if (self.count + 1) * 4 > self.capacity() * 3 {
            self.grow();
        }

        let index = find_bucket(&self.buckets, key);
        let bucket = &mut self.buckets[index];
        let is_new = !matches!(bucket, Bucket::Full(..));
        if matches!(bucket, Bucket::Empty) {
            self.count += 1;
        }
        if is_new {
            self.live += 1;
        }
        *bucket = Bucket::Full(key, value);
        is_new
    }

    pub fn get(&self, key: &Symbol) -> Option<&V> {
        if self.live == 0 {
            return None;
        }
        match &self.buckets[find_bucket(&self.buckets, *key)] {
            Bucket::Full(_, value) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &Symbol) -> Option<&mut V> {
        if self.live == 0 {
            return None;
        }
        let index = find_bucket(&self.buckets, *key);
        match &mut self.buckets[index] {
            Bucket::Full(_, value) => Some(value),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &Symbol) -> bool {
        self.get(key).is_some()
    }

    /// Replaces the entry for `key` with a tombstone. Returns `false` if there was no entry.
    pub fn delete(&mut self, key: &Symbol) -> bool {
        if self.live == 0 {
            return false;
        }
        let index = find_bucket(&self.buckets, *key);
        let bucket = &mut self.buckets[index];
        if !matches!(bucket, Bucket::Full(..)) {
            return false;
        }
        // count stays the same: the tombstone still occupies the bucket
        *bucket = Bucket::Tombstone;
        self.live -= 1;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &V)> + '_ {
        self.buckets.iter().filter_map(|bucket| match bucket {
            Bucket::Full(key, value) => Some((*key, value)),
            _ => None,
        })
    }

    fn grow(&mut self) {
        let capacity = if self.capacity() < MIN_CAPACITY {
            MIN_CAPACITY
        } else {
            self.capacity() * 2
        };
        let mut buckets = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, || Bucket::Empty);

        let old = std::mem::replace(&mut self.buckets, buckets);
        self.count = 0;
        for bucket in old {
            if let Bucket::Full(key, value) = bucket {
                let index = find_bucket(&self.buckets, key);
                self.buckets[index] = Bucket::Full(key, value);
                self.count += 1;
            }
        }
        tracing::trace!(capacity, live = self.live, "table grew");
    }
}

impl<V: Clone> Table<V> {
    /// Copies every live entry of `from` into `self`.
    pub fn merge(&mut self, from: &Table<V>) {
        for (key, value) in from.iter() {
            self.set(key, value.clone());
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Table<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Finds the bucket holding `key`, or the bucket it should be inserted into.
///
/// The first tombstone on the probe chain is preferred for insertion, but probing keeps going
/// until an empty bucket proves the key is absent. `buckets` must contain at least one empty
/// bucket, which the load factor guarantees.
fn find_bucket<V>(buckets: &[Bucket<V>], key: Symbol) -> usize {
    let mask = buckets.len() - 1;
    let mut index = key.hash_code() as usize & mask;
    let mut tombstone = None;
    loop {
        match &buckets[index] {
            Bucket::Empty => return tombstone.unwrap_or(index),
            Bucket::Tombstone => {
                tombstone.get_or_insert(index);
            }
            Bucket::Full(candidate, _) if *candidate == key => return index,
            Bucket::Full(..) => {}
        }
        index = (index + 1) & mask;
    }
}

//! Name-indexed storage for build targets.
//!
//! [`Registry`] is an open-addressed hash table keyed by strings. Collisions
//! are resolved with linear probing and keys are hashed with djb2. Deleted
//! entries leave a tombstone behind so that probe sequences running through
//! them keep going.
//!
//! Two buffers of equal size are kept around. When tombstones pile up, the
//! live entries are rehashed into the spare buffer and the two are swapped,
//! so compaction never allocates.

use std::mem;

/// Number of slots in a freshly created table, always a power of two.
const INIT_SLOTS: usize = 4;

/// Load percentage above which the table grows or compacts.
const RESIZE_RATIO: usize = 70;

#[derive(Debug, Clone, Default)]
enum Slot<V> {
    #[default]
    Empty,
    Tombstone,
    Full(String, V),
}

/// Open-addressed map from target names to values.
#[derive(Debug, Clone)]
pub struct Registry<V> {
    slots: Vec<Slot<V>>,
    spare: Vec<Slot<V>>,
    filled: usize,
    tombs: usize,
}

fn djb2(key: &str) -> usize {
    key.bytes().fold(5381usize, |hash, byte| {
        hash.wrapping_mul(33).wrapping_add(byte as usize)
    })
}

fn empty<V>(size: usize) -> Vec<Slot<V>> {
    let mut slots = Vec::with_capacity(size);
    slots.resize_with(size, Slot::default);
    slots
}

fn over_ratio(count: usize, size: usize) -> bool {
    count * 100 > size * RESIZE_RATIO
}

impl<V> Registry<V> {
    pub fn new() -> Self {
        Self {
            slots: empty(INIT_SLOTS),
            spare: empty(INIT_SLOTS),
            filled: 0,
            tombs: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Number of slots currently allocated for entries.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Walks the probe sequence for `key`.
    ///
    /// Returns `Ok(index)` of the slot holding `key`, or `Err(index)` of the
    /// slot an insertion should use, preferring the first tombstone passed.
    fn probe(&self, key: &str) -> Result<usize, usize> {
        let mask = self.slots.len() - 1;
        let start = djb2(key) & mask;
        let mut tomb = None;

        for step in 0..self.slots.len() {
            let index = (start + step) & mask;
            match &self.slots[index] {
                Slot::Empty => return Err(tomb.unwrap_or(index)),
                Slot::Tombstone => {
                    tomb.get_or_insert(index);
                }
                Slot::Full(k, _) if k == key => return Ok(index),
                Slot::Full(..) => {}
            }
        }

        // The load ratio keeps at least one slot free, so a full sweep always
        // passes either an empty slot or a tombstone.
        debug_assert!(tomb.is_some(), "registry probed a table without free slots");
        Err(tomb.unwrap_or(start))
    }

    pub fn find(&self, key: &str) -> Option<&V> {
        match self.probe(key) {
            Ok(index) => match &self.slots[index] {
                Slot::Full(_, value) => Some(value),
                _ => None,
            },
            Err(_) => None,
        }
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut V> {
        match self.probe(key) {
            Ok(index) => match &mut self.slots[index] {
                Slot::Full(_, value) => Some(value),
                _ => None,
            },
            Err(_) => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.probe(key).is_ok()
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();

        if let Ok(index) = self.probe(&key) {
            if let Slot::Full(_, old) = &mut self.slots[index] {
                return Some(mem::replace(old, value));
            }
        }

        self.reserve_one();

        let index = match self.probe(&key) {
            Ok(index) | Err(index) => index,
        };
        if let Slot::Tombstone = self.slots[index] {
            self.tombs -= 1;
        }
        self.slots[index] = Slot::Full(key, value);
        self.filled += 1;

        None
    }

    /// Removes `key`, leaving a tombstone in its slot.
    pub fn delete(&mut self, key: &str) -> Option<V> {
        let index = self.probe(key).ok()?;

        match mem::replace(&mut self.slots[index], Slot::Tombstone) {
            Slot::Full(_, value) => {
                self.filled -= 1;
                self.tombs += 1;
                Some(value)
            }
            other => {
                self.slots[index] = other;
                None
            }
        }
    }

    /// Iterates live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Full(key, value) => Some((key.as_str(), value)),
            _ => None,
        })
    }

    /// Makes room for one more entry, either by doubling the table or by
    /// sweeping tombstones into the spare buffer.
    fn reserve_one(&mut self) {
        let size = self.slots.len();

        if over_ratio(self.filled + 1, size) {
            self.spare = empty(size * 2);
            self.rehash();
            self.spare = empty(size * 2);
        } else if over_ratio(self.filled + self.tombs + 1, size) {
            self.rehash();
        }
    }

    /// Moves every live entry from `slots` into `spare` and swaps the two.
    ///
    /// The old buffer is left holding only empty slots, so it can serve as the
    /// next spare as long as the size doesn't change.
    fn rehash(&mut self) {
        let mask = self.spare.len() - 1;

        for slot in self.slots.iter_mut() {
            if let Slot::Full(key, value) = mem::take(slot) {
                let mut index = djb2(&key) & mask;
                while let Slot::Full(..) = self.spare[index] {
                    index = (index + 1) & mask;
                }
                self.spare[index] = Slot::Full(key, value);
            }
        }

        mem::swap(&mut self.slots, &mut self.spare);
        self.tombs = 0;
    }
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

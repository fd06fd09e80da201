//! Open-addressed set of heap addresses
//!
//! Captured addresses are word aligned and clustered inside a handful of
//! arenas, so their low bits carry almost no entropy. Keys are scattered with
//! Fibonacci hashing (multiply, keep the high bits) over a power-of-two slot
//! array, and collisions are resolved with triangular probing, which visits
//! every slot of a power-of-two table exactly once.
//!
//! # Memory
//!
//! One `u64` per slot and nothing else: at the 2/3 load ceiling a set of
//! 1M addresses fits in 16MB, against roughly 3x that for a
//! `HashSet<u64>` once control bytes and growth slack are counted.
//!
//! The set is built for the traversal pattern: create, probe/insert while
//! walking, drop. There is no removal.

/// Marks a free slot. The key `u64::MAX` is tracked out of band.
const EMPTY: u64 = u64::MAX;

const MIN_SLOTS: usize = 16;

/// 2^64 / golden ratio
const FIB_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// A set of `u64` addresses tuned for large, sparse, skewed key spaces.
#[derive(Debug, Clone)]
pub struct AddressSet {
    slots: Box<[u64]>,
    /// Keys stored in `slots`
    filled: usize,
    /// Right shift that maps a hashed key onto a slot index
    shift: u32,
    has_max: bool,
}

enum Probe {
    Found,
    Vacant(usize),
}

impl Default for AddressSet {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSet {
    /// Create an empty set. No memory is allocated until the first insert.
    pub fn new() -> Self {
        Self {
            slots: Box::new([]),
            filled: 0,
            shift: 64,
            has_max: false,
        }
    }

    /// Create a set that holds `capacity` addresses without regrowing.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut set = Self::new();
        if capacity > 0 {
            set.resize(slots_for(capacity));
        }
        set
    }

    /// Number of addresses in the set
    pub fn len(&self) -> usize {
        self.filled + usize::from(self.has_max)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated slot count (for memory accounting)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn contains(&self, addr: u64) -> bool {
        if addr == EMPTY {
            return self.has_max;
        }
        if self.slots.is_empty() {
            return false;
        }
        matches!(self.probe(addr), Probe::Found)
    }

    /// Add an address. Returns `true` if it was not already present.
    #[inline]
    pub fn insert(&mut self, addr: u64) -> bool {
        if addr == EMPTY {
            let inserted = !self.has_max;
            self.has_max = true;
            return inserted;
        }
        if (self.filled + 1) * 3 > self.slots.len() * 2 {
            self.resize((self.slots.len() * 2).max(MIN_SLOTS));
        }
        match self.probe(addr) {
            Probe::Found => false,
            Probe::Vacant(idx) => {
                self.slots[idx] = addr;
                self.filled += 1;
                true
            }
        }
    }

    /// Remove every address, keeping the allocation for reuse.
    pub fn clear(&mut self) {
        if self.filled > 0 {
            self.slots.fill(EMPTY);
        }
        self.filled = 0;
        self.has_max = false;
    }

    /// Iterate in slot order (no ordering guarantee).
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.slots
            .iter()
            .copied()
            .filter(|&slot| slot != EMPTY)
            .chain(self.has_max.then_some(EMPTY))
    }

    /// All addresses in ascending order.
    pub fn to_sorted_vec(&self) -> Vec<u64> {
        let mut out: Vec<u64> = self.iter().collect();
        out.sort_unstable();
        out
    }

    #[inline]
    fn home_slot(&self, addr: u64) -> usize {
        // shift is 64 - log2(slots), so the result is always in range
        (addr.wrapping_mul(FIB_MULTIPLIER) >> self.shift) as usize
    }

    fn probe(&self, addr: u64) -> Probe {
        let mask = self.slots.len() - 1;
        let mut idx = self.home_slot(addr);
        let mut step = 0;
        loop {
            let slot = self.slots[idx];
            if slot == addr {
                return Probe::Found;
            }
            if slot == EMPTY {
                return Probe::Vacant(idx);
            }
            step += 1;
            idx = (idx + step) & mask;
        }
    }

    fn resize(&mut self, slot_count: usize) {
        debug_assert!(slot_count.is_power_of_two());
        let old = std::mem::replace(&mut self.slots, vec![EMPTY; slot_count].into_boxed_slice());
        self.shift = 64 - slot_count.trailing_zeros();
        for addr in old.iter().copied().filter(|&slot| slot != EMPTY) {
            if let Probe::Vacant(idx) = self.probe(addr) {
                self.slots[idx] = addr;
            }
        }
    }
}

/// Smallest power-of-two slot count that keeps `n` keys under the load ceiling.
fn slots_for(n: usize) -> usize {
    (n.saturating_mul(3) / 2 + 1)
        .max(MIN_SLOTS)
        .checked_next_power_of_two()
        .unwrap_or(1 << (usize::BITS - 1))
}

impl Extend<u64> for AddressSet {
    fn extend<I: IntoIterator<Item = u64>>(&mut self, iter: I) {
        for addr in iter {
            self.insert(addr);
        }
    }
}

impl FromIterator<u64> for AddressSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut set = Self::with_capacity(iter.size_hint().0);
        set.extend(iter);
        set
    }
}

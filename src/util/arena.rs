//! Slot pool backing the dependency-entry table and the task store.
//!
//! Matching and release work at interconnect latency, so dependency entries
//! and task records are pooled and recycled rather than allocated per
//! filing. Values and their generation counters live in parallel vectors;
//! vacated positions are kept on an explicit free stack and handed back on
//! the next insert, so a table that churns through entries settles at its
//! high-water mark. A slot's generation advances on every removal, which
//! makes a recycled slot detectable through any index that outlived its
//! value (a stale wire reference, for instance).
//!
//! No unsafe code; bounds checks and generation validation do the work.

use core::fmt;

/// Index into an [`Arena`], carrying the generation it was issued under.
///
/// An index is only valid while the slot it names still holds the same
/// generation; after the slot is recycled the old index misses. Packs into
/// a `u64` for wire transport (see `RemoteTaskId`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaIndex {
    slot: u32,
    generation: u32,
}

impl ArenaIndex {
    /// Builds an index from raw parts.
    #[must_use]
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Raw slot position.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.slot
    }

    /// Generation the index was issued under.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaIndex({}g{})", self.slot, self.generation)
    }
}

/// Growable slot pool with free-slot recycling and generation checks.
#[derive(Debug)]
pub struct Arena<T> {
    values: Vec<Option<T>>,
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Creates an empty arena with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Number of occupied slots.
    ///
    /// Every slot is either occupied or on the free stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() - self.free.len()
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `value`, reusing a vacated slot when one is available.
    pub fn insert(&mut self, value: T) -> ArenaIndex {
        self.insert_with(|_| value)
    }

    /// Stores the value produced by `f`, which receives the assigned index.
    ///
    /// Lets a record embed its own identifier without a placeholder pass.
    pub fn insert_with<F>(&mut self, f: F) -> ArenaIndex
    where
        F: FnOnce(ArenaIndex) -> T,
    {
        if let Some(slot) = self.free.pop() {
            let idx = ArenaIndex::new(slot, self.generations[slot as usize]);
            debug_assert!(self.values[slot as usize].is_none());
            self.values[slot as usize] = Some(f(idx));
            idx
        } else {
            let slot = u32::try_from(self.values.len()).expect("slot count exceeds u32");
            let idx = ArenaIndex::new(slot, 0);
            self.values.push(Some(f(idx)));
            self.generations.push(0);
            idx
        }
    }

    /// Vacates the slot at `index` and returns its value.
    ///
    /// The slot joins the free stack and its generation advances, so
    /// `index` (and any copy of it) stops resolving. Returns `None` when
    /// the index is stale or out of range.
    pub fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let slot = index.slot as usize;
        if self.generations.get(slot) != Some(&index.generation) {
            return None;
        }
        let value = self.values[slot].take()?;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(index.slot);
        Some(value)
    }

    /// Looks up the value at `index`, if the index is still current.
    #[must_use]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        let slot = index.slot as usize;
        if self.generations.get(slot) != Some(&index.generation) {
            return None;
        }
        self.values[slot].as_ref()
    }

    /// Mutable variant of [`Arena::get`].
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        let slot = index.slot as usize;
        if self.generations.get(slot) != Some(&index.generation) {
            return None;
        }
        self.values[slot].as_mut()
    }
}
